//! Channel group and channel names.

#![allow(missing_docs)]

/// Relay output group; `relayN` when the device has several relays.
pub const GROUP_RELAY: &str = "relay";
/// Power meter group; `meterN` for per-output meters.
pub const GROUP_METER: &str = "meter";
/// Roller shutter control.
pub const GROUP_ROLLER: &str = "roller";
/// Dimmer / bulb output group; `lightN` when the device has several.
pub const GROUP_LIGHT: &str = "light";
/// Color control (bulbs, RGBW2 in color mode).
pub const GROUP_COLOR: &str = "color";
/// White control (RGBW2 in white mode, Duo).
pub const GROUP_WHITE: &str = "white";
/// Environmental sensors.
pub const GROUP_SENSORS: &str = "sensors";
/// Battery status.
pub const GROUP_BATTERY: &str = "battery";
/// Device status.
pub const GROUP_DEVICE: &str = "device";
/// Inputs; `inputN` when the device has several.
pub const GROUP_INPUT: &str = "input";

pub const OUTPUT: &str = "output";
pub const INPUT: &str = "input";
pub const BRIGHTNESS: &str = "brightness";
pub const CURRENT_WATTS: &str = "currentWatts";
pub const TOTAL_KWH: &str = "totalKWH";
pub const RETURNED_KWH: &str = "returnedKWH";
pub const ACCUMULATED_WATTS: &str = "accumulatedWatts";
pub const ACCUMULATED_TOTAL: &str = "accumulatedTotal";
pub const LAST_POWER1: &str = "lastPower1";
pub const VOLTAGE: &str = "voltage";
pub const CURRENT: &str = "current";
pub const POWER_FACTOR: &str = "powerFactor";
pub const TEMPERATURE: &str = "temperature";
pub const INTERNAL_TEMP: &str = "internalTemp";
pub const HUMIDITY: &str = "humidity";
pub const LUX: &str = "lux";
pub const MOTION: &str = "motion";
pub const BATTERY_LEVEL: &str = "batteryLevel";
pub const CHARGER: &str = "charger";
pub const FLOOD: &str = "flood";
pub const TILT: &str = "tilt";
pub const VIBRATION: &str = "vibration";
pub const SENSOR_STATE: &str = "sensorState";
pub const ALARM_STATE: &str = "alarmState";
pub const SELF_TEST: &str = "selfTest";
pub const PPM: &str = "ppm";
pub const VALVE: &str = "valve";
pub const SENSOR_ERROR: &str = "sensorError";
pub const ALARM: &str = "alarm";
pub const MODE: &str = "mode";
pub const WAKEUP_EVENT: &str = "wakeupEvent";
pub const ROLLER_CONTROL: &str = "control";
pub const ROLLER_POSITION: &str = "rollerpos";
pub const ROLLER_STATE: &str = "state";
pub const ROLLER_STOP_REASON: &str = "stopReason";
pub const COLOR_TEMPERATURE: &str = "colorTemperature";
pub const RED: &str = "red";
pub const GREEN: &str = "green";
pub const BLUE: &str = "blue";
pub const WHITE: &str = "white";
pub const GAIN: &str = "gain";
pub const LAST_EVENT: &str = "lastEvent";
pub const EVENT_COUNT: &str = "eventCount";

/// Returns `base` for single-unit devices, `baseN` (1-based) otherwise.
pub fn indexed_group(base: &str, count: u32, index: u32) -> String {
    if count <= 1 {
        base.to_string()
    } else {
        format!("{base}{}", u64::from(index) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_groups() {
        assert_eq!(indexed_group(GROUP_RELAY, 1, 0), "relay");
        assert_eq!(indexed_group(GROUP_RELAY, 2, 0), "relay1");
        assert_eq!(indexed_group(GROUP_RELAY, 2, 1), "relay2");
        assert_eq!(indexed_group(GROUP_INPUT, 0, 3), "input");
        assert_eq!(indexed_group(GROUP_METER, 2, u32::MAX), "meter4294967296");
    }
}
