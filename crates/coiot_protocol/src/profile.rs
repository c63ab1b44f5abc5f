//! Device class information supplied by the device handler.

use serde::{Deserialize, Serialize};

/// Temperature unit configured on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    /// Readings arrive in Celsius.
    #[default]
    Celsius,
    /// Readings arrive in Fahrenheit and are converted before emission.
    Fahrenheit,
}

/// Static capabilities of the device a session talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Battery powered (Sense, H&T, Door/Window, Button).
    pub has_battery: bool,
    /// Roller shutter mode (Shelly 2/2.5).
    pub is_roller: bool,
    /// RGBW2 controller.
    pub is_rgbw2: bool,
    /// Bulb, Duo, Dimmer or RGBW2.
    pub is_light: bool,
    /// Color mode (bulbs, RGBW2 in color mode).
    pub in_color: bool,
    /// Three-phase energy meter (3EM, EM).
    pub is_emeter: bool,
    /// Pure sensor device.
    pub is_sensor: bool,
    /// Number of relay outputs.
    pub num_relays: u32,
    /// Number of power meters.
    pub num_meters: u32,
    /// Number of inputs.
    pub num_inputs: u32,
    /// Unit of temperature readings.
    pub temperature_unit: TemperatureUnit,
    /// Lowest color temperature in Kelvin.
    pub min_color_temp: u32,
    /// Highest color temperature in Kelvin.
    pub max_color_temp: u32,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            has_battery: false,
            is_roller: false,
            is_rgbw2: false,
            is_light: false,
            in_color: false,
            is_emeter: false,
            is_sensor: false,
            num_relays: 1,
            num_meters: 1,
            num_inputs: 1,
            temperature_unit: TemperatureUnit::Celsius,
            min_color_temp: 3000,
            max_color_temp: 6500,
        }
    }
}

impl DeviceProfile {
    /// Single relay with one meter (Shelly 1PM).
    pub fn relay() -> Self {
        Self::default()
    }

    /// Multi-channel relay with one meter per output.
    pub fn multi_relay(outputs: u32) -> Self {
        Self {
            num_relays: outputs,
            num_meters: outputs,
            num_inputs: outputs,
            ..Self::default()
        }
    }

    /// Roller shutter (Shelly 2.5 in roller mode).
    pub fn roller() -> Self {
        Self {
            is_roller: true,
            num_relays: 0,
            num_meters: 2,
            num_inputs: 2,
            ..Self::default()
        }
    }

    /// RGBW2 in white mode, four dimmable channels with own meters.
    pub fn rgbw2_white() -> Self {
        Self {
            is_rgbw2: true,
            is_light: true,
            num_relays: 0,
            num_meters: 4,
            ..Self::default()
        }
    }

    /// Battery powered sensor (Sense, H&T).
    pub fn battery_sensor() -> Self {
        Self {
            has_battery: true,
            is_sensor: true,
            num_relays: 0,
            num_meters: 0,
            num_inputs: 0,
            ..Self::default()
        }
    }

    /// Three-phase energy meter.
    pub fn emeter() -> Self {
        Self {
            is_emeter: true,
            num_relays: 1,
            num_meters: 3,
            ..Self::default()
        }
    }

    /// Sets the temperature unit.
    pub fn with_temperature_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = unit;
        self
    }

    /// Returns true for non-color multi-output controllers whose per-output
    /// meters are summed into one aggregate after each batch.
    pub fn aggregates_meters(&self) -> bool {
        (self.is_rgbw2 && !self.in_color) || self.is_roller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_classes() {
        assert!(DeviceProfile::roller().aggregates_meters());
        assert!(DeviceProfile::rgbw2_white().aggregates_meters());
        let color = DeviceProfile {
            in_color: true,
            ..DeviceProfile::rgbw2_white()
        };
        assert!(!color.aggregates_meters());
        assert!(!DeviceProfile::relay().aggregates_meters());
    }

    #[test]
    fn profile_serde_roundtrip() {
        let profile = DeviceProfile::battery_sensor().with_temperature_unit(TemperatureUnit::Fahrenheit);
        let json = serde_json::to_string(&profile).unwrap();
        let back: DeviceProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
