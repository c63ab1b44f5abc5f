//! CoIoT v2 decoding (firmware 1.8+).
//!
//! Descriptions are camelCase identifiers and block ids start at 1. The
//! output index is taken from the linked block's name (`relay_0`,
//! `light_2`), falling back to the raw link.

use super::{common, digits, input_event_name, DecodeContext, ROLLER_MAX_POSITION, ROLLER_MIN_POSITION};
use crate::channels::*;
use crate::error::DecodeWarning;
use crate::model::{parse_index, SensorDefinition};
use crate::status::StatusSample;
use crate::value::{ChannelKey, TypedValue, Unit, UpdateBatch};

pub(super) fn decode(
    ctx: &DecodeContext<'_>,
    sensor: &SensorDefinition,
    sample: &StatusSample,
    out: &mut UpdateBatch,
) -> Result<(), DecodeWarning> {
    let index = block_index(ctx, sensor);
    if common::decode(ctx, sensor, sample, index, out)? {
        return Ok(());
    }
    let index = || index.ok_or_else(|| DecodeWarning::invalid_link(sensor));
    let meter = || -> Result<String, DecodeWarning> {
        Ok(if ctx.profile.num_meters <= 1 {
            GROUP_METER.to_string()
        } else {
            format!("{GROUP_METER}{}", index()? + 1)
        })
    };

    let desc = sensor.description_key();
    match (sensor.sensor_type.as_str(), desc.as_str()) {
        ("S" | "A", "overtemp") | ("A", "overpower") => {
            if sample.is_one() {
                out.put(
                    ChannelKey::new(GROUP_DEVICE, ALARM),
                    TypedValue::Text(desc.to_uppercase()),
                );
            }
        }
        ("S" | "A", "flood") => out.put(
            ChannelKey::new(GROUP_SENSORS, FLOOD),
            TypedValue::Bool(sample.is_one()),
        ),
        ("S" | "A", "vibration") => out.put(
            ChannelKey::new(GROUP_SENSORS, VIBRATION),
            TypedValue::Bool(sample.is_one()),
        ),
        ("A", "motion") => out.put(
            ChannelKey::new(GROUP_SENSORS, MOTION),
            TypedValue::Bool(sample.is_one()),
        ),
        ("S", "colortemp") => out.put(
            ChannelKey::new(ctx.color_temp_group(), COLOR_TEMPERATURE),
            TypedValue::quantity(
                ctx.color_temp_percent(sample.number()?),
                digits::PERCENT,
                Unit::Percent,
            ),
        ),
        ("S", "rollerpos") => {
            let pos = sample.number()?;
            if pos < ROLLER_MIN_POSITION {
                // Not calibrated
                out.put(ChannelKey::new(GROUP_ROLLER, ROLLER_CONTROL), TypedValue::Undefined);
                out.put(ChannelKey::new(GROUP_ROLLER, ROLLER_POSITION), TypedValue::Undefined);
            } else {
                let pos = pos.min(ROLLER_MAX_POSITION);
                out.put(
                    ChannelKey::new(GROUP_ROLLER, ROLLER_CONTROL),
                    TypedValue::quantity(ROLLER_MAX_POSITION - pos, digits::PERCENT, Unit::Percent),
                );
                out.put(
                    ChannelKey::new(GROUP_ROLLER, ROLLER_POSITION),
                    TypedValue::quantity(pos, digits::PERCENT, Unit::Percent),
                );
            }
        }
        ("S", "rollerstate") => out.put(
            ChannelKey::new(GROUP_ROLLER, ROLLER_STATE),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "rollerstopreason") => out.put(
            ChannelKey::new(GROUP_ROLLER, ROLLER_STOP_REASON),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "mode") => out.put(
            ChannelKey::new(GROUP_DEVICE, MODE),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "sensorop") => out.put(
            ChannelKey::new(GROUP_SENSORS, SENSOR_STATE),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "selftest") => out.put(
            ChannelKey::new(GROUP_DEVICE, SELF_TEST),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "gas") => out.put(
            ChannelKey::new(GROUP_SENSORS, ALARM_STATE),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "valvepos") => out.put(
            ChannelKey::new(GROUP_SENSORS, VALVE),
            TypedValue::quantity(sample.number()?, digits::PERCENT, Unit::Percent),
        ),
        ("S", "charger") => out.put(
            ChannelKey::new(GROUP_BATTERY, CHARGER),
            TypedValue::Bool(sample.is_one()),
        ),
        ("S", "wakeupevent") => out.put(
            ChannelKey::new(GROUP_DEVICE, WAKEUP_EVENT),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "sensorerror") => out.put(
            ChannelKey::new(GROUP_SENSORS, SENSOR_ERROR),
            TypedValue::Text(sample.text_value()),
        ),
        ("S", "tilt") => out.put(
            ChannelKey::new(GROUP_SENSORS, TILT),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::Degree),
        ),
        ("P", "power") => out.put(
            ChannelKey::new(meter()?, CURRENT_WATTS),
            TypedValue::quantity(sample.number()?, digits::WATT, Unit::Watt),
        ),
        ("E", "energy") | ("E", "returnedenergy") => {
            let raw = sample.number()?;
            let kwh = if ctx.profile.is_emeter {
                raw / 1000.0
            } else {
                raw / 60.0 / 1000.0
            };
            let channel = if desc == "energy" { TOTAL_KWH } else { RETURNED_KWH };
            out.put(
                ChannelKey::new(meter()?, channel),
                TypedValue::quantity(kwh, digits::KWH, Unit::KilowattHour),
            );
        }
        ("E", "totalworktime") => {}
        ("V", "voltage") => out.put(
            ChannelKey::new(meter()?, VOLTAGE),
            TypedValue::quantity(sample.number()?, digits::VOLT, Unit::Volt),
        ),
        ("I", "current") => out.put(
            ChannelKey::new(meter()?, CURRENT),
            TypedValue::quantity(sample.number()?, digits::AMPERE, Unit::Ampere),
        ),
        ("T", "devicetemp") => out.put(
            ChannelKey::new(GROUP_DEVICE, INTERNAL_TEMP),
            TypedValue::quantity(ctx.celsius(sensor, sample.number()?), digits::NONE, Unit::Celsius),
        ),
        ("T", "temp") => out.put(
            ChannelKey::new(GROUP_SENSORS, TEMPERATURE),
            TypedValue::quantity(ctx.celsius(sensor, sample.number()?), digits::TEMP, Unit::Celsius),
        ),
        ("T", "exttemp") => {
            let idx = ctx.cache.external_temperature_index(&sensor.id).ok_or_else(|| {
                DecodeWarning::invalid_value(&sensor.id, "not a known external probe")
            })?;
            out.put(
                ChannelKey::new(GROUP_SENSORS, format!("{TEMPERATURE}{idx}")),
                TypedValue::quantity(ctx.celsius(sensor, sample.number()?), digits::TEMP, Unit::Celsius),
            );
        }
        ("C", "concentration") => out.put(
            ChannelKey::new(GROUP_SENSORS, PPM),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::PartsPerMillion),
        ),
        ("EV", "inputevent") => {
            if let Some(event) = input_event_name(&sample.text_value()) {
                out.put(
                    ChannelKey::new(ctx.input_group(index()?), LAST_EVENT),
                    TypedValue::Text(event),
                );
            }
        }
        ("EVC", "inputeventcnt") => out.put(
            ChannelKey::new(ctx.input_group(index()?), EVENT_COUNT),
            TypedValue::Decimal(sample.number()?),
        ),
        _ => return Err(DecodeWarning::unhandled(sensor)),
    }
    Ok(())
}

/// 0-based output index of the block a sensor links to.
fn block_index(ctx: &DecodeContext<'_>, sensor: &SensorDefinition) -> Option<u32> {
    ctx.cache
        .block(&sensor.links)
        .and_then(|block| block.description.rsplit_once('_'))
        .and_then(|(_, n)| parse_index(n))
        .or_else(|| sensor.link_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DescriptionCache;
    use crate::profile::DeviceProfile;
    use crate::version::ProtocolVersion;

    const SHELLY25: &str = r#"{"blk":[{"I":1,"D":"relay_0"},{"I":2,"D":"relay_1"},{"I":3,"D":"device"}],
        "sen":[{"I":9103,"T":"EVC","D":"cfgChanged","R":"U16","L":3},
        {"I":1101,"T":"S","D":"output","R":"0/1","L":1},
        {"I":2101,"T":"S","D":"output","R":"0/1","L":2},
        {"I":4104,"T":"P","D":"power","U":"W","R":["0/3500","-1"],"L":2},
        {"I":4106,"T":"E","D":"energy","U":"Wmin","R":["U32","-1"],"L":2},
        {"I":1102,"T":"S","D":"rollerPos","R":"0/100","L":1},
        {"I":3104,"T":"T","D":"deviceTemp","U":"C","R":["-40/300","999"],"L":3},
        {"I":6102,"T":"A","D":"overpower","R":["0/1","-1"],"L":3},
        {"I":2102,"T":"EV","D":"inputEvent","R":["S/L",""],"L":2},
        {"I":2103,"T":"EVC","D":"inputEventCnt","R":"U16","L":2}]}"#;

    fn decode_sample(profile: &DeviceProfile, sample: StatusSample) -> Result<UpdateBatch, DecodeWarning> {
        let mut cache = DescriptionCache::new();
        cache
            .ingest_payload(SHELLY25, Some(ProtocolVersion::V2))
            .expect("fixture ingests");
        let ctx = DecodeContext::new(profile, &cache);
        let sensor = cache
            .sensor(&sample.sensor_id)
            .cloned()
            .ok_or_else(|| DecodeWarning::UnknownSensor(sample.sensor_id.clone()))?;
        let mut out = UpdateBatch::new();
        decode(&ctx, &sensor, &sample, &mut out)?;
        Ok(out)
    }

    fn key(group: &str, channel: &str) -> ChannelKey {
        ChannelKey::new(group, channel)
    }

    #[test]
    fn output_index_comes_from_block_name() {
        let profile = DeviceProfile::multi_relay(2);
        let out = decode_sample(&profile, StatusSample::numeric("2101", 1.0)).unwrap();
        assert_eq!(out.get(&key("relay2", "output")), Some(&TypedValue::Bool(true)));
        let out = decode_sample(&profile, StatusSample::numeric("1101", 0.0)).unwrap();
        assert_eq!(out.get(&key("relay1", "output")), Some(&TypedValue::Bool(false)));
    }

    #[test]
    fn power_and_energy_per_meter() {
        let profile = DeviceProfile::multi_relay(2);
        let out = decode_sample(&profile, StatusSample::numeric("4104", 120.5)).unwrap();
        assert_eq!(
            out.get(&key("meter2", "currentWatts")),
            Some(&TypedValue::quantity(120.5, 2, Unit::Watt))
        );
        let out = decode_sample(&profile, StatusSample::numeric("4106", 60_000.0)).unwrap();
        assert_eq!(
            out.get(&key("meter2", "totalKWH")),
            Some(&TypedValue::quantity(1.0, 3, Unit::KilowattHour))
        );
    }

    #[test]
    fn roller_position() {
        let profile = DeviceProfile::roller();
        let out = decode_sample(&profile, StatusSample::numeric("1102", 25.0)).unwrap();
        assert_eq!(
            out.get(&key("roller", "control")),
            Some(&TypedValue::quantity(75.0, 0, Unit::Percent))
        );

        let out = decode_sample(&profile, StatusSample::numeric("1102", -1.0)).unwrap();
        assert_eq!(out.get(&key("roller", "rollerpos")), Some(&TypedValue::Undefined));
        assert_eq!(out.get(&key("roller", "control")), Some(&TypedValue::Undefined));
    }

    #[test]
    fn device_temperature_and_alarm() {
        let profile = DeviceProfile::multi_relay(2);
        let out = decode_sample(&profile, StatusSample::numeric("3104", 52.4)).unwrap();
        assert_eq!(
            out.get(&key("device", "internalTemp")),
            Some(&TypedValue::quantity(52.0, 0, Unit::Celsius))
        );

        let out = decode_sample(&profile, StatusSample::numeric("6102", 1.0)).unwrap();
        assert_eq!(
            out.get(&key("device", "alarm")),
            Some(&TypedValue::Text("OVERPOWER".into()))
        );
    }

    #[test]
    fn input_events_use_block_index() {
        let profile = DeviceProfile::multi_relay(2);
        let out = decode_sample(&profile, StatusSample::text("2102", "L")).unwrap();
        assert_eq!(
            out.get(&key("input2", "lastEvent")),
            Some(&TypedValue::Text("LONG_PRESSED".into()))
        );
        let out = decode_sample(&profile, StatusSample::numeric("2103", 4.0)).unwrap();
        assert_eq!(out.get(&key("input2", "eventCount")), Some(&TypedValue::Decimal(4.0)));
    }

    #[test]
    fn oversized_block_suffix_is_not_an_index() {
        let mut cache = DescriptionCache::new();
        cache
            .ingest_payload(
                r#"{"blk":[{"I":1,"D":"relay_4294967295"}],
                    "sen":[{"I":4104,"T":"P","D":"power","L":1}]}"#,
                Some(ProtocolVersion::V2),
            )
            .unwrap();
        let sensor = cache.sensor("4104").cloned().unwrap();
        let profile = DeviceProfile::rgbw2_white();
        let ctx = DecodeContext::new(&profile, &cache);
        assert_eq!(block_index(&ctx, &sensor), Some(1));

        let mut out = UpdateBatch::new();
        decode(&ctx, &sensor, &StatusSample::numeric("4104", 12.5), &mut out).unwrap();
        assert!(out.get(&key("meter2", "currentWatts")).is_some());
    }

    #[test]
    fn unknown_v2_kind_is_unhandled() {
        let err = decode_sample(&DeviceProfile::multi_relay(2), StatusSample::numeric("9103", 1.0)).unwrap_err();
        assert!(matches!(err, DecodeWarning::Unhandled { .. }));
    }
}
