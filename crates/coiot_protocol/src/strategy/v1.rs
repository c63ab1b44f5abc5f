//! CoIoT v1 decoding.
//!
//! Legacy firmware reports free-text descriptions and links sensors to
//! 0-based block ids, so the link is the output index.

use super::{common, digits, input_event_name, DecodeContext, ROLLER_MAX_POSITION, ROLLER_MIN_POSITION};
use crate::channels::*;
use crate::error::DecodeWarning;
use crate::model::SensorDefinition;
use crate::status::StatusSample;
use crate::value::{ChannelKey, TypedValue, Unit, UpdateBatch};

pub(super) fn decode(
    ctx: &DecodeContext<'_>,
    sensor: &SensorDefinition,
    sample: &StatusSample,
    out: &mut UpdateBatch,
) -> Result<(), DecodeWarning> {
    let index = sensor.link_index();
    if common::decode(ctx, sensor, sample, index, out)? {
        return Ok(());
    }
    let index = || index.ok_or_else(|| DecodeWarning::invalid_link(sensor));

    match sensor.sensor_type.as_str() {
        "T" => decode_temperature(ctx, sensor, sample, out),
        "P" => {
            let profile = ctx.profile;
            let group = if profile.num_meters == 1 {
                GROUP_METER.to_string()
            } else if profile.is_emeter {
                // 3EM links are already 1-based
                format!("{GROUP_METER}{}", index()?)
            } else {
                format!("{GROUP_METER}{}", index()? + 1)
            };
            out.put(
                ChannelKey::new(group, CURRENT_WATTS),
                TypedValue::quantity(sample.number()?, digits::WATT, Unit::Watt),
            );
            Ok(())
        }
        "S" => decode_catch_all(ctx, sensor, sample, index, out),
        _ => Err(DecodeWarning::unhandled(sensor)),
    }
}

fn decode_temperature(
    ctx: &DecodeContext<'_>,
    sensor: &SensorDefinition,
    sample: &StatusSample,
    out: &mut UpdateBatch,
) -> Result<(), DecodeWarning> {
    match sensor.description_key().as_str() {
        "temperature" => {
            let celsius = ctx.celsius(sensor, sample.number()?);
            out.put(
                ChannelKey::new(GROUP_SENSORS, TEMPERATURE),
                TypedValue::quantity(celsius, digits::TEMP, Unit::Celsius),
            );
        }
        "temperature c" => out.put(
            ChannelKey::new(GROUP_DEVICE, INTERNAL_TEMP),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::Celsius),
        ),
        // Fahrenheit twins of the Celsius readings
        "temperature f" | "external temperature f" => {}
        "external temperature c" | "external_temperature" => {
            let idx = ctx.cache.external_temperature_index(&sensor.id).ok_or_else(|| {
                DecodeWarning::invalid_value(&sensor.id, "not a known external probe")
            })?;
            out.put(
                ChannelKey::new(GROUP_SENSORS, format!("{TEMPERATURE}{idx}")),
                TypedValue::quantity(sample.number()?, digits::TEMP, Unit::Celsius),
            );
        }
        _ => return Err(DecodeWarning::unhandled(sensor)),
    }
    Ok(())
}

fn decode_catch_all(
    ctx: &DecodeContext<'_>,
    sensor: &SensorDefinition,
    sample: &StatusSample,
    index: impl Fn() -> Result<u32, DecodeWarning>,
    out: &mut UpdateBatch,
) -> Result<(), DecodeWarning> {
    let relay = || index().map(|i| ctx.relay_group(i));

    match sensor.description_key().as_str() {
        "overtemp" => {
            if sample.is_one() {
                out.put(
                    ChannelKey::new(GROUP_DEVICE, ALARM),
                    TypedValue::Text("OVERTEMP".into()),
                );
            }
        }
        "energy counter 0 [w-min]" => out.put(
            ChannelKey::new(relay()?, LAST_POWER1),
            TypedValue::quantity(sample.number()?, digits::WATT, Unit::Watt),
        ),
        "energy counter 1 [w-min]" | "energy counter 2 [w-min]" => {}
        "energy counter total [w-min]" | "energy counter total [w-h]" => {
            let raw = sample.number()?;
            let kwh = if ctx.profile.is_emeter {
                raw / 1000.0
            } else {
                raw / 60.0 / 1000.0
            };
            out.put(
                ChannelKey::new(relay()?, TOTAL_KWH),
                TypedValue::quantity(kwh, digits::KWH, Unit::KilowattHour),
            );
        }
        "voltage" => out.put(
            ChannelKey::new(relay()?, VOLTAGE),
            TypedValue::quantity(sample.number()?, digits::VOLT, Unit::Volt),
        ),
        "current" => out.put(
            ChannelKey::new(relay()?, CURRENT),
            TypedValue::quantity(sample.number()?, digits::AMPERE, Unit::Ampere),
        ),
        "pf" => out.put(
            ChannelKey::new(relay()?, POWER_FACTOR),
            TypedValue::Decimal(sample.number()?),
        ),
        "position" => {
            // Rollers report up to 101%
            let pos = sample
                .number()?
                .clamp(ROLLER_MIN_POSITION, ROLLER_MAX_POSITION);
            out.put(
                ChannelKey::new(GROUP_ROLLER, ROLLER_CONTROL),
                TypedValue::quantity(ROLLER_MAX_POSITION - pos, digits::PERCENT, Unit::Percent),
            );
            out.put(
                ChannelKey::new(GROUP_ROLLER, ROLLER_POSITION),
                TypedValue::quantity(pos, digits::PERCENT, Unit::Percent),
            );
        }
        "input event" => {
            if let Some(event) = input_event_name(&sample.text_value()) {
                out.put(
                    ChannelKey::new(ctx.input_group(index()?), LAST_EVENT),
                    TypedValue::Text(event),
                );
            }
        }
        "input event counter" => out.put(
            ChannelKey::new(ctx.input_group(index()?), EVENT_COUNT),
            TypedValue::Decimal(sample.number()?),
        ),
        "flood" => out.put(
            ChannelKey::new(GROUP_SENSORS, FLOOD),
            TypedValue::Bool(sample.is_one()),
        ),
        "tilt" => out.put(
            ChannelKey::new(GROUP_SENSORS, TILT),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::Degree),
        ),
        "vibration" => out.put(
            ChannelKey::new(GROUP_SENSORS, VIBRATION),
            TypedValue::Bool(sample.is_one()),
        ),
        "temp" | "colortemperature" => out.put(
            ChannelKey::new(ctx.color_temp_group(), COLOR_TEMPERATURE),
            TypedValue::quantity(
                ctx.color_temp_percent(sample.number()?),
                digits::PERCENT,
                Unit::Percent,
            ),
        ),
        "sensor state" => out.put(
            ChannelKey::new(GROUP_SENSORS, SENSOR_STATE),
            TypedValue::Text(sample.text_value()),
        ),
        "alarm state" => out.put(
            ChannelKey::new(GROUP_SENSORS, ALARM_STATE),
            TypedValue::Text(sample.text_value()),
        ),
        "self-test state" => out.put(
            ChannelKey::new(GROUP_DEVICE, SELF_TEST),
            TypedValue::Text(sample.text_value()),
        ),
        "concentration" => out.put(
            ChannelKey::new(GROUP_SENSORS, PPM),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::PartsPerMillion),
        ),
        "sensorerror" => out.put(
            ChannelKey::new(GROUP_SENSORS, SENSOR_ERROR),
            TypedValue::Text(sample.text_value()),
        ),
        _ => return Err(DecodeWarning::unhandled(sensor)),
    }
    Ok(())
}
