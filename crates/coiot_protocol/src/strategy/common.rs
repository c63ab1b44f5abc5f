//! Sensor kinds decoded identically by every protocol generation.

use super::{digits, DecodeContext};
use crate::channels::*;
use crate::error::DecodeWarning;
use crate::model::SensorDefinition;
use crate::status::StatusSample;
use crate::value::{ChannelKey, TypedValue, Unit, UpdateBatch};

/// Decodes the shared kinds. Returns `Ok(false)` if the sensor is not one
/// of them so the caller can try its own table.
pub(super) fn decode(
    ctx: &DecodeContext<'_>,
    sensor: &SensorDefinition,
    sample: &StatusSample,
    index: Option<u32>,
    out: &mut UpdateBatch,
) -> Result<bool, DecodeWarning> {
    let block_index = || index.ok_or_else(|| DecodeWarning::invalid_link(sensor));

    match sensor.sensor_type.as_str() {
        "B" => out.put(
            ChannelKey::new(GROUP_BATTERY, BATTERY_LEVEL),
            TypedValue::quantity(sample.number()?, digits::PERCENT, Unit::Percent),
        ),
        "H" => out.put(
            ChannelKey::new(GROUP_SENSORS, HUMIDITY),
            TypedValue::quantity(sample.number()?, digits::TEMP, Unit::Percent),
        ),
        "L" => out.put(
            ChannelKey::new(GROUP_SENSORS, LUX),
            TypedValue::quantity(sample.number()?, digits::NONE, Unit::Lux),
        ),
        "M" => out.put(
            ChannelKey::new(GROUP_SENSORS, MOTION),
            TypedValue::Bool(sample.is_one()),
        ),
        "S" => match sensor.description_key().as_str() {
            "state" | "output" => out.put(
                ChannelKey::new(ctx.output_group(block_index()?), OUTPUT),
                TypedValue::Bool(sample.is_one()),
            ),
            "input" => out.put(
                ChannelKey::new(ctx.input_group(block_index()?), INPUT),
                TypedValue::Bool(sample.is_one()),
            ),
            "brightness" => out.put(
                ChannelKey::new(ctx.output_group(block_index()?), BRIGHTNESS),
                TypedValue::quantity(sample.number()?, digits::PERCENT, Unit::Percent),
            ),
            color @ ("red" | "green" | "blue" | "white") => {
                let channel = match color {
                    "red" => RED,
                    "green" => GREEN,
                    "blue" => BLUE,
                    _ => WHITE,
                };
                out.put(
                    ChannelKey::new(GROUP_COLOR, channel),
                    TypedValue::Decimal(sample.number()?),
                )
            }
            "gain" => out.put(
                ChannelKey::new(GROUP_COLOR, GAIN),
                TypedValue::quantity(sample.number()?, digits::PERCENT, Unit::Percent),
            ),
            _ => return Ok(false),
        },
        _ => return Ok(false),
    }
    Ok(true)
}
