//! Device description payload (`/cit/d`).
//!
//! Example payload:
//!
//! ```json
//! {"blk":[{"I":0,"D":"Relay0"}],
//!  "sen":[{"I":112,"T":"S","R":"0/1","L":0}],
//!  "act":[{"I":211,"D":"Switch","L":0}]}
//! ```
//!
//! Firmware is inconsistent about scalar types: ids and links arrive as
//! numbers or strings, ranges as strings or arrays. Every field is read
//! leniently into a string and the action list is ignored.

use crate::error::{ProtocolError, ProtocolResult};
use crate::model::{BlockDefinition, SensorDefinition};
use crate::repair::repair_json;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A parsed device description message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceDescription {
    /// Block entries.
    #[serde(rename = "blk")]
    pub blocks: Vec<RawBlock>,
    /// Sensor entries.
    #[serde(rename = "sen", default)]
    pub sensors: Vec<RawSensor>,
}

impl DeviceDescription {
    /// Parses a description payload, repairing known JSON defects first.
    pub fn parse(payload: &str) -> ProtocolResult<Self> {
        let repaired = repair_json(payload);
        let value: Value = serde_json::from_str(&repaired)?;
        if value.get("blk").is_none() {
            return Err(ProtocolError::invalid_structure(
                "description has no \"blk\" list",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Returns every entry that should become a sensor definition.
    ///
    /// Some firmware puts sensor fields on block entries; those blocks are
    /// also returned as sensors, ahead of the regular sensor list.
    pub fn sensor_candidates(&self) -> Vec<SensorDefinition> {
        self.blocks
            .iter()
            .filter_map(RawBlock::as_sensor)
            .chain(self.sensors.iter().map(RawSensor::to_definition))
            .collect()
    }
}

/// A block entry as sent by the device.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawBlock {
    /// Block id.
    #[serde(rename = "I", default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Block description.
    #[serde(rename = "D", default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Sensor type, only present on misreported entries.
    #[serde(rename = "T", default, deserialize_with = "lenient_string")]
    pub sensor_type: String,
    /// Sensor range, only present on misreported entries.
    #[serde(rename = "R", default, deserialize_with = "lenient_string")]
    pub range: String,
    /// Sensor links, only present on misreported entries.
    #[serde(rename = "L", default, deserialize_with = "lenient_string")]
    pub links: String,
}

impl RawBlock {
    /// Converts to a block definition.
    pub fn to_definition(&self) -> BlockDefinition {
        BlockDefinition::new(self.id.clone(), self.description.clone())
    }

    /// Returns the implicit sensor definition if this block carries a type.
    pub fn as_sensor(&self) -> Option<SensorDefinition> {
        if self.sensor_type.is_empty() {
            return None;
        }
        Some(
            SensorDefinition::new(
                self.id.clone(),
                self.sensor_type.clone(),
                self.description.clone(),
                self.links.clone(),
            )
            .with_range(self.range.clone()),
        )
    }
}

/// A sensor entry as sent by the device.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawSensor {
    /// Sensor id.
    #[serde(rename = "I", default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Description, often missing on older firmware.
    #[serde(rename = "D", default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Type code.
    #[serde(rename = "T", default, deserialize_with = "lenient_string")]
    pub sensor_type: String,
    /// Value range.
    #[serde(rename = "R", default, deserialize_with = "lenient_string")]
    pub range: String,
    /// Linked block id.
    #[serde(rename = "L", default, deserialize_with = "lenient_string")]
    pub links: String,
    /// Unit hint (v2 firmware).
    #[serde(rename = "U", default, deserialize_with = "lenient_string")]
    pub unit: String,
}

impl RawSensor {
    /// Converts to an (unnormalized) sensor definition.
    pub fn to_definition(&self) -> SensorDefinition {
        SensorDefinition::new(
            self.id.clone(),
            self.sensor_type.clone(),
            self.description.clone(),
            self.links.clone(),
        )
        .with_range(self.range.clone())
        .with_unit(self.unit.clone())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(scalar_to_string).unwrap_or_default())
}

/// Renders a JSON scalar as the string the device most likely meant.
///
/// Arrays are joined with `;`, objects are dropped.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null | Value::Object(_) => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(";"),
    }
}
