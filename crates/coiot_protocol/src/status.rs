//! Status payload (`/cit/s`).
//!
//! `{"G":[[channel, sensor_id, value], ...]}` where `value` is a number,
//! or a string for event and gas-sensor kinds.

use crate::description::scalar_to_string;
use crate::error::{DecodeWarning, ProtocolError, ProtocolResult};
use crate::repair::repair_json;
use serde_json::Value;

/// One entry of a status batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSample {
    /// Sensor id the value belongs to.
    pub sensor_id: String,
    /// Numeric value; 0 when the device sent a string.
    pub numeric_value: f64,
    /// String value, if the device sent one.
    pub string_value: Option<String>,
}

impl StatusSample {
    /// Creates a numeric sample.
    pub fn numeric(sensor_id: impl Into<String>, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            numeric_value: value,
            string_value: None,
        }
    }

    /// Creates a string sample.
    pub fn text(sensor_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            numeric_value: 0.0,
            string_value: Some(value.into()),
        }
    }

    /// Returns the value as a number.
    ///
    /// String values are accepted if they parse as a number.
    pub fn number(&self) -> Result<f64, DecodeWarning> {
        let value = match &self.string_value {
            Some(s) => s.trim().parse::<f64>().map_err(|_| DecodeWarning::InvalidValue {
                sensor_id: self.sensor_id.clone(),
                reason: format!("{s:?} is not numeric"),
            })?,
            None => self.numeric_value,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DecodeWarning::InvalidValue {
                sensor_id: self.sensor_id.clone(),
                reason: "non-finite number".into(),
            })
        }
    }

    /// Returns the value as text: the string value, or the number formatted.
    pub fn text_value(&self) -> String {
        match &self.string_value {
            Some(s) => s.clone(),
            None => self.numeric_value.to_string(),
        }
    }

    /// Returns true if the numeric value is exactly 1.
    pub fn is_one(&self) -> bool {
        self.number().map(|v| v == 1.0).unwrap_or(false)
    }
}

/// A parsed status payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusBatch {
    /// Samples in payload order.
    pub samples: Vec<StatusSample>,
    /// Entries that could not be read as a sample.
    pub skipped: usize,
}

/// Parses a status payload, repairing known JSON defects first.
///
/// Individual malformed entries are counted in [`StatusBatch::skipped`]
/// rather than failing the whole payload.
pub fn parse_status(payload: &str) -> ProtocolResult<StatusBatch> {
    let value: Value = serde_json::from_str(&repair_json(payload))?;
    let entries = value
        .get("G")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::invalid_structure("status has no \"G\" list"))?;

    let mut batch = StatusBatch::default();
    for entry in entries {
        match parse_entry(entry) {
            Some(sample) => batch.samples.push(sample),
            None => batch.skipped += 1,
        }
    }
    Ok(batch)
}

fn parse_entry(entry: &Value) -> Option<StatusSample> {
    let items = entry.as_array()?;
    if items.len() < 3 {
        return None;
    }
    let sensor_id = match &items[1] {
        Value::Number(_) | Value::String(_) => scalar_to_string(&items[1]),
        _ => return None,
    };
    if sensor_id.is_empty() {
        return None;
    }
    match &items[2] {
        Value::Number(n) => Some(StatusSample::numeric(sensor_id, n.as_f64()?)),
        Value::String(s) => Some(StatusSample::text(sensor_id, s.clone())),
        Value::Bool(b) => Some(StatusSample::numeric(sensor_id, f64::from(u8::from(*b)))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_status() {
        let batch = parse_status(r#"{"G":[[0,112,1]]}"#).unwrap();
        assert_eq!(batch.samples, vec![StatusSample::numeric("112", 1.0)]);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn parse_string_values() {
        let batch = parse_status(r#"{"G":[[0,118,"S"],[0,119,3]]}"#).unwrap();
        assert_eq!(batch.samples[0], StatusSample::text("118", "S"));
        assert_eq!(batch.samples[1].number().unwrap(), 3.0);
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let batch = parse_status(r#"{"G":[[0,112],[0,{"x":1},1],[0,111,null],[0,113,5]]}"#).unwrap();
        assert_eq!(batch.samples, vec![StatusSample::numeric("113", 5.0)]);
        assert_eq!(batch.skipped, 3);
    }

    #[test]
    fn parse_repairs_before_decoding() {
        let batch = parse_status(r#"{"G":[[0,112,1][0,111,20.5]]}"#).unwrap();
        assert_eq!(batch.samples.len(), 2);
    }

    #[test]
    fn parse_rejects_non_status() {
        assert!(matches!(
            parse_status(r#"{"blk":[]}"#),
            Err(ProtocolError::InvalidStructure(_))
        ));
        assert!(matches!(
            parse_status("{\"G\":[[0,112"),
            Err(ProtocolError::MalformedJson(_))
        ));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(StatusSample::text("1", " 2.5 ").number().unwrap(), 2.5);
        assert!(matches!(
            StatusSample::text("1", "warmup").number(),
            Err(DecodeWarning::InvalidValue { .. })
        ));
        assert!(StatusSample::numeric("1", 1.0).is_one());
        assert!(!StatusSample::text("1", "x").is_one());
    }
}
