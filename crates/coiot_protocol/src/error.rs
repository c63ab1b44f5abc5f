//! Error types for the protocol crate.

use crate::model::SensorDefinition;
use crate::version::ProtocolVersion;
use thiserror::Error;

/// Result type for payload parsing.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A packet could not be interpreted. The packet is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// JSON still failed to parse after repair.
    #[error("malformed JSON payload: {0}")]
    MalformedJson(String),

    /// The payload parsed but lacks the expected structure.
    #[error("invalid payload structure: {0}")]
    InvalidStructure(String),

    /// The device identifier option is missing or malformed.
    #[error("invalid device identifier {0:?}")]
    InvalidDeviceId(String),

    /// The device announced a protocol generation this engine does not know.
    #[error("unsupported CoIoT version {0}")]
    UnsupportedVersion(u32),
}

impl ProtocolError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson(err.to_string())
    }
}

/// A device description could not be ingested. Triggers rediscovery.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptionError {
    /// A sensor id width does not match the active protocol version.
    #[error("sensor id {id:?} is not valid for CoIoT {version}")]
    IdWidthMismatch {
        /// Offending sensor id.
        id: String,
        /// Version the cache is bound to.
        version: ProtocolVersion,
    },

    /// The description payload itself was unreadable.
    #[error(transparent)]
    Malformed(#[from] ProtocolError),
}

/// A single status sample could not be turned into state updates.
///
/// Warnings never abort a batch; the session logs them and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeWarning {
    /// No definition exists for the sample's sensor id.
    #[error("no sensor definition for id {0}")]
    UnknownSensor(String),

    /// The sensor links to a block that is not in the cache.
    #[error("sensor {sensor_id} links to unknown block {links:?}")]
    MissingBlock {
        /// Sensor id.
        sensor_id: String,
        /// Block id the sensor links to.
        links: String,
    },

    /// The strategy has no mapping for this sensor kind.
    #[error("unhandled sensor {sensor_id} (type {sensor_type}, description {description:?})")]
    Unhandled {
        /// Sensor id.
        sensor_id: String,
        /// Canonical type code.
        sensor_type: String,
        /// Canonical description.
        description: String,
    },

    /// The sample value is not usable for this sensor.
    #[error("invalid value for sensor {sensor_id}: {reason}")]
    InvalidValue {
        /// Sensor id.
        sensor_id: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The sensor's links field is not a numeric block index.
    #[error("sensor {sensor_id} has non-numeric links {links:?}")]
    InvalidLink {
        /// Sensor id.
        sensor_id: String,
        /// Raw links value.
        links: String,
    },
}

impl DecodeWarning {
    /// Creates an unhandled warning for a sensor.
    pub fn unhandled(sensor: &SensorDefinition) -> Self {
        Self::Unhandled {
            sensor_id: sensor.id.clone(),
            sensor_type: sensor.sensor_type.clone(),
            description: sensor.description.clone(),
        }
    }

    /// Creates an invalid link warning for a sensor.
    pub fn invalid_link(sensor: &SensorDefinition) -> Self {
        Self::InvalidLink {
            sensor_id: sensor.id.clone(),
            links: sensor.links.clone(),
        }
    }

    /// Creates an invalid value warning.
    pub fn invalid_value(sensor_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            sensor_id: sensor_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the warning points at a description/ingest inconsistency.
    pub fn indicates_stale_description(&self) -> bool {
        matches!(self, DecodeWarning::MissingBlock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DescriptionError::IdWidthMismatch {
            id: "112".into(),
            version: ProtocolVersion::V2,
        };
        assert_eq!(err.to_string(), "sensor id \"112\" is not valid for CoIoT v2");

        let err = ProtocolError::UnsupportedVersion(3);
        assert_eq!(err.to_string(), "unsupported CoIoT version 3");
    }

    #[test]
    fn stale_description_classification() {
        assert!(DecodeWarning::MissingBlock {
            sensor_id: "112".into(),
            links: "3".into()
        }
        .indicates_stale_description());
        assert!(!DecodeWarning::UnknownSensor("112".into()).indicates_stale_description());
    }

    #[test]
    fn json_errors_convert() {
        let err: ProtocolError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProtocolError::MalformedJson(_)));
    }
}
