//! Protocol generations and the device identifier option.

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;

/// CoIoT protocol generation announced in the device identifier option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// Legacy firmware, 3-digit sensor ids.
    V1,
    /// Firmware 1.8 and later, 4-digit sensor ids.
    V2,
}

impl ProtocolVersion {
    /// Maps the numeric version tag to a known generation.
    pub fn from_tag(tag: u32) -> ProtocolResult<Self> {
        match tag {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }

    /// Returns the numeric version tag.
    pub fn tag(self) -> u32 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    /// Returns true if `id` has the width this generation uses.
    pub fn accepts_sensor_id(self, id: &str) -> bool {
        match self {
            ProtocolVersion::V1 => id.len() <= 3,
            ProtocolVersion::V2 => id.len() >= 4,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.tag())
    }
}

/// Parsed value of the global device id option (`<model>#<hex-id>#<version>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Everything before the last `#`.
    pub device_id: String,
    /// Numeric version tag after the last `#`.
    pub version_tag: u32,
}

impl DeviceIdentity {
    /// Parses the option value.
    pub fn parse(raw: &str) -> ProtocolResult<Self> {
        let (device_id, tag) = raw
            .rsplit_once('#')
            .ok_or_else(|| ProtocolError::InvalidDeviceId(raw.to_string()))?;
        let version_tag = tag
            .trim()
            .parse::<u32>()
            .map_err(|_| ProtocolError::InvalidDeviceId(raw.to_string()))?;
        Ok(Self {
            device_id: device_id.to_string(),
            version_tag,
        })
    }

    /// Resolves the version tag to a known generation.
    pub fn version(&self) -> ProtocolResult<ProtocolVersion> {
        ProtocolVersion::from_tag(self.version_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_identity() {
        let identity = DeviceIdentity::parse("SHSW-1#A4CF12F45678#1").unwrap();
        assert_eq!(identity.device_id, "SHSW-1#A4CF12F45678");
        assert_eq!(identity.version_tag, 1);
        assert_eq!(identity.version().unwrap(), ProtocolVersion::V1);

        let identity = DeviceIdentity::parse("E8DB84AA1F2B#2").unwrap();
        assert_eq!(identity.device_id, "E8DB84AA1F2B");
        assert_eq!(identity.version().unwrap(), ProtocolVersion::V2);
    }

    #[test]
    fn parse_rejects_missing_version() {
        assert!(matches!(
            DeviceIdentity::parse("A4CF12F45678"),
            Err(ProtocolError::InvalidDeviceId(_))
        ));
        assert!(matches!(
            DeviceIdentity::parse("A4CF12F45678#x"),
            Err(ProtocolError::InvalidDeviceId(_))
        ));
    }

    #[test]
    fn unknown_version_tag() {
        let identity = DeviceIdentity::parse("A4CF12F45678#3").unwrap();
        assert_eq!(identity.version(), Err(ProtocolError::UnsupportedVersion(3)));
    }

    #[test]
    fn id_width_rules() {
        assert!(ProtocolVersion::V1.accepts_sensor_id("112"));
        assert!(!ProtocolVersion::V1.accepts_sensor_id("1101"));
        assert!(ProtocolVersion::V2.accepts_sensor_id("1101"));
        assert!(!ProtocolVersion::V2.accepts_sensor_id("112"));
    }
}
