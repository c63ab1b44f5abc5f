//! Device description cache.
//!
//! Holds the normalized block and sensor maps of one session. Ingest is
//! all-or-nothing: the id width of every incoming sensor is checked first,
//! then the new state is built on a copy and swapped in.

use crate::description::DeviceDescription;
use crate::error::DescriptionError;
use crate::model::{BlockDefinition, SensorDefinition};
use crate::quirks;
use crate::version::ProtocolVersion;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Descriptions that name an external temperature probe.
const EXTERNAL_TEMPERATURE: &[&str] = &["external temperature c", "external_temperature", "exttemp"];

/// Summary of one successful ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Blocks in the payload.
    pub blocks: usize,
    /// Sensors stored.
    pub sensors: usize,
    /// Ids of blocks created for composite sensor descriptions.
    pub synthetic_blocks: Vec<String>,
    /// Ids of sensors dropped because their block does not exist.
    pub rejected: Vec<String>,
}

impl IngestReport {
    /// Returns true if the description referenced blocks it never declared.
    pub fn is_inconsistent(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Normalized blocks and sensors keyed by device-assigned id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionCache {
    blocks: BTreeMap<String, BlockDefinition>,
    sensors: BTreeMap<String, SensorDefinition>,
}

impl DescriptionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and ingests a raw description payload.
    pub fn ingest_payload(
        &mut self,
        payload: &str,
        version: Option<ProtocolVersion>,
    ) -> Result<IngestReport, DescriptionError> {
        let description = DeviceDescription::parse(payload)?;
        self.ingest_description(&description, version)
    }

    /// Ingests a parsed description.
    ///
    /// With `version` set, every sensor id must have that generation's
    /// width; otherwise the cache is left untouched and
    /// [`DescriptionError::IdWidthMismatch`] is returned.
    pub fn ingest_description(
        &mut self,
        description: &DeviceDescription,
        version: Option<ProtocolVersion>,
    ) -> Result<IngestReport, DescriptionError> {
        let candidates = description.sensor_candidates();
        if let Some(version) = version {
            if let Some(bad) = candidates.iter().find(|s| !version.accepts_sensor_id(&s.id)) {
                return Err(DescriptionError::IdWidthMismatch {
                    id: bad.id.clone(),
                    version,
                });
            }
        }

        let mut blocks = self.blocks.clone();
        for raw in &description.blocks {
            trace!(block_id = %raw.id, description = %raw.description, "block");
            blocks.insert(raw.id.clone(), raw.to_definition());
        }

        // Normalize against the declared blocks, collecting synthetic ones.
        let mut synthetic: BTreeMap<String, BlockDefinition> = BTreeMap::new();
        let mut normalized = Vec::with_capacity(candidates.len());
        for raw in &candidates {
            let fixed = quirks::fix(raw, &blocks);
            if let Some(block) = fixed.required_block {
                synthetic.entry(block.id.clone()).or_insert(block);
            }
            normalized.push(fixed.sensor);
        }

        let mut report = IngestReport {
            blocks: description.blocks.len(),
            synthetic_blocks: synthetic.keys().cloned().collect(),
            ..IngestReport::default()
        };
        blocks.extend(synthetic);

        let mut sensors = self.sensors.clone();
        for sensor in normalized {
            if !blocks.contains_key(&sensor.links) {
                debug!(sensor_id = %sensor.id, links = %sensor.links, "sensor links to unknown block");
                report.rejected.push(sensor.id);
                continue;
            }
            trace!(
                sensor_id = %sensor.id,
                sensor_type = %sensor.sensor_type,
                description = %sensor.description,
                links = %sensor.links,
                "sensor"
            );
            sensors.insert(sensor.id.clone(), sensor);
            report.sensors += 1;
        }

        self.blocks = blocks;
        self.sensors = sensors;
        Ok(report)
    }

    /// Checks the stored sensor ids against a protocol generation.
    pub fn check_id_width(&self, version: ProtocolVersion) -> Result<(), DescriptionError> {
        match self.sensors.keys().find(|id| !version.accepts_sensor_id(id)) {
            Some(id) => Err(DescriptionError::IdWidthMismatch {
                id: id.clone(),
                version,
            }),
            None => Ok(()),
        }
    }

    /// Looks up a block.
    pub fn block(&self, id: &str) -> Option<&BlockDefinition> {
        self.blocks.get(id)
    }

    /// Looks up a sensor.
    pub fn sensor(&self, id: &str) -> Option<&SensorDefinition> {
        self.sensors.get(id)
    }

    /// All blocks, ordered by id.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.blocks.values()
    }

    /// All sensors, ordered by id.
    pub fn sensors(&self) -> impl Iterator<Item = &SensorDefinition> {
        self.sensors.values()
    }

    /// Number of stored sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Returns true if either map is empty, i.e. status samples cannot be resolved.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() || self.sensors.is_empty()
    }

    /// Drops all blocks and sensors.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.sensors.clear();
    }

    /// Returns the 1-based position of an external temperature probe among
    /// all external probes, ordered by sensor id.
    pub fn external_temperature_index(&self, sensor_id: &str) -> Option<u32> {
        self.sensors
            .values()
            .filter(|s| s.sensor_type == "T" && EXTERNAL_TEMPERATURE.contains(&s.description_key().as_str()))
            .position(|s| s.id == sensor_id)
            .and_then(|pos| u32::try_from(pos + 1).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    const SHELLY1: &str = r#"{"blk":[{"I":0,"D":"Relay0"}],"sen":[{"I":112,"T":"S","R":"0/1","L":0}]}"#;

    const RGBW2: &str = r#"{"blk":[{"I":0,"D":"RGBW2"}],"sen":[
        {"I":111,"T":"P","D":"Power_0","L":0},{"I":121,"T":"P","D":"Power_1","L":0},
        {"I":131,"T":"P","D":"Power_2","L":0},{"I":141,"T":"P","D":"Power_3","L":0},
        {"I":151,"T":"S","D":"Brightness_1","L":0}]}"#;

    #[test]
    fn ingest_shelly1() {
        let mut cache = DescriptionCache::new();
        let report = cache.ingest_payload(SHELLY1, Some(ProtocolVersion::V1)).unwrap();

        assert_eq!(report.blocks, 1);
        assert_eq!(report.sensors, 1);
        assert!(report.rejected.is_empty());
        assert_eq!(cache.block("0").unwrap().description, "Relay0");
        let sensor = cache.sensor("112").unwrap();
        assert_eq!(sensor.sensor_type, "S");
        assert_eq!(sensor.description, "State");
        assert!(!cache.is_empty());
    }

    #[test]
    fn composite_descriptions_create_blocks() {
        let mut cache = DescriptionCache::new();
        let report = cache.ingest_payload(RGBW2, None).unwrap();

        assert_eq!(report.synthetic_blocks, vec!["1", "2", "3"]);
        assert_eq!(cache.block("2").unwrap().description, "RGBW2_2");
        assert_eq!(cache.sensor("131").unwrap().links, "2");
        assert_eq!(cache.sensor("151").unwrap().links, "1");
        assert_eq!(cache.blocks().count(), 4);
    }

    #[test]
    fn width_mismatch_leaves_cache_untouched() {
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(SHELLY1, Some(ProtocolVersion::V1)).unwrap();
        let before = cache.clone();

        let err = cache
            .ingest_payload(SHELLY1, Some(ProtocolVersion::V2))
            .unwrap_err();
        assert_eq!(
            err,
            DescriptionError::IdWidthMismatch {
                id: "112".into(),
                version: ProtocolVersion::V2
            }
        );
        assert_eq!(cache, before);

        let v2 = r#"{"blk":[{"I":1,"D":"relay_0"}],"sen":[{"I":1101,"T":"S","D":"output","L":1},{"I":112,"T":"S","L":1}]}"#;
        assert!(cache.ingest_payload(v2, Some(ProtocolVersion::V2)).is_err());
        assert_eq!(cache, before);
    }

    #[test]
    fn unversioned_ingest_skips_width_check() {
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(SHELLY1, None).unwrap();
        assert!(cache.check_id_width(ProtocolVersion::V1).is_ok());
        assert!(cache.check_id_width(ProtocolVersion::V2).is_err());
    }

    #[test]
    fn dangling_links_are_rejected() {
        let payload = r#"{"blk":[{"I":0,"D":"Relay0"}],"sen":[{"I":112,"T":"S","L":0},{"I":113,"T":"P","L":7}]}"#;
        let mut cache = DescriptionCache::new();
        let report = cache.ingest_payload(payload, None).unwrap();
        assert_eq!(report.rejected, vec!["113"]);
        assert!(report.is_inconsistent());
        assert!(cache.sensor("113").is_none());
        assert!(cache.sensor("112").is_some());
    }

    #[test]
    fn block_with_type_becomes_sensor() {
        let payload = r#"{"blk":[{"I":0,"D":"Relay0"},{"I":111,"D":"W","T":"W","L":0}],"sen":[]}"#;
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(payload, None).unwrap();
        let sensor = cache.sensor("111").unwrap();
        assert_eq!((sensor.sensor_type.as_str(), sensor.description.as_str()), ("P", "Power"));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let mut cache = DescriptionCache::new();
        assert!(matches!(
            cache.ingest_payload("{\"blk\":[", None),
            Err(DescriptionError::Malformed(ProtocolError::MalformedJson(_)))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn ingest_twice_is_idempotent() {
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(RGBW2, None).unwrap();
        let once = cache.clone();
        cache.ingest_payload(RGBW2, None).unwrap();
        assert_eq!(cache, once);
    }

    #[test]
    fn external_temperature_ordinals() {
        let payload = r#"{"blk":[{"I":0,"D":"Relay0"},{"I":1,"D":"Sensors"}],"sen":[
            {"I":119,"T":"T","D":"External temperature C","L":1},
            {"I":120,"T":"T","D":"External temperature F","L":1},
            {"I":121,"T":"T","D":"external temperature c","L":1},
            {"I":122,"T":"T","D":"External_temperature","L":1}]}"#;
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(payload, None).unwrap();
        assert_eq!(cache.external_temperature_index("119"), Some(1));
        assert_eq!(cache.external_temperature_index("120"), None);
        assert_eq!(cache.external_temperature_index("121"), Some(2));
        assert_eq!(cache.external_temperature_index("122"), Some(3));
    }

    #[test]
    fn clear_empties_both_maps() {
        let mut cache = DescriptionCache::new();
        cache.ingest_payload(SHELLY1, None).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.sensor_count(), 0);
    }
}
