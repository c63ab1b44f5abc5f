//! Canonical block and sensor definitions held by the description cache.

/// A logical device sub-unit (a relay output, a meter channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDefinition {
    /// Block id, referenced by sensor `links`.
    pub id: String,
    /// Human readable name, e.g. `Relay0`.
    pub description: String,
}

impl BlockDefinition {
    /// Creates a block definition.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// One measurable or actionable quantity, keyed by numeric id.
///
/// Stored definitions are always the output of the quirk normalizer, so
/// `sensor_type` is a canonical type code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDefinition {
    /// Sensor id as it appears in status samples.
    pub id: String,
    /// Description, e.g. `Power` or `energy counter total [w-min]`.
    pub description: String,
    /// Type code, e.g. `P`, `S`, `T`.
    pub sensor_type: String,
    /// Value range as reported by the device.
    pub value_range: String,
    /// Id of the block this sensor belongs to.
    pub links: String,
    /// Unit hint (`C`/`F`/`W`...) reported by v2 firmware, empty otherwise.
    pub unit: String,
}

impl SensorDefinition {
    /// Creates a sensor definition without range or unit.
    pub fn new(
        id: impl Into<String>,
        sensor_type: impl Into<String>,
        description: impl Into<String>,
        links: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            sensor_type: sensor_type.into(),
            value_range: String::new(),
            links: links.into(),
            unit: String::new(),
        }
    }

    /// Sets the value range.
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.value_range = range.into();
        self
    }

    /// Sets the unit hint.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Parses `links` as a 0-based block index, `None` if it is not a
    /// small non-negative integer.
    pub fn link_index(&self) -> Option<u32> {
        parse_index(&self.links)
    }

    /// Lower-cased description, used by every lookup table.
    pub fn description_key(&self) -> String {
        self.description.to_lowercase()
    }
}

/// Parses a block or output index. Devices have at most a handful of
/// outputs, so anything outside `u8` is rejected.
pub(crate) fn parse_index(text: &str) -> Option<u32> {
    text.trim().parse::<u8>().ok().map(u32::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_index_parsing() {
        let sensor = SensorDefinition::new("112", "S", "State", "0");
        assert_eq!(sensor.link_index(), Some(0));

        let sensor = SensorDefinition::new("112", "S", "State", "relay");
        assert_eq!(sensor.link_index(), None);

        let sensor = SensorDefinition::new("111", "P", "Power", "4294967295");
        assert_eq!(sensor.link_index(), None);

        let sensor = SensorDefinition::new("111", "P", "Power", "255");
        assert_eq!(sensor.link_index(), Some(255));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let sensor = SensorDefinition::new("3104", "T", "deviceTemp", "0")
            .with_range("-40/300")
            .with_unit("C");
        assert_eq!(sensor.value_range, "-40/300");
        assert_eq!(sensor.unit, "C");
        assert_eq!(sensor.description_key(), "devicetemp");
    }
}
