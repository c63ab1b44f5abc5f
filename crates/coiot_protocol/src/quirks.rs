//! Quirk normalizer.
//!
//! Rewrites raw sensor definitions into canonical ones, correcting known
//! firmware inconsistencies:
//!
//! - Shelly 1 reports no description and type `Switch`
//! - Shelly 1PM reports type `Overtemp`, or `W` without description
//! - Shelly Sense reports motion and battery with type `H`
//! - Shelly Bulb codes colors as the type (`Red`) instead of the description
//! - RGBW2 reports `Power_0`..`Power_3` (same for `VSwitch`, `Brightness`),
//!   all linked to block 0
//! - Shelly 4 Pro abbreviates energy counters as `e cnt`
//!
//! The normalizer never mutates the block map. When a composite
//! description needs a block that does not exist yet, the block is
//! returned in [`NormalizedSensor::required_block`] and the caller
//! inserts it.

use crate::model::{BlockDefinition, SensorDefinition};
use std::collections::BTreeMap;

/// Canonical CoIoT type codes. Normalized sensors always carry one of these.
pub const CANONICAL_TYPES: &[&str] = &[
    "A", "B", "C", "E", "EV", "EVC", "H", "I", "L", "M", "P", "S", "T", "V",
];

/// Description keywords whose `<name>_<index>` form is split per index.
const SPLIT_KINDS: &[&str] = &["power", "vswitch", "brightness"];

/// Raw type (lower-case) → canonical type and description.
const TYPE_REMAP: &[(&str, &str, &str)] = &[
    ("w", "P", "Power"),
    ("tc", "T", "Temperature C"),
    ("tf", "T", "Temperature F"),
    ("overtemp", "S", "Overtemp"),
    ("relay0", "S", "State"),
    ("switch", "S", "State"),
    ("vswitch", "S", "State"),
];

/// Description (lower-case) → canonical type and description.
const DESCRIPTION_REMAP: &[(&str, &str, &str)] = &[
    ("motion", "M", "Motion"),
    ("battery", "B", "Battery"),
    ("overtemp", "S", "Overtemp"),
    ("relay0", "S", "State"),
    ("switch", "S", "State"),
    ("vswitch", "S", "State"),
];

/// Abbreviated energy counter descriptions.
const ENERGY_COUNTER_ALIASES: &[&str] = &[
    "e cnt 0 [w-min]",
    "e cnt 1 [w-min]",
    "e cnt 2 [w-min]",
    "e cnt total [w-min]",
];

/// Raw type (lower-case) → (replacement type, default description) when
/// the description is empty.
const DEFAULT_DESCRIPTIONS: &[(&str, Option<&str>, &str)] = &[
    ("p", None, "Power"),
    ("t", None, "Temperature"),
    ("s", None, "State"),
    ("input", Some("S"), "Input"),
    ("output", Some("S"), "Output"),
    ("brightness", Some("S"), "Brightness"),
];

/// Bare type tokens that are really catch-all sensors named by the token.
const TOKEN_AS_DESCRIPTION: &[&str] = &["red", "green", "blue", "white", "gain", "temp"];

/// Result of normalizing one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSensor {
    /// The canonical sensor definition.
    pub sensor: SensorDefinition,
    /// A synthetic block the sensor links to that is not in the map yet.
    pub required_block: Option<BlockDefinition>,
}

/// Returns true if `code` is a canonical type code.
pub fn is_canonical_type(code: &str) -> bool {
    CANONICAL_TYPES.contains(&code)
}

/// Normalizes a raw sensor definition against the current block map.
pub fn fix(raw: &SensorDefinition, blocks: &BTreeMap<String, BlockDefinition>) -> NormalizedSensor {
    let mut sensor = raw.clone();
    let required_block = split_composite(&mut sensor, blocks);

    if let Some((_, t, d)) = lookup(TYPE_REMAP, &sensor.sensor_type) {
        sensor.sensor_type = t.to_string();
        sensor.description = d.to_string();
    }

    let desc = sensor.description_key();
    if let Some((_, t, d)) = lookup(DESCRIPTION_REMAP, &desc) {
        sensor.sensor_type = t.to_string();
        sensor.description = d.to_string();
    } else if ENERGY_COUNTER_ALIASES.contains(&desc.as_str()) {
        sensor.description = desc.replace("e cnt", "energy counter");
    }

    if sensor.description.is_empty() {
        apply_default_description(&mut sensor);
    }

    canonicalize_type(&mut sensor);

    NormalizedSensor {
        sensor,
        required_block,
    }
}

/// Splits `Power_2` into description `Power` linked to block `2`.
fn split_composite(
    sensor: &mut SensorDefinition,
    blocks: &BTreeMap<String, BlockDefinition>,
) -> Option<BlockDefinition> {
    let desc = sensor.description_key();
    if !SPLIT_KINDS.iter().any(|kind| desc.contains(kind)) {
        return None;
    }
    let (name, index) = sensor.description.split_once('_')?;
    if index.is_empty() {
        return None;
    }
    let (name, index) = (name.to_string(), index.to_string());
    sensor.description = name;
    sensor.links = index.clone();

    if blocks.contains_key(&index) {
        return None;
    }
    let base = blocks
        .get("0")
        .map(|b| b.description.as_str())
        .unwrap_or("Block");
    Some(BlockDefinition::new(index.clone(), format!("{base}_{index}")))
}

fn apply_default_description(sensor: &mut SensorDefinition) {
    let token = sensor.sensor_type.to_lowercase();
    if let Some((_, t, d)) = DEFAULT_DESCRIPTIONS.iter().find(|(k, _, _)| *k == token) {
        if let Some(t) = t {
            sensor.sensor_type = t.to_string();
        }
        sensor.description = d.to_string();
    } else if TOKEN_AS_DESCRIPTION.contains(&token.as_str()) {
        sensor.description = sensor.sensor_type.clone();
        sensor.sensor_type = "S".into();
    }
}

/// Upper-cases the type; unknown tokens become catch-all `S`.
fn canonicalize_type(sensor: &mut SensorDefinition) {
    let upper = sensor.sensor_type.to_uppercase();
    if is_canonical_type(&upper) {
        sensor.sensor_type = upper;
        return;
    }
    if sensor.description.is_empty() {
        sensor.description = sensor.sensor_type.clone();
    }
    sensor.sensor_type = "S".into();
}

fn lookup<'a>(
    table: &'a [(&'a str, &'a str, &'a str)],
    key: &str,
) -> Option<&'a (&'a str, &'a str, &'a str)> {
    let key = key.to_lowercase();
    table.iter().find(|(k, _, _)| *k == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks() -> BTreeMap<String, BlockDefinition> {
        let mut blocks = BTreeMap::new();
        blocks.insert("0".to_string(), BlockDefinition::new("0", "Relay0"));
        blocks
    }

    fn fixed(sensor_type: &str, description: &str) -> SensorDefinition {
        fix(&SensorDefinition::new("112", sensor_type, description, "0"), &blocks()).sensor
    }

    #[test]
    fn shelly1_switch_without_description() {
        let s = fixed("Switch", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "State"));
    }

    #[test]
    fn catch_all_without_description_is_relay_state() {
        let s = fixed("S", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "State"));
    }

    #[test]
    fn shelly1pm_quirks() {
        let s = fixed("Overtemp", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Overtemp"));

        let s = fixed("W", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("P", "Power"));

        let s = fixed("tC", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("T", "Temperature C"));

        let s = fixed("tF", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("T", "Temperature F"));
    }

    #[test]
    fn relay0_and_vswitch_map_to_state() {
        for raw in ["relay0", "VSwitch", "switch"] {
            let s = fixed(raw, "");
            assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "State"));
            let s = fixed("S", raw);
            assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "State"));
        }
    }

    #[test]
    fn sense_motion_and_battery_types_are_forced() {
        let s = fixed("H", "motion");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("M", "Motion"));

        let s = fixed("H", "battery");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("B", "Battery"));
    }

    #[test]
    fn description_overtemp_is_catch_all() {
        let s = fixed("T", "overtemp");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Overtemp"));
    }

    #[test]
    fn energy_counter_abbreviation_is_expanded() {
        let s = fixed("S", "E cnt total [W-min]");
        assert_eq!(s.description, "energy counter total [w-min]");
        let s = fixed("S", "e cnt 1 [w-min]");
        assert_eq!(s.description, "energy counter 1 [w-min]");
    }

    #[test]
    fn default_descriptions_by_type() {
        assert_eq!(fixed("P", "").description, "Power");
        assert_eq!(fixed("T", "").description, "Temperature");

        let s = fixed("input", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Input"));
        let s = fixed("output", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Output"));
        let s = fixed("brightness", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Brightness"));
    }

    #[test]
    fn bulb_color_tokens_become_catch_all() {
        for token in ["Red", "Green", "Blue", "White", "Gain", "Temp"] {
            let s = fixed(token, "");
            assert_eq!(s.sensor_type, "S");
            assert_eq!(s.description, token);
        }
    }

    #[test]
    fn unknown_type_falls_back_to_catch_all() {
        let s = fixed("ToState", "");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "ToState"));

        let s = fixed("x", "Mystery");
        assert_eq!((s.sensor_type.as_str(), s.description.as_str()), ("S", "Mystery"));
    }

    #[test]
    fn lower_case_codes_are_upper_cased() {
        assert_eq!(fixed("h", "Humidity").sensor_type, "H");
        assert_eq!(fixed("evc", "inputEventCnt").sensor_type, "EVC");
    }

    #[test]
    fn composite_power_creates_block() {
        let raw = SensorDefinition::new("111", "P", "Power_2", "0");
        let normalized = fix(&raw, &blocks());

        assert_eq!(normalized.sensor.description, "Power");
        assert_eq!(normalized.sensor.links, "2");
        assert_eq!(normalized.sensor.sensor_type, "P");
        assert_eq!(
            normalized.required_block,
            Some(BlockDefinition::new("2", "Relay0_2"))
        );
    }

    #[test]
    fn composite_uses_existing_block() {
        let raw = SensorDefinition::new("121", "S", "Brightness_0", "0");
        let normalized = fix(&raw, &blocks());
        assert_eq!(normalized.sensor.links, "0");
        assert_eq!(normalized.required_block, None);
    }

    #[test]
    fn composite_vswitch_splits_then_maps_to_state() {
        let raw = SensorDefinition::new("131", "S", "VSwitch_3", "0");
        let normalized = fix(&raw, &blocks());
        assert_eq!(normalized.sensor.description, "State");
        assert_eq!(normalized.sensor.links, "3");
    }

    #[test]
    fn composite_without_block_zero_uses_generic_name() {
        let raw = SensorDefinition::new("111", "P", "power_1", "0");
        let normalized = fix(&raw, &BTreeMap::new());
        assert_eq!(
            normalized.required_block,
            Some(BlockDefinition::new("1", "Block_1"))
        );
    }

    #[test]
    fn non_split_kinds_keep_underscores() {
        let s = fixed("T", "external_temperature");
        assert_eq!(s.description, "external_temperature");
        assert_eq!(s.links, "0");
    }

    #[test]
    fn fix_is_idempotent_on_examples() {
        for (t, d) in [
            ("Switch", ""),
            ("W", ""),
            ("P", "Power_2"),
            ("H", "battery"),
            ("Red", ""),
            ("ToState", ""),
            ("S", "e cnt 0 [w-min]"),
        ] {
            let once = fix(&SensorDefinition::new("112", t, d, "0"), &blocks()).sensor;
            let twice = fix(&once, &blocks()).sensor;
            assert_eq!(once.sensor_type, twice.sensor_type);
            assert_eq!(once.description, twice.description);
        }
    }
}
