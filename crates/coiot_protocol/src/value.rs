//! Typed values and channel keys produced by the version strategies.

use std::collections::BTreeMap;
use std::fmt;

/// Measurement unit attached to a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Watt.
    Watt,
    /// Kilowatt hour.
    KilowattHour,
    /// Volt.
    Volt,
    /// Ampere.
    Ampere,
    /// Degree Celsius.
    Celsius,
    /// Percent.
    Percent,
    /// Angle in degrees.
    Degree,
    /// Lux.
    Lux,
    /// Parts per million.
    PartsPerMillion,
}

impl Unit {
    /// Returns the unit symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Watt => "W",
            Unit::KilowattHour => "kWh",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Celsius => "°C",
            Unit::Percent => "%",
            Unit::Degree => "°",
            Unit::Lux => "lx",
            Unit::PartsPerMillion => "ppm",
        }
    }
}

/// A value published on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// On/off, open/closed.
    Bool(bool),
    /// Unitless decimal.
    Decimal(f64),
    /// Decimal with unit.
    Quantity {
        /// Numeric value.
        value: f64,
        /// Unit.
        unit: Unit,
    },
    /// Free text (sensor states, event names).
    Text(String),
    /// The device reported no usable value.
    Undefined,
}

impl TypedValue {
    /// Creates a quantity rounded to `digits` decimal places.
    pub fn quantity(value: f64, digits: u32, unit: Unit) -> Self {
        TypedValue::Quantity {
            value: round_to(value, digits),
            unit,
        }
    }

    /// Returns the numeric content, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Decimal(v) => Some(*v),
            TypedValue::Quantity { value, .. } => Some(*value),
            TypedValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(true) => write!(f, "ON"),
            TypedValue::Bool(false) => write!(f, "OFF"),
            TypedValue::Decimal(v) => write!(f, "{v}"),
            TypedValue::Quantity { value, unit } => write!(f, "{value} {}", unit.symbol()),
            TypedValue::Text(s) => write!(f, "{s}"),
            TypedValue::Undefined => write!(f, "UNDEF"),
        }
    }
}

/// Rounds half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// The semantic identifier a value is published under: `group#channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    /// Channel group, e.g. `relay1` or `meter`.
    pub group: String,
    /// Channel within the group, e.g. `output`.
    pub channel: String,
}

impl ChannelKey {
    /// Creates a channel key.
    pub fn new(group: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            channel: channel.into(),
        }
    }

    /// Returns true if the group is an indexed meter (`meter1`, `meter2`...).
    pub fn is_indexed_meter(&self) -> bool {
        self.group
            .strip_prefix(crate::channels::GROUP_METER)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group, self.channel)
    }
}

/// One decoded update, the engine's only externally visible output.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// Channel the value is published under.
    pub key: ChannelKey,
    /// The value.
    pub value: TypedValue,
}

/// Updates collected for one status batch, ordered by key, last write wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    updates: BTreeMap<ChannelKey, TypedValue>,
}

impl UpdateBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an update, replacing any earlier value for the same key.
    pub fn put(&mut self, key: ChannelKey, value: TypedValue) {
        self.updates.insert(key, value);
    }

    /// Returns the value recorded for a key.
    pub fn get(&self, key: &ChannelKey) -> Option<&TypedValue> {
        self.updates.get(key)
    }

    /// Number of distinct channels touched.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Iterates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &TypedValue)> {
        self.updates.iter()
    }

    /// Returns true if any update targets an indexed meter group.
    pub fn touches_indexed_meter(&self) -> bool {
        self.updates.keys().any(ChannelKey::is_indexed_meter)
    }

    /// Consumes the batch into ordered updates.
    pub fn into_updates(self) -> Vec<StateUpdate> {
        self.updates
            .into_iter()
            .map(|(key, value)| StateUpdate { key, value })
            .collect()
    }
}
