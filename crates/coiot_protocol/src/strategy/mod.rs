//! Protocol version strategies.
//!
//! A [`VersionStrategy`] turns one status sample of a normalized sensor
//! into channel updates. The variant is a pure function of the version tag
//! in the device identifier and never changes within a session.

mod common;
mod v1;
mod v2;

use crate::cache::DescriptionCache;
use crate::channels;
use crate::error::DecodeWarning;
use crate::model::SensorDefinition;
use crate::profile::{DeviceProfile, TemperatureUnit};
use crate::status::StatusSample;
use crate::value::UpdateBatch;
use crate::version::ProtocolVersion;

/// Roller positions are reported up to 101.
pub const ROLLER_MAX_POSITION: f64 = 100.0;
/// Lowest valid roller position.
pub const ROLLER_MIN_POSITION: f64 = 0.0;

/// Decimal places per quantity kind.
pub(crate) mod digits {
    pub const WATT: u32 = 2;
    pub const KWH: u32 = 3;
    pub const TEMP: u32 = 1;
    pub const VOLT: u32 = 1;
    pub const AMPERE: u32 = 2;
    pub const PERCENT: u32 = 0;
    pub const NONE: u32 = 0;
}

/// Everything a strategy may consult besides the sample itself.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Device class.
    pub profile: &'a DeviceProfile,
    /// Normalized description of the device.
    pub cache: &'a DescriptionCache,
}

impl<'a> DecodeContext<'a> {
    /// Creates a decode context.
    pub fn new(profile: &'a DeviceProfile, cache: &'a DescriptionCache) -> Self {
        Self { profile, cache }
    }

    /// Relay group for a 0-based output index.
    pub(crate) fn relay_group(&self, index: u32) -> String {
        channels::indexed_group(channels::GROUP_RELAY, self.profile.num_relays, index)
    }

    /// Output group: `light` for dimmers and bulbs, `relay` otherwise.
    pub(crate) fn output_group(&self, index: u32) -> String {
        if self.profile.is_light {
            let outputs = self.profile.num_relays.max(self.profile.num_meters);
            channels::indexed_group(channels::GROUP_LIGHT, outputs, index)
        } else {
            self.relay_group(index)
        }
    }

    /// Input group for a 0-based input index.
    pub(crate) fn input_group(&self, index: u32) -> String {
        channels::indexed_group(channels::GROUP_INPUT, self.profile.num_inputs, index)
    }

    /// Group receiving color temperature updates.
    pub(crate) fn color_temp_group(&self) -> &'static str {
        if self.profile.in_color {
            channels::GROUP_COLOR
        } else {
            channels::GROUP_WHITE
        }
    }

    /// Converts a temperature to Celsius according to the sensor unit hint,
    /// falling back to the device setting.
    pub(crate) fn celsius(&self, sensor: &SensorDefinition, value: f64) -> f64 {
        let fahrenheit = if sensor.unit.is_empty() {
            self.profile.temperature_unit == TemperatureUnit::Fahrenheit
        } else {
            sensor.unit.eq_ignore_ascii_case("F")
        };
        if fahrenheit {
            (value - 32.0) * 5.0 / 9.0
        } else {
            value
        }
    }

    /// Maps a color temperature in Kelvin to percent of the device range.
    pub(crate) fn color_temp_percent(&self, kelvin: f64) -> f64 {
        let min = f64::from(self.profile.min_color_temp);
        let max = f64::from(self.profile.max_color_temp);
        if max <= min {
            return 0.0;
        }
        ((kelvin - min) / (max - min) * 100.0).clamp(0.0, 100.0)
    }
}

/// Decoder for one protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStrategy {
    /// Legacy decoding, 3-digit sensor ids.
    V1,
    /// CoIoT v2, 4-digit sensor ids and camelCase descriptions.
    V2,
}

impl VersionStrategy {
    /// Selects the strategy for a protocol generation.
    pub fn for_version(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V1 => VersionStrategy::V1,
            ProtocolVersion::V2 => VersionStrategy::V2,
        }
    }

    /// Protocol generation this strategy decodes.
    pub fn version(self) -> ProtocolVersion {
        match self {
            VersionStrategy::V1 => ProtocolVersion::V1,
            VersionStrategy::V2 => ProtocolVersion::V2,
        }
    }

    /// Decodes one sample into `out`.
    ///
    /// Returns [`DecodeWarning::Unhandled`] for sensor kinds without a
    /// mapping; the caller logs it and continues with the next sample.
    pub fn decode(
        self,
        ctx: &DecodeContext<'_>,
        sensor: &SensorDefinition,
        sample: &StatusSample,
        out: &mut UpdateBatch,
    ) -> Result<(), DecodeWarning> {
        match self {
            VersionStrategy::V1 => v1::decode(ctx, sensor, sample, out),
            VersionStrategy::V2 => v2::decode(ctx, sensor, sample, out),
        }
    }
}

/// Maps the short input event codes to event names.
pub(crate) fn input_event_name(code: &str) -> Option<String> {
    let name = match code.trim() {
        "" => return None,
        "S" => "SHORT_PRESSED",
        "SS" => "DOUBLE_PRESSED",
        "SSS" => "TRIPLE_PRESSED",
        "L" => "LONG_PRESSED",
        "SL" => "SHORT_LONG_PRESSED",
        "LS" => "LONG_SHORT_PRESSED",
        other => other,
    };
    Some(name.to_string())
}
