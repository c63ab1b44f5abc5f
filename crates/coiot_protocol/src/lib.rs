//! # CoIoT Protocol
//!
//! Payload types and decoding rules for the CoIoT device protocol.
//!
//! This crate provides:
//! - Device description and status payload parsing (with JSON repair)
//! - The [`DescriptionCache`] and the table-driven quirk normalizer
//! - [`VersionStrategy`] decoders for CoIoT v1 and v2
//! - Typed values and channel keys handed to the device handler
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Example
//!
//! ```rust
//! use coiot_protocol::{
//!     parse_status, ChannelKey, DecodeContext, DescriptionCache, DeviceProfile,
//!     ProtocolVersion, TypedValue, UpdateBatch, VersionStrategy,
//! };
//!
//! let mut cache = DescriptionCache::new();
//! cache
//!     .ingest_payload(
//!         r#"{"blk":[{"I":0,"D":"Relay0"}],"sen":[{"I":112,"T":"S","R":"0/1","L":0}]}"#,
//!         Some(ProtocolVersion::V1),
//!     )
//!     .unwrap();
//!
//! let profile = DeviceProfile::relay();
//! let ctx = DecodeContext::new(&profile, &cache);
//! let strategy = VersionStrategy::for_version(ProtocolVersion::V1);
//! let mut updates = UpdateBatch::new();
//! for sample in parse_status(r#"{"G":[[0,112,1]]}"#).unwrap().samples {
//!     let sensor = cache.sensor(&sample.sensor_id).unwrap();
//!     strategy.decode(&ctx, sensor, &sample, &mut updates).unwrap();
//! }
//!
//! assert_eq!(
//!     updates.get(&ChannelKey::new("relay", "output")),
//!     Some(&TypedValue::Bool(true))
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
pub mod channels;
mod description;
mod error;
mod model;
mod profile;
pub mod quirks;
mod repair;
mod status;
mod strategy;
mod value;
mod version;

pub use cache::{DescriptionCache, IngestReport};
pub use description::{DeviceDescription, RawBlock, RawSensor};
pub use error::{DecodeWarning, DescriptionError, ProtocolError, ProtocolResult};
pub use model::{BlockDefinition, SensorDefinition};
pub use profile::{DeviceProfile, TemperatureUnit};
pub use repair::{repair_json, JSON_REPAIRS};
pub use status::{parse_status, StatusBatch, StatusSample};
pub use strategy::{DecodeContext, VersionStrategy, ROLLER_MAX_POSITION, ROLLER_MIN_POSITION};
pub use value::{round_to, ChannelKey, StateUpdate, TypedValue, Unit, UpdateBatch};
pub use version::{DeviceIdentity, ProtocolVersion};
