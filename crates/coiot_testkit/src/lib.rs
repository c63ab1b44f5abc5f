//! # CoIoT Testkit
//!
//! Test utilities for the CoIoT crates.
//!
//! This crate provides:
//! - Device description and status fixtures
//! - Builders for device datagrams
//! - Property-based test generators using proptest
//! - Fuzz targets for the parsing layers
//!
//! ## Usage
//!
//! ```rust
//! use coiot_testkit::prelude::*;
//!
//! init_tracing();
//! let datagram = status_packet(SHELLY1_ID, 1, SHELLY1_ON);
//! assert!(!datagram.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod packets;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::packets::*;
}

/// Installs a test subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
