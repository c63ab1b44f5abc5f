//! # CoIoT Engine
//!
//! Session state machine and UDP transport for CoIoT devices.
//!
//! This crate provides:
//! - A shared UDP [`TransportEndpoint`] (multicast aware) and its registry
//! - The [`RequestTracker`] (one in-flight request per purpose)
//! - The per-device [`Session`] (discovery, duplicate suppression, decoding)
//! - The [`DeviceHandler`] trait the session publishes updates through
//!
//! ## Architecture
//!
//! Each session owns its description cache and is driven by two entry
//! points: [`Session::handle_datagram`], invoked by the transport for
//! every received packet, and [`Session::tick`], invoked periodically to
//! expire requests and retry discovery.
//!
//! ## Key Invariants
//!
//! - At most one request per kind is in flight
//! - One packet is processed at a time per session
//! - The protocol version never changes without clearing the cache
//! - Only fatal transport errors are returned to callers

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod endpoint;
mod error;
mod handler;
mod session;
mod tracker;
mod transport;

pub use config::{EndpointConfig, SessionConfig, COIOT_MULTICAST_GROUP, COIOT_PORT};
pub use endpoint::{EndpointRegistry, TransportEndpoint};
pub use error::{EngineError, EngineResult};
pub use handler::{DeviceHandler, MemoryDeviceHandler};
pub use session::{Session, SessionState, SessionStats};
pub use tracker::{
    RequestHandle, RequestKind, RequestOutcome, RequestTracker, DESCRIPTION_PATH, STATUS_PATH,
};
pub use transport::{DatagramListener, ListenerId, MockTransport, SentDatagram, Transport};
