//! # CoIoT Codec
//!
//! Minimal CoAP (RFC 7252) message encoding/decoding for CoIoT devices.
//!
//! Only the subset CoIoT needs is implemented:
//! - CON/NON GET requests with an empty token
//! - Option delta/length encoding including the 13/14 extensions
//! - The CoIoT vendor options (global device id, status serial, validity)
//! - Payload marker handling
//!
//! There is no retransmission, block-wise transfer or observe registration
//! here; this crate only turns datagrams into [`Message`]s and back.
//!
//! ## Usage
//!
//! ```
//! use coiot_codec::{decode_message, encode_message, Message, MessageType};
//!
//! let request = Message::get(MessageType::NonConfirmable, 42, "/cit/s");
//! let bytes = encode_message(&request).unwrap();
//!
//! let decoded = decode_message(&bytes).unwrap();
//! assert_eq!(decoded.uri_path(), "/cit/s");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod message;

pub use decoder::{decode_message, MessageDecoder};
pub use encoder::{encode_message, MessageEncoder};
pub use error::{CodecError, CodecResult};
pub use message::{option, CoapOption, Code, Message, MessageType};

/// Trait for types that can be encoded to a CoAP datagram.
pub trait Encode {
    /// Encode this value to datagram bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from a CoAP datagram.
pub trait Decode: Sized {
    /// Decode this value from datagram bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Message {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_message(self)
    }
}

impl Decode for Message {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_message(bytes)
    }
}
