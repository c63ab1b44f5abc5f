//! Fuzz targets for the parsing layers.
//!
//! Each target must return without panicking for any input. They can be
//! driven by cargo-fuzz or by the proptest harness below.

use coiot_codec::{decode_message, encode_message};
use coiot_protocol::{parse_status, repair_json, DescriptionCache, DeviceDescription, DeviceIdentity};

/// Fuzz target for datagram decoding.
///
/// A datagram that decodes must re-encode and decode to the same message.
pub fn fuzz_decode_message(data: &[u8]) {
    if let Ok(message) = decode_message(data) {
        if let Ok(encoded) = encode_message(&message) {
            let decoded = decode_message(&encoded);
            assert_eq!(decoded.ok(), Some(message), "re-encoded datagram differs");
        }
    }
}

/// Fuzz target for payload parsing and description ingest.
pub fn fuzz_payload(data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    let _ = repair_json(&text);
    let _ = parse_status(&text);
    if let Ok(description) = DeviceDescription::parse(&text) {
        let mut cache = DescriptionCache::new();
        let _ = cache.ingest_description(&description, None);
    }
}

/// Fuzz target for the device id option.
pub fn fuzz_device_identity(data: &[u8]) {
    if let Ok(identity) = DeviceIdentity::parse(&String::from_utf8_lossy(data)) {
        let _ = identity.version();
    }
}
