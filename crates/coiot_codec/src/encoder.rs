//! CoAP message encoder.

use crate::error::{CodecError, CodecResult};
use crate::message::{CoapOption, Message};

/// Largest option value the extended length encoding can express.
const MAX_OPTION_LEN: usize = 65535 + 269;

/// Encode a message to datagram bytes.
///
/// # Errors
///
/// Returns an error if the token is longer than 8 bytes or an option
/// value exceeds the maximum encodable length.
pub fn encode_message(message: &Message) -> CodecResult<Vec<u8>> {
    let mut encoder = MessageEncoder::with_capacity(4 + message.payload.len() + 32);
    encoder.encode(message)?;
    Ok(encoder.into_bytes())
}

/// A CoAP message encoder.
pub struct MessageEncoder {
    buffer: Vec<u8>,
}

impl MessageEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a message.
    pub fn encode(&mut self, message: &Message) -> CodecResult<()> {
        if message.token.len() > 8 {
            return Err(CodecError::InvalidTokenLength(message.token.len()));
        }

        self.buffer
            .push((1 << 6) | (message.message_type.bits() << 4) | message.token.len() as u8);
        self.buffer.push(message.code.to_byte());
        self.buffer
            .extend_from_slice(&message.message_id.to_be_bytes());
        self.buffer.extend_from_slice(&message.token);

        // Options must be written in ascending order for delta encoding.
        let mut options: Vec<&CoapOption> = message.options.iter().collect();
        options.sort_by_key(|o| o.number);

        let mut previous = 0u16;
        for option in options {
            self.encode_option(previous, option)?;
            previous = option.number;
        }

        if !message.payload.is_empty() {
            self.buffer.push(0xff);
            self.buffer.extend_from_slice(&message.payload);
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn encode_option(&mut self, previous: u16, option: &CoapOption) -> CodecResult<()> {
        if option.value.len() > MAX_OPTION_LEN {
            return Err(CodecError::option_too_long(
                option.number,
                option.value.len(),
            ));
        }

        let delta = usize::from(option.number - previous);
        let len = option.value.len();
        let (delta_nibble, delta_ext) = split_extended(delta);
        let (len_nibble, len_ext) = split_extended(len);

        self.buffer.push((delta_nibble << 4) | len_nibble);
        self.buffer.extend_from_slice(&delta_ext);
        self.buffer.extend_from_slice(&len_ext);
        self.buffer.extend_from_slice(&option.value);
        Ok(())
    }
}

impl Default for MessageEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a delta or length into its header nibble and extension bytes.
fn split_extended(value: usize) -> (u8, Vec<u8>) {
    match value {
        0..=12 => (value as u8, Vec::new()),
        13..=268 => (13, vec![(value - 13) as u8]),
        _ => (14, ((value - 269) as u16).to_be_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{option, Code, MessageType};

    #[test]
    fn encode_discovery_request() {
        let message = Message::get(MessageType::NonConfirmable, 0x1234, "/cit/d");
        let bytes = encode_message(&message).unwrap();
        assert_eq!(
            bytes,
            vec![0x50, 0x01, 0x12, 0x34, 0xb3, b'c', b'i', b't', 0x01, b'd']
        );
    }

    #[test]
    fn encode_confirmable_type_bits() {
        let message = Message::get(MessageType::Confirmable, 1, "/cit/s");
        let bytes = encode_message(&message).unwrap();
        assert_eq!(bytes[0], 0x40);
    }

    #[test]
    fn encode_extended_delta() {
        let message = Message::new(MessageType::NonConfirmable, Code::CONTENT, 2)
            .with_option(CoapOption::uint(option::COIOT_STATUS_SERIAL, 5));
        let bytes = encode_message(&message).unwrap();
        // delta 3420 -> nibble 14, extension 3420 - 269 = 3151 = 0x0c4f
        assert_eq!(&bytes[4..], &[0xe1, 0x0c, 0x4f, 0x05]);
    }

    #[test]
    fn encode_payload_marker() {
        let message = Message::new(MessageType::NonConfirmable, Code::CONTENT, 3)
            .with_payload(b"{}".to_vec());
        let bytes = encode_message(&message).unwrap();
        assert_eq!(&bytes[4..], &[0xff, b'{', b'}']);
    }

    #[test]
    fn encode_rejects_long_token() {
        let message = Message::new(MessageType::Confirmable, Code::GET, 1).with_token(vec![0; 9]);
        assert_eq!(
            encode_message(&message),
            Err(CodecError::InvalidTokenLength(9))
        );
    }
}
