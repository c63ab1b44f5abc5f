//! CoAP message decoder.

use crate::error::{CodecError, CodecResult};
use crate::message::{CoapOption, Code, Message, MessageType};

/// Decode a message from datagram bytes.
///
/// # Errors
///
/// Returns an error if the datagram is truncated, uses an unsupported
/// version, or contains a malformed option.
pub fn decode_message(bytes: &[u8]) -> CodecResult<Message> {
    let mut decoder = MessageDecoder::new(bytes);
    decoder.decode()
}

/// A CoAP message decoder over a single datagram.
pub struct MessageDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the message.
    pub fn decode(&mut self) -> CodecResult<Message> {
        let first = self.read_byte("header")?;
        let version = first >> 6;
        if version != 1 {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let message_type = MessageType::from_bits(first >> 4);
        let token_len = usize::from(first & 0x0f);
        if token_len > 8 {
            return Err(CodecError::InvalidTokenLength(token_len));
        }

        let code = Code::from_byte(self.read_byte("code")?);
        let mid = self.read_bytes(2, "message id")?;
        let message_id = u16::from_be_bytes([mid[0], mid[1]]);
        let token = self.read_bytes(token_len, "token")?.to_vec();

        let mut message = Message::new(message_type, code, message_id).with_token(token);

        let mut number = 0u16;
        while !self.is_empty() {
            let header = self.read_byte("option header")?;
            if header == 0xff {
                if self.is_empty() {
                    return Err(CodecError::EmptyPayloadAfterMarker);
                }
                message.payload = self.remaining().to_vec();
                self.pos = self.data.len();
                break;
            }

            let delta = self.read_extended(header >> 4, "option delta")?;
            let len = self.read_extended(header & 0x0f, "option length")?;

            number = u16::try_from(u32::from(number) + delta)
                .map_err(|_| CodecError::OptionNumberOverflow)?;
            let value = self.read_bytes(len as usize, "option value")?.to_vec();
            message.options.push(CoapOption::new(number, value));
        }

        Ok(message)
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self, context: &str) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::truncated(context));
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize, context: &str) -> CodecResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::truncated(context));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_extended(&mut self, nibble: u8, context: &str) -> CodecResult<u32> {
        match nibble {
            0..=12 => Ok(u32::from(nibble)),
            13 => Ok(u32::from(self.read_byte(context)?) + 13),
            14 => {
                let ext = self.read_bytes(2, context)?;
                Ok(u32::from(u16::from_be_bytes([ext[0], ext[1]])) + 269)
            }
            _ => Err(CodecError::ReservedOptionNibble),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_message;
    use crate::message::option;

    #[test]
    fn decode_status_publish() {
        let payload = br#"{"G":[[0,112,1]]}"#;
        let message = Message::new(MessageType::NonConfirmable, Code::COIOT_PUBLISH, 0x0102)
            .with_option(CoapOption::string(option::URI_PATH, "cit"))
            .with_option(CoapOption::string(option::URI_PATH, "s"))
            .with_option(CoapOption::string(
                option::COIOT_GLOBAL_DEVID,
                "SHSW-1#A4CF12F45678#1",
            ))
            .with_option(CoapOption::uint(option::COIOT_STATUS_VALIDITY, 38400))
            .with_option(CoapOption::uint(option::COIOT_STATUS_SERIAL, 256))
            .with_payload(payload.to_vec());

        let bytes = encode_message(&message).unwrap();
        let decoded = decode_message(&bytes).unwrap();

        assert_eq!(decoded.code, Code::COIOT_PUBLISH);
        assert_eq!(decoded.uri_path(), "/cit/s");
        assert_eq!(
            decoded
                .option(option::COIOT_GLOBAL_DEVID)
                .unwrap()
                .as_str()
                .unwrap(),
            "SHSW-1#A4CF12F45678#1"
        );
        assert_eq!(
            decoded
                .option(option::COIOT_STATUS_SERIAL)
                .unwrap()
                .as_uint()
                .unwrap(),
            256
        );
        assert_eq!(decoded.payload, payload.to_vec());
    }

    #[test]
    fn decode_hand_built_request() {
        let bytes = [0x50, 0x01, 0x12, 0x34, 0xb3, b'c', b'i', b't', 0x01, b'd'];
        let message = decode_message(&bytes).unwrap();
        assert_eq!(message.message_type, MessageType::NonConfirmable);
        assert_eq!(message.code, Code::GET);
        assert_eq!(message.message_id, 0x1234);
        assert_eq!(message.uri_path(), "/cit/d");
        assert!(message.payload.is_empty());
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(matches!(
            decode_message(&[0x50, 0x01]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_rejects_wrong_version() {
        assert_eq!(
            decode_message(&[0x90, 0x01, 0x00, 0x01]),
            Err(CodecError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn decode_rejects_marker_without_payload() {
        assert_eq!(
            decode_message(&[0x50, 0x45, 0x00, 0x01, 0xff]),
            Err(CodecError::EmptyPayloadAfterMarker)
        );
    }

    #[test]
    fn decode_rejects_reserved_nibble() {
        assert_eq!(
            decode_message(&[0x50, 0x45, 0x00, 0x01, 0xf1, 0x00]),
            Err(CodecError::ReservedOptionNibble)
        );
    }

    #[test]
    fn decode_rejects_truncated_option_value() {
        assert!(matches!(
            decode_message(&[0x50, 0x45, 0x00, 0x01, 0xb3, b'c']),
            Err(CodecError::Truncated { .. })
        ));
    }
}
