//! CoAP message model.

use crate::error::{CodecError, CodecResult};
use std::fmt;

/// Option numbers used by CoIoT devices.
pub mod option {
    /// Uri-Host (RFC 7252).
    pub const URI_HOST: u16 = 3;
    /// Uri-Port (RFC 7252).
    pub const URI_PORT: u16 = 7;
    /// Uri-Path, repeated once per path segment (RFC 7252).
    pub const URI_PATH: u16 = 11;
    /// Content-Format (RFC 7252).
    pub const CONTENT_FORMAT: u16 = 12;
    /// CoIoT global device id, `"<model>#<id>#<version>"`.
    pub const COIOT_GLOBAL_DEVID: u16 = 3332;
    /// CoIoT status validity period.
    pub const COIOT_STATUS_VALIDITY: u16 = 3412;
    /// CoIoT status serial number.
    pub const COIOT_STATUS_SERIAL: u16 = 3420;
}

/// CoAP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Confirmable (CON).
    Confirmable,
    /// Non-confirmable (NON).
    NonConfirmable,
    /// Acknowledgement (ACK).
    Acknowledgement,
    /// Reset (RST).
    Reset,
}

impl MessageType {
    /// Returns the 2-bit wire value.
    pub fn bits(self) -> u8 {
        match self {
            MessageType::Confirmable => 0,
            MessageType::NonConfirmable => 1,
            MessageType::Acknowledgement => 2,
            MessageType::Reset => 3,
        }
    }

    /// Builds a message type from its 2-bit wire value.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

/// CoAP code in `class.detail` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code {
    /// Code class (0 = request, 2 = success, 4/5 = error).
    pub class: u8,
    /// Code detail.
    pub detail: u8,
}

impl Code {
    /// Empty message (0.00).
    pub const EMPTY: Code = Code::new(0, 0);
    /// GET request (0.01).
    pub const GET: Code = Code::new(0, 1);
    /// Content response (2.05).
    pub const CONTENT: Code = Code::new(2, 5);
    /// Unsolicited CoIoT status publish (0.30).
    pub const COIOT_PUBLISH: Code = Code::new(0, 30);

    /// Creates a code from class and detail.
    pub const fn new(class: u8, detail: u8) -> Self {
        Self { class, detail }
    }

    /// Decodes the single code byte.
    pub fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 5, byte & 0x1f)
    }

    /// Encodes to the single code byte.
    pub fn to_byte(self) -> u8 {
        ((self.class & 0x07) << 5) | (self.detail & 0x1f)
    }

    /// Returns true for request codes (class 0, except EMPTY).
    pub fn is_request(self) -> bool {
        self.class == 0 && self.detail != 0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class, self.detail)
    }
}

/// A single CoAP option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    /// Option number.
    pub number: u16,
    /// Raw option value.
    pub value: Vec<u8>,
}

impl CoapOption {
    /// Creates an option from raw bytes.
    pub fn new(number: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            value: value.into(),
        }
    }

    /// Creates a string option.
    pub fn string(number: u16, value: &str) -> Self {
        Self::new(number, value.as_bytes().to_vec())
    }

    /// Creates an unsigned option using the shortest big-endian encoding.
    pub fn uint(number: u16, value: u32) -> Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        Self::new(number, bytes[skip..].to_vec())
    }

    /// Interprets the value as UTF-8.
    pub fn as_str(&self) -> CodecResult<&str> {
        std::str::from_utf8(&self.value).map_err(|_| CodecError::InvalidUtf8(self.number))
    }

    /// Interprets the value as a big-endian unsigned integer (0-4 bytes).
    pub fn as_uint(&self) -> CodecResult<u32> {
        if self.value.len() > 4 {
            return Err(CodecError::InvalidUint(self.number));
        }
        Ok(self
            .value
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
    }
}

/// A CoAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub message_type: MessageType,
    /// Request or response code.
    pub code: Code,
    /// Message id used for deduplication and ACK matching.
    pub message_id: u16,
    /// Token (0-8 bytes). CoIoT requests use an empty token.
    pub token: Vec<u8>,
    /// Options, kept sorted by number.
    pub options: Vec<CoapOption>,
    /// Payload bytes (empty if none).
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a message without token, options or payload.
    pub fn new(message_type: MessageType, code: Code, message_id: u16) -> Self {
        Self {
            message_type,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Creates a GET request for an absolute path such as `/cit/d`.
    pub fn get(message_type: MessageType, message_id: u16, path: &str) -> Self {
        let mut message = Self::new(message_type, Code::GET, message_id);
        message.set_uri_path(path);
        message
    }

    /// Sets the token.
    pub fn with_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.token = token.into();
        self
    }

    /// Adds an option.
    pub fn with_option(mut self, option: CoapOption) -> Self {
        self.add_option(option);
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Adds an option, keeping options ordered by number.
    ///
    /// Repeated options keep their insertion order.
    pub fn add_option(&mut self, option: CoapOption) {
        let pos = self
            .options
            .iter()
            .position(|o| o.number > option.number)
            .unwrap_or(self.options.len());
        self.options.insert(pos, option);
    }

    /// Replaces all Uri-Path options with the segments of `path`.
    pub fn set_uri_path(&mut self, path: &str) {
        self.options.retain(|o| o.number != option::URI_PATH);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.add_option(CoapOption::string(option::URI_PATH, segment));
        }
    }

    /// Returns the first option with the given number.
    pub fn option(&self, number: u16) -> Option<&CoapOption> {
        self.options.iter().find(|o| o.number == number)
    }

    /// Returns the Uri-Path as `/seg1/seg2`, or an empty string if absent.
    pub fn uri_path(&self) -> String {
        let mut path = String::new();
        for opt in self.options.iter().filter(|o| o.number == option::URI_PATH) {
            path.push('/');
            path.push_str(&String::from_utf8_lossy(&opt.value));
        }
        path
    }

    /// Returns the payload as lossy UTF-8.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_byte_conversion() {
        assert_eq!(Code::GET.to_byte(), 0x01);
        assert_eq!(Code::CONTENT.to_byte(), 0x45);
        assert_eq!(Code::COIOT_PUBLISH.to_byte(), 0x1e);
        assert_eq!(Code::from_byte(0x45), Code::CONTENT);
        assert_eq!(Code::CONTENT.to_string(), "2.05");
        assert!(Code::GET.is_request());
        assert!(!Code::EMPTY.is_request());
    }

    #[test]
    fn uint_option_uses_shortest_form() {
        assert!(CoapOption::uint(3420, 0).value.is_empty());
        assert_eq!(CoapOption::uint(3420, 0x7f).value, vec![0x7f]);
        assert_eq!(CoapOption::uint(3420, 0x1234).value, vec![0x12, 0x34]);
        assert_eq!(CoapOption::uint(3420, 0x1234).as_uint().unwrap(), 0x1234);
    }

    #[test]
    fn uint_option_rejects_wide_values() {
        let opt = CoapOption::new(3420, vec![1, 2, 3, 4, 5]);
        assert_eq!(opt.as_uint(), Err(CodecError::InvalidUint(3420)));
    }

    #[test]
    fn options_stay_sorted() {
        let message = Message::new(MessageType::NonConfirmable, Code::CONTENT, 1)
            .with_option(CoapOption::uint(option::COIOT_STATUS_SERIAL, 7))
            .with_option(CoapOption::string(option::COIOT_GLOBAL_DEVID, "SHSW-1#A1B2C3#1"))
            .with_option(CoapOption::string(option::URI_PATH, "cit"))
            .with_option(CoapOption::string(option::URI_PATH, "s"));

        let numbers: Vec<u16> = message.options.iter().map(|o| o.number).collect();
        assert_eq!(numbers, vec![11, 11, 3332, 3420]);
        assert_eq!(message.uri_path(), "/cit/s");
    }

    #[test]
    fn get_builds_path_segments() {
        let message = Message::get(MessageType::Confirmable, 9, "/cit/d");
        assert_eq!(message.code, Code::GET);
        assert_eq!(message.uri_path(), "/cit/d");
        assert!(message.token.is_empty());
    }
}
