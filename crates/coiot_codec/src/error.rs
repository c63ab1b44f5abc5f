//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding of CoAP messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The datagram ended before the message was complete.
    #[error("truncated message: {context}")]
    Truncated {
        /// What was being read when input ran out.
        context: String,
    },

    /// The header carried a protocol version other than 1.
    #[error("unsupported CoAP version {0}")]
    UnsupportedVersion(u8),

    /// Token length outside 0..=8.
    #[error("invalid token length {0}")]
    InvalidTokenLength(usize),

    /// An option header used the reserved nibble value 15.
    #[error("reserved option nibble in option header")]
    ReservedOptionNibble,

    /// Payload marker present but no payload followed it.
    #[error("payload marker without payload")]
    EmptyPayloadAfterMarker,

    /// Option value longer than the format allows.
    #[error("option {number} value too long ({len} bytes)")]
    OptionTooLong {
        /// Option number.
        number: u16,
        /// Value length.
        len: usize,
    },

    /// Option number overflowed while accumulating deltas.
    #[error("option number overflow")]
    OptionNumberOverflow,

    /// Option value was not valid UTF-8.
    #[error("option {0} is not valid UTF-8")]
    InvalidUtf8(u16),

    /// Unsigned option value wider than 4 bytes.
    #[error("option {0} is not a valid unsigned integer")]
    InvalidUint(u16),
}

impl CodecError {
    /// Create a truncated-input error.
    pub fn truncated(context: impl Into<String>) -> Self {
        Self::Truncated {
            context: context.into(),
        }
    }

    /// Create an option-too-long error.
    pub fn option_too_long(number: u16, len: usize) -> Self {
        Self::OptionTooLong { number, len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            CodecError::truncated("header").to_string(),
            "truncated message: header"
        );
        assert_eq!(
            CodecError::option_too_long(11, 70000).to_string(),
            "option 11 value too long (70000 bytes)"
        );
    }
}
