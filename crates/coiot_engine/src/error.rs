//! Error types for the CoIoT engine.

use coiot_codec::CodecError;
use coiot_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the engine.
///
/// Only fatal errors and lifecycle misuse reach the caller of
/// `Session::start`; everything else is logged and turned into a state
/// transition.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Socket, bind or multicast error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the session cannot continue.
        fatal: bool,
    },

    /// Datagram is not a valid CoAP message.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Payload could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No tokio runtime is available for background tasks.
    #[error("no async runtime: {0}")]
    Runtime(String),

    /// Session has been stopped.
    #[error("session stopped")]
    Stopped,

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted operation or target state.
        to: String,
    },
}

impl EngineError {
    /// Creates a recoverable transport error (e.g. a failed send).
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            fatal: false,
        }
    }

    /// Creates a fatal transport error (bind or multicast join failure).
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            fatal: true,
        }
    }

    /// Returns true if the error must be surfaced to the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Transport { fatal, .. } => *fatal,
            EngineError::Runtime(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(EngineError::transport_fatal("bind 0.0.0.0:5683: address in use").is_fatal());
        assert!(!EngineError::transport_retryable("send failed").is_fatal());
        assert!(!EngineError::Stopped.is_fatal());
        assert!(!EngineError::Protocol(ProtocolError::UnsupportedVersion(3)).is_fatal());
    }

    #[test]
    fn error_display() {
        let err = EngineError::transport_fatal("join 224.0.1.187 failed");
        assert_eq!(err.to_string(), "transport error: join 224.0.1.187 failed");

        let err = EngineError::InvalidStateTransition {
            from: "Stopped".into(),
            to: "start".into(),
        };
        assert!(err.to_string().contains("Stopped"));
    }

    #[test]
    fn codec_errors_convert() {
        let err: EngineError = CodecError::UnsupportedVersion(2).into();
        assert!(matches!(err, EngineError::Codec(_)));
    }
}
