//! Domain-specific error types for the HICP protocol engine.
//!
//! The propagation policy is deliberately forgiving: transport failures
//! degrade to the disconnect signal, and almost everything else is
//! logged and skipped, because one malformed event must never take down
//! a connection.

use thiserror::Error;

/// The canonical error type for the HICP protocol.
#[derive(Debug, Error)]
pub enum HicpError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A message grew past the codec limit without terminating.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The first line of a message did not carry a known type.
    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),

    /// A state machine transition was attempted out of order.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The underlying stream reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A pipeline worker exited abnormally.
    #[error("pipeline worker failed: {0}")]
    Worker(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for HicpError {
    fn from(s: String) -> Self {
        HicpError::Other(s)
    }
}

impl From<&str> for HicpError {
    fn from(s: &str) -> Self {
        HicpError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HicpError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HicpError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = HicpError::MessageTooLarge {
            size: 2000,
            max: 1000,
        };
        assert!(e.to_string().contains("2000"));
        assert!(e.to_string().contains("1000"));

        let e = HicpError::UnknownMessageType("blorp".into());
        assert!(e.to_string().contains("blorp"));
    }

    #[test]
    fn from_string() {
        let e: HicpError = "something broke".into();
        assert!(matches!(e, HicpError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let e: HicpError = io_err.into();
        assert!(matches!(e, HicpError::Connection(_)));
    }
}
