//! Error types for reactive-bridge.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Shared, type-erased error raised by a stream producer.
pub type ProducerError = Arc<dyn StdError + Send + Sync + 'static>;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error while writing response frames.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// The stream producer signalled failure.
    #[error("Producer error: {0}")]
    Producer(ProducerError),

    /// Protocol error (invalid frame, oversized payload, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The async request timed out before a result was produced.
    #[error("Async request timed out")]
    Timeout,

    /// The exchange was aborted by the transport (client disconnect).
    #[error("Exchange aborted")]
    Aborted,

    /// The output channel is closed.
    #[error("Channel closed")]
    ChannelClosed,

    /// Backpressure timeout - write buffer full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// Handler not found for the given method ID.
    #[error("Handler not found for method ID: {0}")]
    HandlerNotFound(u16),

    /// No registered return value handler supports the value.
    #[error("Unsupported return value: {0}")]
    UnsupportedReturnValue(&'static str),

    /// A tokio runtime was required but none is available.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(&'static str),
}

impl BridgeError {
    /// Wrap an arbitrary producer-side error.
    pub fn producer<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(error))
    }

    /// Producer error carrying only a message.
    pub fn producer_msg(message: impl Into<String>) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = message.into().into();
        Self::Producer(Arc::from(boxed))
    }

    /// Whether this error means the output side is already gone.
    #[inline]
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed | Self::Aborted)
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_msg_display() {
        let err = BridgeError::producer_msg("Unexpected");
        assert_eq!(err.to_string(), "Producer error: Unexpected");
    }

    #[test]
    fn test_producer_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = BridgeError::producer(io);
        assert!(matches!(err, BridgeError::Producer(_)));
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_is_channel_closed() {
        assert!(BridgeError::ChannelClosed.is_channel_closed());
        assert!(BridgeError::Aborted.is_channel_closed());
        assert!(!BridgeError::Timeout.is_channel_closed());
    }
}
