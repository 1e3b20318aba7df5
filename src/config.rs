//! Bridge configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use reactive_bridge::codec::ContentType;
//! use reactive_bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::new()
//!     .async_timeout(Duration::from_secs(5))
//!     .emitter_timeout(Duration::from_secs(60))
//!     .default_content_type(ContentType::Json)
//!     .max_pending_frames(256);
//!
//! assert_eq!(config.async_timeout, Some(Duration::from_secs(5)));
//! assert_eq!(config.writer.max_pending_frames, 256);
//! ```

use std::time::Duration;

use crate::codec::ContentType;
use crate::writer::WriterConfig;

/// Default timeout for deferred results.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every exchange a registry serves.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Timeout applied to deferred results. `None` waits forever.
    pub async_timeout: Option<Duration>,
    /// Timeout applied to streaming emitters. `None` streams until done.
    pub emitter_timeout: Option<Duration>,
    /// Content type used when a handler gives no hint.
    pub default_content_type: ContentType,
    /// Writer task settings.
    pub writer: WriterConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            async_timeout: Some(DEFAULT_ASYNC_TIMEOUT),
            emitter_timeout: None,
            default_content_type: ContentType::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deferred result timeout.
    pub fn async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }

    /// Let deferred results wait forever.
    pub fn no_async_timeout(mut self) -> Self {
        self.async_timeout = None;
        self
    }

    /// Set the streaming emitter timeout.
    pub fn emitter_timeout(mut self, timeout: Duration) -> Self {
        self.emitter_timeout = Some(timeout);
        self
    }

    /// Set the default content type.
    pub fn default_content_type(mut self, content_type: ContentType) -> Self {
        self.default_content_type = content_type;
        self
    }

    /// Set the pending frame count at which async writes start waiting.
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.writer.max_pending_frames = limit;
        self
    }

    /// Set the backpressure timeout.
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.writer.backpressure_timeout = timeout;
        self
    }
}
