//! # reactive-bridge
//!
//! Bridges push-based stream producers to request/response completion
//! models:
//!
//! - a single deferred result, settled once with the first value or the
//!   error ([`SingleResultBridge`])
//! - a streaming channel that receives every value in order
//!   ([`StreamingBridge`])
//!
//! Whichever side ends an exchange first, the producer (value, completion,
//! error) or the transport (timeout, client disconnect), the completion is
//! signalled exactly once and the subscription is cancelled exactly once.
//!
//! ## Architecture
//!
//! ```text
//! handler ─► ReturnValue ─► ReturnValueHandlers ─┬─► SingleResultBridge ─► DeferredResult ─┐
//!                                                └─► StreamingBridge ──► ResponseEmitter ─┤
//!                                                                        SseEmitter ──────┤
//!                                                                                         ▼
//!                                                            RequestContext ─► writer task ─► frames
//! ```
//!
//! ## Example
//!
//! ```
//! use reactive_bridge::producer::{self, ProducerExt};
//! use reactive_bridge::{DeferredResult, SingleResultBridge};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let result = DeferredResult::new();
//! let _bridge = SingleResultBridge::new(
//!     producer::from_iter(vec!["Spring.io", "JavaOne"]).collect_vec(),
//!     result.clone(),
//! );
//!
//! assert_eq!(result.outcome().await.unwrap(), vec!["Spring.io", "JavaOne"]);
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod deferred;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod latch;
pub mod lifecycle;
pub mod observer;
pub mod producer;
pub mod protocol;
pub mod subscription;
pub mod writer;

pub use bridge::{SingleResultBridge, StreamingBridge};
pub use config::BridgeConfig;
pub use deferred::{DeferredCompletion, DeferredResult};
pub use emitter::{ResponseEmitter, SseEmitter, StreamingChannel};
pub use error::{BridgeError, Result};
pub use handler::{HandlerRegistry, RequestContext, ReturnValue};
pub use latch::{TerminationLatch, TerminationState};
pub use observer::Observer;
pub use producer::{BoxProducer, StreamProducer};
pub use subscription::Subscription;
