//! Bridges from a stream producer to the two completion models.
//!
//! - [`SingleResultBridge`] settles a [`DeferredCompletion`] once with the
//!   first value or the error
//! - [`StreamingBridge`] forwards every value to a [`StreamingChannel`]
//!
//! Both subscribe eagerly when constructed and tear the subscription down
//! exactly once, on producer termination or on the transport's timeout or
//! completion, whichever comes first.
//!
//! [`DeferredCompletion`]: crate::deferred::DeferredCompletion
//! [`StreamingChannel`]: crate::emitter::StreamingChannel

mod single;
mod streaming;

pub use single::SingleResultBridge;
pub use streaming::StreamingBridge;
