//! Handler module - request handling and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps method IDs to handlers
//! - [`RequestContext`] - writes an exchange's frames
//! - [`ReturnValue`] and [`ReturnValueHandlers`] - turn what a handler
//!   returned into a response
//! - [`AsyncManager`] - tracks exchanges answered after the handler returned
//!
//! # Example
//!
//! ```
//! use reactive_bridge::handler::{HandlerRegistry, ReturnValue};
//! use reactive_bridge::producer::{self, ProducerExt};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // First value of the producer becomes the response
//! registry.register("latest", |_: (), _ctx| async {
//!     Ok(ReturnValue::producer(producer::from_iter(vec!["a", "b"])))
//! });
//!
//! // Whole collection, aggregated before the bridge
//! registry.register("all", |_: (), _ctx| async {
//!     Ok(ReturnValue::producer(producer::from_iter(vec!["a", "b"]).collect_vec()))
//! });
//!
//! // Every value as its own chunk
//! registry.register("events", |_: (), _ctx| async {
//!     Ok(ReturnValue::sse(producer::from_iter(vec!["a", "b"])))
//! });
//! ```

mod async_manager;
mod context;
mod registry;
mod return_value;

pub use async_manager::AsyncManager;
pub use context::RequestContext;
pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, TypedHandler};
pub use return_value::{
    Exchange, ProducerReturnValueHandler, ReturnKind, ReturnValue, ReturnValueHandler,
    ReturnValueHandlers, StreamReturnValueHandler, ValueReturnValueHandler,
};
