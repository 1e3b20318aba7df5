//! Handler registry for dispatching requests by method ID.
//!
//! The registry maps method names to handlers and manages ID assignment.
//! IDs are assigned sequentially starting from 1 (0 is reserved).
//!
//! Handlers return a [`ReturnValue`]; the registry hands it to its
//! [`ReturnValueHandlers`] chain, which writes the response now or
//! registers async work with the registry's [`AsyncManager`].
//!
//! # Example
//!
//! ```
//! use reactive_bridge::handler::{HandlerRegistry, ReturnValue};
//! use reactive_bridge::producer;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("echo", |data: String, _ctx| async move {
//!     ReturnValue::value(&data)
//! });
//! registry.register("count", |n: u32, _ctx| async move {
//!     Ok(ReturnValue::stream(producer::from_iter(0..n), None))
//! });
//!
//! assert_eq!(registry.get_method_id("count"), Some(2));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;

use super::{AsyncManager, Exchange, RequestContext, ReturnValue, ReturnValueHandlers};
use crate::codec::MsgPackCodec;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Result type for handler functions.
pub type HandlerResult = Result<ReturnValue>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a request with raw payload bytes.
    fn call(&self, data: &[u8], ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes payload before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, data: &[u8], ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match MsgPackCodec::decode(data) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        Box::pin((self.handler)(parsed, ctx))
    }
}

struct MethodEntry {
    handler: Box<dyn Handler>,
    id: u16,
}

/// Registry mapping method names to handlers.
pub struct HandlerRegistry {
    methods: HashMap<String, MethodEntry>,
    id_to_name: HashMap<u16, String>,
    next_method_id: u16,
    return_value_handlers: ReturnValueHandlers,
    async_manager: AsyncManager,
    config: BridgeConfig,
}

impl HandlerRegistry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Create an empty registry with `config`.
    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            methods: HashMap::new(),
            id_to_name: HashMap::new(),
            next_method_id: 1, // Start from 1, 0 is reserved
            return_value_handlers: ReturnValueHandlers::default(),
            async_manager: AsyncManager::new(),
            config,
        }
    }

    /// Register a method handler.
    ///
    /// Re-registering a name replaces its handler under a fresh ID.
    pub fn register<F, T, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let id = self.next_method_id;
        self.next_method_id += 1;

        let previous = self.methods.insert(
            name.to_string(),
            MethodEntry {
                handler: Box::new(TypedHandler::new(handler)),
                id,
            },
        );
        if let Some(previous) = previous {
            tracing::warn!("Method {} registered twice, replacing", name);
            self.id_to_name.remove(&previous.id);
        }
        self.id_to_name.insert(id, name.to_string());
    }

    /// Replace the return value handler chain.
    pub fn set_return_value_handlers(&mut self, handlers: ReturnValueHandlers) {
        self.return_value_handlers = handlers;
    }

    /// Get a handler by method name.
    pub fn get_handler(&self, name: &str) -> Option<&dyn Handler> {
        self.methods.get(name).map(|e| e.handler.as_ref())
    }

    /// Get a handler by method ID.
    pub fn get_handler_by_id(&self, id: u16) -> Option<&dyn Handler> {
        self.id_to_name
            .get(&id)
            .and_then(|name| self.methods.get(name))
            .map(|e| e.handler.as_ref())
    }

    /// Get method name by ID.
    pub fn get_method_name(&self, id: u16) -> Option<&str> {
        self.id_to_name.get(&id).map(|s| s.as_str())
    }

    /// Get method ID by name.
    pub fn get_method_id(&self, name: &str) -> Option<u16> {
        self.methods.get(name).map(|e| e.id)
    }

    /// Async manager tracking this registry's exchanges.
    pub fn async_manager(&self) -> &AsyncManager {
        &self.async_manager
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Dispatch a request to the appropriate handler.
    ///
    /// # Arguments
    ///
    /// * `method_id` - Method ID the request was sent to
    /// * `payload` - MsgPack-encoded handler input
    /// * `ctx` - Request context for responding
    ///
    /// A failing handler is answered with an `Error` frame and its error is
    /// returned.
    pub async fn dispatch(
        &self,
        method_id: u16,
        payload: &[u8],
        ctx: RequestContext,
    ) -> Result<()> {
        let handler = self
            .get_handler_by_id(method_id)
            .ok_or(BridgeError::HandlerNotFound(method_id))?;

        let value = match handler.call(payload, ctx.clone()).await {
            Ok(value) => value,
            Err(e) => {
                ctx.error(&e.to_string()).await?;
                return Err(e);
            }
        };

        let exchange = Exchange::new(&ctx, &self.async_manager, &self.config);
        self.return_value_handlers.handle(value, &exchange)
    }

    /// Abort an in-flight request (client disconnect).
    pub fn abort(&self, request_id: u32) -> bool {
        self.async_manager.abort(request_id)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_method() {
        let mut registry = HandlerRegistry::new();

        registry.register("echo", |data: String, _ctx| async move {
            ReturnValue::value(&data)
        });

        assert!(registry.get_handler("echo").is_some());
        assert_eq!(registry.get_method_id("echo"), Some(1));
        assert_eq!(registry.get_method_name(1), Some("echo"));
    }

    #[test]
    fn test_id_assignment_sequential() {
        let mut registry = HandlerRegistry::new();

        registry.register("method1", |_: (), _ctx| async { Ok(ReturnValue::None) });
        registry.register("method2", |_: (), _ctx| async { Ok(ReturnValue::None) });
        registry.register("method3", |_: (), _ctx| async { Ok(ReturnValue::None) });

        assert_eq!(registry.get_method_id("method1"), Some(1));
        assert_eq!(registry.get_method_id("method2"), Some(2));
        assert_eq!(registry.get_method_id("method3"), Some(3));
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = HandlerRegistry::new();

        registry.register("echo", |_: (), _ctx| async { Ok(ReturnValue::None) });
        registry.register("echo", |_: (), _ctx| async { Ok(ReturnValue::None) });

        assert_eq!(registry.get_method_id("echo"), Some(2));
        assert!(registry.get_handler_by_id(1).is_none());
        assert!(registry.get_handler_by_id(2).is_some());
    }

    #[test]
    fn test_handler_not_found() {
        let registry = HandlerRegistry::new();

        assert!(registry.get_handler("nonexistent").is_none());
        assert!(registry.get_handler_by_id(99).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let registry = HandlerRegistry::new();
        let result = registry
            .dispatch(42, &[], RequestContext::new(42, 1))
            .await;

        assert!(matches!(result, Err(BridgeError::HandlerNotFound(42))));
    }

    #[tokio::test]
    async fn test_dispatch_bad_payload() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", |data: String, _ctx| async move {
            ReturnValue::value(&data)
        });

        let result = registry
            .dispatch(1, b"\xc1", RequestContext::new(1, 1))
            .await;
        assert!(matches!(result, Err(BridgeError::MsgPackDecode(_))));
    }

    #[tokio::test]
    async fn test_dispatch_tracks_async_work() {
        let mut registry = HandlerRegistry::new();
        registry.register("pending", |_: (), _ctx| async {
            let (_publisher, producer) = crate::producer::publisher::<u32>();
            Ok(ReturnValue::producer(producer))
        });

        let payload = MsgPackCodec::encode(&()).unwrap();
        registry
            .dispatch(1, &payload, RequestContext::new(1, 5))
            .await
            .unwrap();

        assert_eq!(registry.async_manager().in_flight(), 1);
        assert!(registry.abort(5));
        assert!(!registry.abort(5));
    }
}
