//! Handler return values and the handlers that turn them into responses.
//!
//! A method handler returns a [`ReturnValue`]. The registry passes it to a
//! [`ReturnValueHandlers`] chain, which picks the first
//! [`ReturnValueHandler`] that supports its [`ReturnKind`]:
//!
//! | Kind       | Handler                       | Response                           |
//! |------------|-------------------------------|------------------------------------|
//! | `None`     | [`ValueReturnValueHandler`]   | `NoContent`                        |
//! | `Value`    | [`ValueReturnValueHandler`]   | `Response`                         |
//! | `Producer` | [`ProducerReturnValueHandler`]| `Response` with the first value    |
//! | `Stream`   | [`StreamReturnValueHandler`]  | `Chunk`* then `StreamEnd`          |
//! | `Sse`      | [`StreamReturnValueHandler`]  | SSE `Chunk`* then `StreamEnd`      |

use serde::Serialize;
use serde_json::Value;

use super::{AsyncManager, RequestContext};
use crate::bridge::{SingleResultBridge, StreamingBridge};
use crate::codec::ContentType;
use crate::config::BridgeConfig;
use crate::deferred::{DeferredCompletion, DeferredResult};
use crate::emitter::{ResponseEmitter, SseEmitter};
use crate::error::{BridgeError, Result};
use crate::producer::{BoxProducer, StreamProducer, TryMap};

/// What a method handler produced.
pub enum ReturnValue {
    /// Handled, no body.
    None,
    /// A ready value.
    Value(Value),
    /// A producer whose first value is the result. `None` means handled, no body.
    Producer(Option<BoxProducer<Value>>),
    /// A producer streamed value by value.
    Stream {
        /// Values to stream. `None` means handled, no body.
        producer: Option<BoxProducer<Value>>,
        /// Content type passed with every value.
        content_type: Option<ContentType>,
    },
    /// A producer streamed as Server-Sent Events.
    Sse(Option<BoxProducer<Value>>),
}

/// Classification of a [`ReturnValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// [`ReturnValue::None`].
    None,
    /// [`ReturnValue::Value`].
    Value,
    /// [`ReturnValue::Producer`].
    Producer,
    /// [`ReturnValue::Stream`].
    Stream,
    /// [`ReturnValue::Sse`].
    Sse,
}

impl ReturnKind {
    /// Name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Value => "value",
            Self::Producer => "producer",
            Self::Stream => "stream",
            Self::Sse => "sse",
        }
    }
}

impl ReturnValue {
    /// A ready value.
    pub fn value<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    /// A producer whose first value becomes the response.
    pub fn producer<P, T>(producer: P) -> Self
    where
        P: StreamProducer<T> + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Producer(Some(to_values(producer)))
    }

    /// A producer streamed value by value.
    pub fn stream<P, T>(producer: P, content_type: Option<ContentType>) -> Self
    where
        P: StreamProducer<T> + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Stream {
            producer: Some(to_values(producer)),
            content_type,
        }
    }

    /// A producer streamed as Server-Sent Events.
    pub fn sse<P, T>(producer: P) -> Self
    where
        P: StreamProducer<T> + 'static,
        T: Serialize + Send + 'static,
    {
        Self::Sse(Some(to_values(producer)))
    }

    /// Classify this value.
    pub fn kind(&self) -> ReturnKind {
        match self {
            Self::None => ReturnKind::None,
            Self::Value(_) => ReturnKind::Value,
            Self::Producer(_) => ReturnKind::Producer,
            Self::Stream { .. } => ReturnKind::Stream,
            Self::Sse(_) => ReturnKind::Sse,
        }
    }
}

impl std::fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

fn to_values<P, T>(producer: P) -> BoxProducer<Value>
where
    P: StreamProducer<T> + 'static,
    T: Serialize + Send + 'static,
{
    let mapped: TryMap<T, Value> =
        TryMap::new(Box::new(producer), |value: T| Ok(serde_json::to_value(value)?));
    Box::new(mapped)
}

/// Everything a return value handler may need to answer one exchange.
pub struct Exchange<'a> {
    ctx: &'a RequestContext,
    manager: &'a AsyncManager,
    config: &'a BridgeConfig,
}

impl<'a> Exchange<'a> {
    /// Bundle the parts of an exchange.
    pub fn new(
        ctx: &'a RequestContext,
        manager: &'a AsyncManager,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            ctx,
            manager,
            config,
        }
    }

    /// Context of the exchange.
    pub fn context(&self) -> &RequestContext {
        self.ctx
    }

    /// Async manager tracking the exchange.
    pub fn async_manager(&self) -> &AsyncManager {
        self.manager
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        self.config
    }

    fn deferred_result<T: Send + 'static>(&self) -> DeferredResult<T> {
        match self.config.async_timeout {
            Some(timeout) => DeferredResult::with_timeout(timeout),
            None => DeferredResult::new(),
        }
    }

    fn mark_handled(&self) -> Result<()> {
        self.ctx.try_no_content()
    }
}

/// Turns one kind of return value into a response.
pub trait ReturnValueHandler: Send + Sync {
    /// Whether this handler answers values of `kind`.
    fn supports(&self, kind: ReturnKind) -> bool;

    /// Answer the exchange. Never blocks; async work is handed to the
    /// exchange's [`AsyncManager`].
    fn handle(&self, value: ReturnValue, exchange: &Exchange<'_>) -> Result<()>;
}

/// Answers `None` and ready values.
pub struct ValueReturnValueHandler;

impl ReturnValueHandler for ValueReturnValueHandler {
    fn supports(&self, kind: ReturnKind) -> bool {
        matches!(kind, ReturnKind::None | ReturnKind::Value)
    }

    fn handle(&self, value: ReturnValue, exchange: &Exchange<'_>) -> Result<()> {
        let value = match value {
            ReturnValue::Value(value) => value,
            ReturnValue::None => return exchange.mark_handled(),
            other => return Err(BridgeError::UnsupportedReturnValue(other.kind().as_str())),
        };

        let result = DeferredResult::new();
        result.resolve(value);
        exchange.async_manager().start_deferred_result_processing(
            result,
            exchange.context().clone(),
            exchange.config().default_content_type,
        )?;
        Ok(())
    }
}

/// Answers producers with their first value, through a [`SingleResultBridge`].
pub struct ProducerReturnValueHandler;

impl ReturnValueHandler for ProducerReturnValueHandler {
    fn supports(&self, kind: ReturnKind) -> bool {
        kind == ReturnKind::Producer
    }

    fn handle(&self, value: ReturnValue, exchange: &Exchange<'_>) -> Result<()> {
        let producer = match value {
            ReturnValue::Producer(Some(producer)) => producer,
            ReturnValue::Producer(None) => return exchange.mark_handled(),
            other => return Err(BridgeError::UnsupportedReturnValue(other.kind().as_str())),
        };

        let result = exchange.deferred_result();
        // Tracked before subscribing; a failed start leaves no subscription behind.
        exchange.async_manager().start_deferred_result_processing(
            result.clone(),
            exchange.context().clone(),
            exchange.config().default_content_type,
        )?;
        SingleResultBridge::new(producer, result);
        Ok(())
    }
}

/// Answers streams and SSE streams through a [`StreamingBridge`].
pub struct StreamReturnValueHandler;

impl ReturnValueHandler for StreamReturnValueHandler {
    fn supports(&self, kind: ReturnKind) -> bool {
        matches!(kind, ReturnKind::Stream | ReturnKind::Sse)
    }

    fn handle(&self, value: ReturnValue, exchange: &Exchange<'_>) -> Result<()> {
        let config = exchange.config();
        let ctx = exchange.context().clone();

        match value {
            ReturnValue::Stream {
                producer: Some(producer),
                content_type,
            } => {
                let mut emitter =
                    ResponseEmitter::new(ctx).with_content_type(config.default_content_type);
                if let Some(timeout) = config.emitter_timeout {
                    emitter = emitter.with_timeout(timeout);
                }
                exchange
                    .async_manager()
                    .start_emitter_processing(emitter.clone())?;
                StreamingBridge::new(producer, emitter, content_type);
                Ok(())
            }
            ReturnValue::Sse(Some(producer)) => {
                let mut emitter = SseEmitter::new(ctx);
                if let Some(timeout) = config.emitter_timeout {
                    emitter = emitter.with_timeout(timeout);
                }
                exchange
                    .async_manager()
                    .start_emitter_processing(emitter.emitter().clone())?;
                StreamingBridge::new(producer, emitter, None);
                Ok(())
            }
            ReturnValue::Stream { producer: None, .. } | ReturnValue::Sse(None) => {
                exchange.mark_handled()
            }
            other => Err(BridgeError::UnsupportedReturnValue(other.kind().as_str())),
        }
    }
}

/// Ordered chain of return value handlers.
pub struct ReturnValueHandlers {
    handlers: Vec<Box<dyn ReturnValueHandler>>,
}

impl ReturnValueHandlers {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler. Earlier handlers take precedence.
    pub fn add(&mut self, handler: impl ReturnValueHandler + 'static) -> &mut Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Whether any handler supports `kind`.
    pub fn supports(&self, kind: ReturnKind) -> bool {
        self.handlers.iter().any(|h| h.supports(kind))
    }

    /// Answer the exchange with the first handler supporting the value.
    pub fn handle(&self, value: ReturnValue, exchange: &Exchange<'_>) -> Result<()> {
        let kind = value.kind();
        let handler = self
            .handlers
            .iter()
            .find(|h| h.supports(kind))
            .ok_or(BridgeError::UnsupportedReturnValue(kind.as_str()))?;
        handler.handle(value, exchange)
    }
}

impl Default for ReturnValueHandlers {
    /// Value, producer and stream handlers, in that order.
    fn default() -> Self {
        let mut handlers = Self::new();
        handlers
            .add(ValueReturnValueHandler)
            .add(ProducerReturnValueHandler)
            .add(StreamReturnValueHandler);
        handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ReturnValue::None.kind(), ReturnKind::None);
        assert_eq!(ReturnValue::value(&1).unwrap().kind(), ReturnKind::Value);
        assert_eq!(
            ReturnValue::producer(producer::just(1)).kind(),
            ReturnKind::Producer
        );
        assert_eq!(ReturnValue::Producer(None).kind(), ReturnKind::Producer);
        assert_eq!(
            ReturnValue::stream(producer::just("a"), None).kind(),
            ReturnKind::Stream
        );
        assert_eq!(ReturnValue::Sse(None).kind(), ReturnKind::Sse);
    }

    #[test]
    fn test_supports_is_classification_only() {
        let handler = ProducerReturnValueHandler;
        assert!(handler.supports(ReturnKind::Producer));
        assert!(!handler.supports(ReturnKind::Value));
        assert!(!handler.supports(ReturnKind::Stream));

        let chain = ReturnValueHandlers::default();
        for kind in [
            ReturnKind::None,
            ReturnKind::Value,
            ReturnKind::Producer,
            ReturnKind::Stream,
            ReturnKind::Sse,
        ] {
            assert!(chain.supports(kind));
        }
    }

    #[test]
    fn test_empty_chain_rejects() {
        let chain = ReturnValueHandlers::new();
        let ctx = RequestContext::new(1, 1);
        let manager = AsyncManager::new();
        let config = BridgeConfig::default();

        let result = chain.handle(ReturnValue::None, &Exchange::new(&ctx, &manager, &config));
        assert!(matches!(
            result,
            Err(BridgeError::UnsupportedReturnValue("none"))
        ));
    }

    #[test]
    fn test_null_producer_marks_handled_without_async_work() {
        let ctx = RequestContext::new(1, 1);
        let manager = AsyncManager::new();
        let config = BridgeConfig::default();

        ProducerReturnValueHandler
            .handle(
                ReturnValue::Producer(None),
                &Exchange::new(&ctx, &manager, &config),
            )
            .unwrap();
        assert_eq!(manager.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_producer_registered_with_manager() {
        let ctx = RequestContext::new(1, 7);
        let manager = AsyncManager::new();
        let config = BridgeConfig::default();
        let (publisher, producer) = producer::publisher::<u32>();

        ProducerReturnValueHandler
            .handle(
                ReturnValue::producer(producer),
                &Exchange::new(&ctx, &manager, &config),
            )
            .unwrap();
        assert_eq!(manager.in_flight(), 1);
        assert!(publisher.is_subscribed());

        assert!(manager.abort(7));
        assert!(publisher.is_cancelled());
    }

    #[test]
    fn test_producer_without_runtime_is_not_subscribed() {
        let ctx = RequestContext::new(1, 8);
        let manager = AsyncManager::new();
        let config = BridgeConfig::default();
        let (publisher, producer) = producer::publisher::<u32>();

        let result = ProducerReturnValueHandler.handle(
            ReturnValue::producer(producer),
            &Exchange::new(&ctx, &manager, &config),
        );

        assert!(matches!(result, Err(BridgeError::NoRuntime(_))));
        assert!(!publisher.is_subscribed());
        assert_eq!(manager.in_flight(), 0);
    }

    #[test]
    fn test_try_map_failure_becomes_error() {
        struct Unserializable;
        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not today"))
            }
        }

        let ReturnValue::Producer(Some(producer)) =
            ReturnValue::producer(producer::just(Unserializable))
        else {
            panic!("expected a producer");
        };

        let (tx, rx) = std::sync::mpsc::channel();
        let _sub = producer.subscribe(std::sync::Arc::new(crate::observer::observer(
            |_: Value| panic!("value from failing map"),
            move |e| tx.send(e.to_string()).unwrap(),
            || {},
        )));
        assert_eq!(rx.recv().unwrap(), "JSON error: not today");
    }
}
