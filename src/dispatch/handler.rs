use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use prost::Name;
use prost_types::Any;
use tonic::async_trait;

use crate::unpack;
use crate::Channel;
use crate::Error;
use crate::Result;

/// A command handler bound to one or more type tags.
///
/// Every invocation runs on its own task. The handler replies through
/// `channel`, using `correlation_id` (empty for unsolicited payloads).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(
        &self,
        channel: Arc<Channel>,
        correlation_id: String,
        payload: Any,
    ) -> Result<()>;

    /// Payload sent back, best effort, when `handle` fails for an envelope
    /// that carried a correlation id. `None` lets the request time out on
    /// the core side.
    fn failure_response(
        &self,
        _error: &Error,
    ) -> Option<Any> {
        None
    }
}

/// Typed request processor; see [`ServiceHandler`].
#[async_trait]
pub trait Service<M>: Send + Sync + 'static
where
    M: Send + 'static,
{
    async fn process(
        &self,
        channel: &Channel,
        request_id: &str,
        message: M,
    ) -> Result<()>;

    fn failure_response(
        &self,
        _error: &Error,
    ) -> Option<Any> {
        None
    }
}

/// Adapts a [`Service`] to a [`Handler`] by decoding the payload body as `M`
/// first. A decode failure is reported like any other handler fault.
pub struct ServiceHandler<M, S> {
    service: S,
    _message: PhantomData<fn() -> M>,
}

impl<M, S> ServiceHandler<M, S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<M, S> Handler for ServiceHandler<M, S>
where
    M: Name + Default + Send + 'static,
    S: Service<M>,
{
    async fn handle(
        &self,
        channel: Arc<Channel>,
        correlation_id: String,
        payload: Any,
    ) -> Result<()> {
        let message = unpack::<M>(&payload)?;
        self.service.process(&channel, &correlation_id, message).await
    }

    fn failure_response(
        &self,
        error: &Error,
    ) -> Option<Any> {
        self.service.failure_response(error)
    }
}

/// Handler backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async closure as a [`Handler`].
///
/// ```ignore
/// registry.register("poddeck.Ping", handler_fn(|channel, id, payload| async move {
///     channel.send(Envelope::from_any(&id, payload)).await
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<Channel>, String, Any) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<Channel>, String, Any) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        channel: Arc<Channel>,
        correlation_id: String,
        payload: Any,
    ) -> Result<()> {
        (self.f)(channel, correlation_id, payload).await
    }
}
