use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::Handler;
use super::HandlerRegistry;
use crate::metrics;
use crate::Channel;
use crate::DispatchConfig;
use crate::Envelope;
use crate::Error;
use crate::SystemError;
use crate::TypeTag;

/// Routes inbound envelopes to every matching handler.
///
/// `dispatch` never waits: each matched handler is spawned on its own task,
/// so a slow or failing handler neither delays the next inbound envelope nor
/// affects other in-flight handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        config: &DispatchConfig,
    ) -> Self {
        let limiter = (config.max_in_flight_handlers > 0)
            .then(|| Arc::new(Semaphore::new(config.max_in_flight_handlers)));
        Self { registry, limiter }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Spawns one task per matching handler and returns their handles.
    /// An envelope nothing matches is dropped.
    pub fn dispatch(
        &self,
        channel: Arc<Channel>,
        envelope: Envelope,
    ) -> Vec<JoinHandle<()>> {
        let matched = self.registry.matching(envelope.type_url());
        if matched.is_empty() {
            metrics::UNMATCHED_ENVELOPES.inc();
            debug!(
                type_url = envelope.type_url(),
                correlation_id = envelope.correlation_id_or_empty(),
                "No handler matched, dropping envelope"
            );
            return Vec::new();
        }

        let correlation_id = envelope.correlation_id.unwrap_or_default();
        matched
            .into_iter()
            .map(|(tag, handler)| {
                metrics::HANDLER_INVOCATIONS.with_label_values(&[tag.as_str()]).inc();
                let limiter = self.limiter.clone();
                let channel = channel.clone();
                let correlation_id = correlation_id.clone();
                let payload = envelope.payload.clone();
                tokio::spawn(async move {
                    // permit held for the whole invocation
                    let _permit = match limiter {
                        Some(semaphore) => match semaphore.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(e) => {
                                error!(%tag, "Dispatch limiter closed: {:?}", e);
                                return;
                            }
                        },
                        None => None,
                    };
                    run_handler(tag, handler, channel, correlation_id, payload).await;
                })
            })
            .collect()
    }
}

async fn run_handler(
    tag: TypeTag,
    handler: Arc<dyn Handler>,
    channel: Arc<Channel>,
    correlation_id: String,
    payload: prost_types::Any,
) {
    let outcome = AssertUnwindSafe(handler.handle(channel.clone(), correlation_id.clone(), payload))
        .catch_unwind()
        .await;

    let error = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(_) => Error::from(SystemError::Handler(format!("handler for {tag} panicked"))),
    };
    metrics::HANDLER_FAILURES.with_label_values(&[tag.as_str()]).inc();
    error!(%tag, %correlation_id, "Handler failed: {:?}", error);

    if correlation_id.is_empty() {
        return;
    }
    if let Some(response) = handler.failure_response(&error) {
        if let Err(e) = channel.send(Envelope::from_any(&correlation_id, response)).await {
            warn!(%tag, %correlation_id, "Failed to send failure response: {:?}", e);
        }
    }
}
