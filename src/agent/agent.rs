use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::async_task::spawn_task;
use crate::AgentConfig;
use crate::Channel;
use crate::Dispatcher;
use crate::Error;
use crate::EventSource;
use crate::EventWatcher;
use crate::HandlerRegistry;
use crate::Result;
use crate::Transport;

/// A wired agent instance, see [`AgentBuilder`](crate::AgentBuilder).
pub struct Agent {
    pub(super) config: AgentConfig,
    pub(super) channel: Arc<Channel>,
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) event_source: Option<Arc<dyn EventSource>>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl Agent {
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.dispatcher.registry()
    }

    /// Connects to the core and serves until the tunnel terminates or the
    /// shutdown signal fires.
    ///
    /// # Errors
    /// - the transport's error when the tunnel cannot be established
    /// - [`Error::Fatal`] when the tunnel terminates; the host process is
    ///   expected to exit non-zero and be restarted by its supervisor
    pub async fn run(mut self) -> Result<()> {
        // 1. Tunnel + handshake, inbound envelopes go to the dispatcher
        let read_loop = self
            .channel
            .connect(self.transport.as_ref(), self.dispatcher.clone())
            .await?;
        info!(
            core = %self.config.communication.endpoint(),
            handlers = self.dispatcher.registry().len(),
            "Agent connected"
        );

        // 2. Event watch loop, a pure producer on the tunnel
        let cancel = CancellationToken::new();
        let watcher = match &self.event_source {
            Some(source) if self.config.watch.enabled => {
                let watcher = EventWatcher::new(source.clone(), self.channel.clone(), self.config.watch.clone());
                let cancel = cancel.clone();
                Some(spawn_task("event-watcher", move || async move {
                    watcher.run(cancel).await;
                    Ok(())
                }))
            }
            _ => {
                info!("Event watch loop disabled");
                None
            }
        };

        // 3. Supervise
        let outcome = tokio::select! {
            _ = self.channel.await_termination() => {
                error!("Tunnel to core terminated, agent cannot continue");
                Err(Error::Fatal("tunnel to core terminated".to_string()))
            }
            _ = self.shutdown_signal.changed() => {
                info!("Shutdown signal received");
                self.channel.shutdown()
            }
        };

        cancel.cancel();
        if let Some(watcher) = watcher {
            if let Err(e) = watcher.await {
                warn!("Event watch loop ended abnormally: {:?}", e);
            }
        }
        read_loop.abort();
        outcome
    }
}
