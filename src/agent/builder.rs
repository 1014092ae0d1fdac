//! Fluent construction of an [`Agent`].
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register_service::<PodListRequest, _>(PodService::new(client));
//!
//! let agent = AgentBuilder::load(Some("config/agent.toml"), shutdown_rx)?
//!     .registry(registry)
//!     .event_source(Arc::new(KubeEvents::new(client)))
//!     .build();
//! agent.run().await?;
//! ```
//!
//! Components left unset fall back to production defaults: an empty
//! registry and a [`GrpcTransport`] built from the configuration. Without an
//! event source no watch loop is started.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::Agent;
use crate::grpc::GrpcTransport;
use crate::AgentConfig;
use crate::Channel;
use crate::Dispatcher;
use crate::EventSource;
use crate::HandlerRegistry;
use crate::Result;
use crate::Transport;

pub struct AgentBuilder {
    config: AgentConfig,
    shutdown_signal: watch::Receiver<()>,
    registry: Option<Arc<HandlerRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    event_source: Option<Arc<dyn EventSource>>,
}

impl AgentBuilder {
    /// Uses `config` as is. Callers are expected to have validated it.
    pub fn new(
        config: AgentConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
            registry: None,
            transport: None,
            event_source: None,
        }
    }

    /// Loads and validates the hierarchical configuration, applying
    /// `config_path` on top of it when given.
    pub fn load(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = AgentConfig::new()?;
        if let Some(path) = config_path {
            info!("with_override_config from: {}", path);
            config = config.with_override_config(path)?;
        }
        Ok(Self::new(config.validate()?, shutdown_signal))
    }

    /// Registry holding the command handlers; may be shared with modules
    /// that register later.
    pub fn registry(
        mut self,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn event_source(
        mut self,
        event_source: Arc<dyn EventSource>,
    ) -> Self {
        self.event_source = Some(event_source);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn build(self) -> Agent {
        let registry = self.registry.unwrap_or_default();
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(GrpcTransport::new(&self.config)) as Arc<dyn Transport>);
        let channel = Channel::from_config(&self.config);
        let dispatcher = Arc::new(Dispatcher::new(registry, &self.config.dispatch));

        Agent {
            config: self.config,
            channel,
            dispatcher,
            transport,
            event_source: self.event_source,
            shutdown_signal: self.shutdown_signal,
        }
    }
}
