//! Configuration management for the agent.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`AGENT__` prefix, `__` separator)
//! - Component-wise validation
mod communication;
mod dispatch;
mod network;
mod retry;
mod tls;
mod watch;
pub use communication::*;
pub use dispatch::*;
pub use network::*;
pub use retry::*;
pub use tls::*;
pub use watch::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "AGENT";

/// Main configuration container for the agent
///
/// Merged in the following order (later sources override earlier):
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct AgentConfig {
    /// Where the core lives and how the agent authenticates
    #[serde(default)]
    pub communication: CommunicationConfig,
    /// Tunnel connection parameters
    #[serde(default)]
    pub network: NetworkConfig,
    /// Retry policies for connection establishment
    #[serde(default)]
    pub retry: RetryPolicies,
    /// TLS configuration for the tunnel
    #[serde(default)]
    pub tls: TlsConfig,
    /// Cluster event watch loop tuning
    #[serde(default)]
    pub watch: WatchConfig,
    /// Handler dispatch limits
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Debug for AgentConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // credential is deliberately left out
        f.debug_struct("AgentConfig")
            .field("core", &self.communication.endpoint())
            .field("tls", &self.tls.enable_tls)
            .field("watch", &self.watch)
            .finish()
    }
}

impl AgentConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/agent.toml");
    /// std::env::set_var("AGENT__COMMUNICATION__PORT", "7001");
    /// let cfg = AgentConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies an additional configuration file on top of the current values.
    /// Environment variables still take precedence. Not validated.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.communication.validate()?;
        self.network.validate()?;
        self.retry.validate()?;
        self.tls.validate()?;
        self.watch.validate()?;
        self.dispatch.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
