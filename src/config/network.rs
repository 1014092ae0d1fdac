use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Low-level parameters of the tunnel connection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    /// TCP keepalive in seconds
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP2 keepalive ping interval in seconds
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// HTTP2 keepalive timeout in seconds
    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    /// Capacity of the outbound envelope queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Gzip compression on the tunnel
    #[serde(default = "default_compression")]
    pub compression: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_in_ms: default_connect_timeout(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            outbound_buffer: default_outbound_buffer(),
            compression: default_compression(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig("network.connect_timeout_in_ms must be > 0".into()));
        }

        if self.http2_keep_alive_timeout_in_secs >= self.http2_keep_alive_interval_in_secs {
            return Err(Error::InvalidConfig(format!(
                "keepalive timeout {}s must be < interval {}s",
                self.http2_keep_alive_timeout_in_secs, self.http2_keep_alive_interval_in_secs
            )));
        }

        if self.outbound_buffer == 0 {
            return Err(Error::InvalidConfig("network.outbound_buffer must be > 0".into()));
        }

        Ok(())
    }
}

fn default_connect_timeout() -> u64 {
    5_000
}
fn default_tcp_keepalive() -> u64 {
    300
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    10
}
fn default_outbound_buffer() -> usize {
    1024
}
fn default_compression() -> bool {
    false
}
