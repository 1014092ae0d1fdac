use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Location of the core and the shared credential presented in the handshake.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommunicationConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret sent with every handshake
    #[serde(default = "default_credential")]
    pub credential: String,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            credential: default_credential(),
        }
    }
}

impl CommunicationConfig {
    /// `host:port` of the core, without scheme.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::InvalidConfig("communication.hostname cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(Error::InvalidConfig("communication.port cannot be 0".into()));
        }

        if self.credential.is_empty() {
            return Err(Error::InvalidConfig("communication.credential cannot be empty".into()));
        }

        Ok(())
    }
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9090
}
fn default_credential() -> String {
    "secret".to_string()
}
