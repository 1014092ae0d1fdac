use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TlsConfig {
    /// Enables TLS on the tunnel
    /// Default: false (plaintext, like a sidecar-terminated setup)
    #[serde(default)]
    pub enable_tls: bool,

    /// Path to the Certificate Authority root certificate in PEM format
    #[serde(default = "default_ca_path")]
    pub certificate_authority_root_path: String,

    /// Domain name the core's certificate is validated against.
    /// Falls back to `communication.hostname` when empty.
    #[serde(default)]
    pub domain_name: String,
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enable_tls {
            return Ok(());
        }

        if !Path::new(&self.certificate_authority_root_path).exists() {
            return Err(Error::InvalidConfig(format!(
                "CA certificate not found at {}",
                self.certificate_authority_root_path
            )));
        }

        Ok(())
    }
}

fn default_ca_path() -> String {
    "/etc/ssl/certs/ca.pem".to_string()
}
