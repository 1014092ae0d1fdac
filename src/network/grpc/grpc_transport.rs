use std::time::Duration;

use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::codec::CompressionEncoding;
use tonic::transport::Certificate;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Endpoint;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::proto::tunnel_service_client::TunnelServiceClient;
use crate::proto::TunnelMessage;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::AgentConfig;
use crate::BackoffPolicy;
use crate::Error;
use crate::InboundStream;
use crate::NetworkConfig;
use crate::NetworkError;
use crate::Result;
use crate::TlsConfig;
use crate::Transport;

#[derive(Debug, Clone)]
pub struct GrpcTransport {
    hostname: String,
    port: u16,
    network: NetworkConfig,
    tls: TlsConfig,
    retry: BackoffPolicy,
}

impl GrpcTransport {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            hostname: config.communication.hostname.clone(),
            port: config.communication.port,
            network: config.network.clone(),
            tls: config.tls.clone(),
            retry: config.retry.connect,
        }
    }

    pub(crate) fn uri(&self) -> String {
        let scheme = if self.tls.enable_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.hostname, self.port)
    }

    /// Attempts to connect to the core with retries and exponential backoff.
    async fn connect_with_retry(&self) -> Result<Channel> {
        task_with_timeout_and_exponential_backoff(|| self.connect(), self.retry).await
    }

    async fn connect(&self) -> Result<Channel> {
        let addr = self.uri();
        let mut endpoint = Endpoint::from_shared(addr.clone())
            .map_err(|e| NetworkError::InvalidURI(format!("{addr}: {e}")))?
            .connect_timeout(Duration::from_millis(self.network.connect_timeout_in_ms))
            .tcp_keepalive(Some(Duration::from_secs(self.network.tcp_keepalive_in_secs)))
            .http2_keep_alive_interval(Duration::from_secs(
                self.network.http2_keep_alive_interval_in_secs,
            ))
            .keep_alive_timeout(Duration::from_secs(
                self.network.http2_keep_alive_timeout_in_secs,
            ))
            .keep_alive_while_idle(true);

        if self.tls.enable_tls {
            endpoint = endpoint
                .tls_config(self.client_tls_config()?)
                .map_err(|e| NetworkError::TlsSetup(e.to_string()))?;
        }

        debug!("connecting to core at {}", &addr);
        endpoint.connect().await.map_err(|err| {
            error!("connect to {} failed: {}", &addr, err);
            Error::from(NetworkError::ConnectError)
        })
    }

    fn client_tls_config(&self) -> Result<ClientTlsConfig> {
        let pem = std::fs::read(&self.tls.certificate_authority_root_path).map_err(|e| {
            NetworkError::TlsSetup(format!(
                "read {}: {}",
                self.tls.certificate_authority_root_path, e
            ))
        })?;
        let domain = if self.tls.domain_name.is_empty() {
            self.hostname.clone()
        } else {
            self.tls.domain_name.clone()
        };
        Ok(ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(pem))
            .domain_name(domain))
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn open(
        &self,
        outbound: ReceiverStream<TunnelMessage>,
    ) -> Result<InboundStream> {
        let channel = self.connect_with_retry().await?;
        info!("connected to core at {}", self.uri());

        let mut client = TunnelServiceClient::new(channel);
        if self.network.compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }

        let response = client.connect(outbound).await?;
        Ok(response.into_inner().boxed())
    }
}
