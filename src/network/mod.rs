//! Network layer: the tunnel to the core.
//!
//! [`Channel`] owns the connection lifecycle and the serialized outbound
//! path. The physical connection is produced by a [`Transport`]; production
//! uses [`grpc::GrpcTransport`], tests plug in in-memory tunnels.
pub mod grpc;

mod channel;
pub use channel::*;


use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;

use crate::proto::TunnelMessage;
use crate::Result;

/// Inbound half of an open tunnel.
pub type InboundStream = BoxStream<'static, std::result::Result<TunnelMessage, tonic::Status>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establishes the tunnel to the core.
    ///
    /// Every message queued on `outbound` is written to the core in queue
    /// order, one whole message at a time. The returned stream yields
    /// inbound messages until the core closes the tunnel (`None`) or the
    /// connection breaks (`Some(Err(_))`).
    ///
    /// # Errors
    /// Returns an error once the implementation's own retry policy is
    /// exhausted.
    async fn open(
        &self,
        outbound: ReceiverStream<TunnelMessage>,
    ) -> Result<InboundStream>;
}
