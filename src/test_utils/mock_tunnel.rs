use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::Status;

use crate::network::InboundStream;
use crate::network::Transport;
use crate::proto::HandshakeRequest;
use crate::proto::TunnelMessage;
use crate::Channel;
use crate::DispatchConfig;
use crate::Dispatcher;
use crate::Envelope;
use crate::HandlerRegistry;
use crate::Result;

pub(crate) const TEST_CREDENTIAL: &str = "secret";

/// In-memory [`Transport`]; the paired [`MockCore`] plays the remote end.
pub struct MockTunnel {
    inbound: Mutex<Option<mpsc::Receiver<std::result::Result<TunnelMessage, Status>>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<TunnelMessage>>>,
}

/// Remote end of a [`MockTunnel`].
pub struct MockCore {
    to_agent: Option<mpsc::Sender<std::result::Result<TunnelMessage, Status>>>,
    from_agent: mpsc::UnboundedReceiver<TunnelMessage>,
}

impl MockTunnel {
    pub fn pair() -> (MockTunnel, MockCore) {
        let (to_agent, inbound) = mpsc::channel(64);
        let (outbound, from_agent) = mpsc::unbounded_channel();
        (
            MockTunnel {
                inbound: Mutex::new(Some(inbound)),
                outbound: Mutex::new(Some(outbound)),
            },
            MockCore {
                to_agent: Some(to_agent),
                from_agent,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTunnel {
    async fn open(
        &self,
        mut outbound: ReceiverStream<TunnelMessage>,
    ) -> Result<InboundStream> {
        let inbound = self
            .inbound
            .lock()
            .take()
            .expect("MockTunnel can only be opened once");
        let sink = self
            .outbound
            .lock()
            .take()
            .expect("MockTunnel can only be opened once");
        tokio::spawn(async move {
            while let Some(message) = outbound.next().await {
                if sink.send(message).is_err() {
                    break;
                }
            }
        });
        Ok(ReceiverStream::new(inbound).boxed())
    }
}

impl MockCore {
    /// Pushes an envelope to the agent.
    pub async fn push(
        &self,
        envelope: Envelope,
    ) {
        self.sender().send(Ok(envelope.into())).await.expect("agent side is gone");
    }

    pub async fn push_raw(
        &self,
        message: TunnelMessage,
    ) {
        self.sender().send(Ok(message)).await.expect("agent side is gone");
    }

    /// Breaks the connection with a transport error.
    pub async fn fail(
        &self,
        status: Status,
    ) {
        self.sender().send(Err(status)).await.expect("agent side is gone");
    }

    /// Ends the inbound stream normally.
    pub fn close(&mut self) {
        self.to_agent.take();
    }

    /// Next raw message written by the agent, `None` after 5s or when the
    /// outbound stream is closed.
    pub async fn next_message(&mut self) -> Option<TunnelMessage> {
        tokio::time::timeout(Duration::from_secs(5), self.from_agent.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        self.next_message()
            .await
            .map(|m| Envelope::try_from(m).expect("agent sent an envelope without payload"))
    }

    /// Consumes the first outbound message, which must be the handshake.
    pub async fn expect_handshake(&mut self) -> HandshakeRequest {
        let envelope = self.next_envelope().await.expect("no handshake received");
        assert!(envelope.correlation_id.is_none());
        envelope.decode::<HandshakeRequest>().expect("first message is not a handshake")
    }

    /// Messages already written by the agent, without waiting.
    pub fn drain(&mut self) -> Vec<TunnelMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.from_agent.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn sender(&self) -> &mpsc::Sender<std::result::Result<TunnelMessage, Status>> {
        self.to_agent.as_ref().expect("MockCore already closed")
    }
}

/// Connects a fresh channel over a [`MockTunnel`] with `registry` attached,
/// and consumes the handshake.
pub(crate) async fn connected_channel(
    registry: Arc<HandlerRegistry>
) -> (Arc<Channel>, MockCore, JoinHandle<()>) {
    let (tunnel, mut core) = MockTunnel::pair();
    let channel = Channel::new(TEST_CREDENTIAL, 16);
    let dispatcher = Arc::new(Dispatcher::new(registry, &DispatchConfig::default()));
    let read_loop = channel.connect(&tunnel, dispatcher).await.expect("connect over mock tunnel");
    core.expect_handshake().await;
    (channel, core, read_loop)
}
