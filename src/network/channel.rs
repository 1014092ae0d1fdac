//! The persistent, multiplexed tunnel to the core.
//!
//! ```text
//! Disconnected --connect()--> Connecting --open ok--> Connected
//!                                  |                     |
//!                                  +--open failed--> Disconnected
//!                                                        |
//!                  remote close / transport fault / shutdown()
//!                                                        v
//!                                                   Terminated (absorbing)
//! ```
//!
//! Outbound envelopes from every producer go through one bounded queue that
//! feeds the transport's request stream, so each `send()` lands on the wire
//! as one whole message and all producers observe a single total order.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use prost::Name;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::InboundStream;
use super::Transport;
use crate::metrics;
use crate::proto::HandshakeRequest;
use crate::proto::TunnelMessage;
use crate::AgentConfig;
use crate::Dispatcher;
use crate::Envelope;
use crate::NetworkError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Channel {
    credential: String,
    outbound_buffer: usize,
    state_tx: watch::Sender<ChannelState>,
    outbound: RwLock<Option<mpsc::Sender<TunnelMessage>>>,
    session_id: RwLock<Option<String>>,
}

impl fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Channel")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish()
    }
}

impl Channel {
    pub fn new(
        credential: impl Into<String>,
        outbound_buffer: usize,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Arc::new(Self {
            credential: credential.into(),
            outbound_buffer: outbound_buffer.max(1),
            state_tx,
            outbound: RwLock::new(None),
            session_id: RwLock::new(None),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Arc<Self> {
        Self::new(config.communication.credential.clone(), config.network.outbound_buffer)
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Session id announced in the last handshake.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Establishes the tunnel, queues the handshake as the very first
    /// outbound message and starts the inbound read loop, which hands every
    /// envelope to `dispatcher`.
    ///
    /// The handshake is fire-and-forget: the core is trusted to close the
    /// tunnel if it rejects the credential.
    ///
    /// # Errors
    /// - [`NetworkError::AlreadyConnected`] unless the channel is `Disconnected`
    /// - the handshake or transport error when the tunnel cannot be opened;
    ///   the channel is back to `Disconnected` in that case
    /// - [`NetworkError::NotConnected`] when `shutdown()` terminated the
    ///   channel while it was connecting
    pub async fn connect(
        self: &Arc<Self>,
        transport: &dyn Transport,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<JoinHandle<()>> {
        let mut previous = ChannelState::Disconnected;
        let started = self.state_tx.send_if_modified(|state| {
            previous = *state;
            if *state == ChannelState::Disconnected {
                *state = ChannelState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(NetworkError::AlreadyConnected(previous.as_str()).into());
        }

        let (session_id, tx, rx) = match self.queue_handshake() {
            Ok(queued) => queued,
            Err(e) => {
                error!("Failed to queue handshake: {:?}", e);
                self.transition(ChannelState::Disconnected);
                return Err(e);
            }
        };

        let inbound = match transport.open(ReceiverStream::new(rx)).await {
            Ok(inbound) => inbound,
            Err(e) => {
                error!("Failed to open tunnel to core: {:?}", e);
                self.transition(ChannelState::Disconnected);
                return Err(e);
            }
        };

        *self.outbound.write() = Some(tx);
        *self.session_id.write() = Some(session_id.clone());
        if !self.transition(ChannelState::Connected) {
            // shutdown() raced the handshake
            self.outbound.write().take();
            return Err(NetworkError::NotConnected(ChannelState::Terminated.as_str()).into());
        }
        metrics::OUTBOUND_ENVELOPES.inc();
        info!(%session_id, "Tunnel established, handshake sent");

        let channel = self.clone();
        Ok(tokio::spawn(async move {
            channel.read_loop(inbound, dispatcher).await;
        }))
    }

    /// Fresh outbound queue with the handshake already in it.
    fn queue_handshake(
        &self
    ) -> Result<(String, mpsc::Sender<TunnelMessage>, mpsc::Receiver<TunnelMessage>)> {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let session_id = nanoid::nanoid!();
        let handshake = Envelope::unsolicited(&HandshakeRequest {
            session_id: session_id.clone(),
            credential: self.credential.clone(),
        })?;
        // capacity >= 1 and the queue is empty
        tx.try_send(handshake.into())
            .map_err(|_| NetworkError::OutboundClosed)?;
        Ok((session_id, tx, rx))
    }

    async fn read_loop(
        self: Arc<Self>,
        mut inbound: InboundStream,
        dispatcher: Arc<Dispatcher>,
    ) {
        loop {
            match inbound.next().await {
                Some(Ok(message)) => {
                    metrics::INBOUND_ENVELOPES.inc();
                    match Envelope::try_from(message) {
                        Ok(envelope) => {
                            dispatcher.dispatch(self.clone(), envelope);
                        }
                        Err(e) => warn!("Dropping malformed inbound message: {:?}", e),
                    }
                }
                Some(Err(status)) => {
                    warn!("Connection lost: {}", status);
                    break;
                }
                None => {
                    warn!("Connection lost: core closed the tunnel");
                    break;
                }
            }
        }
        self.terminate();
    }

    /// Writes one envelope to the tunnel.
    ///
    /// Safe to call from any number of tasks; each call enqueues exactly one
    /// whole message.
    ///
    /// # Errors
    /// [`NetworkError::NotConnected`] unless the channel is `Connected`,
    /// [`NetworkError::OutboundClosed`] if the transport dropped the queue.
    pub async fn send(
        &self,
        envelope: Envelope,
    ) -> Result<()> {
        let state = self.state();
        if state != ChannelState::Connected {
            metrics::SEND_FAILURES.inc();
            return Err(NetworkError::NotConnected(state.as_str()).into());
        }
        let sender = self.outbound.read().clone();
        let Some(sender) = sender else {
            metrics::SEND_FAILURES.inc();
            return Err(NetworkError::NotConnected(self.state().as_str()).into());
        };

        debug!(
            type_url = envelope.type_url(),
            correlation_id = envelope.correlation_id_or_empty(),
            "send envelope"
        );
        if sender.send(envelope.into()).await.is_err() {
            metrics::SEND_FAILURES.inc();
            return Err(NetworkError::OutboundClosed.into());
        }
        metrics::OUTBOUND_ENVELOPES.inc();
        Ok(())
    }

    /// Packs `message` and sends it as the reply to `correlation_id`
    /// (unsolicited when empty).
    pub async fn send_message<M: Name>(
        &self,
        correlation_id: &str,
        message: &M,
    ) -> Result<()> {
        self.send(Envelope::reply(correlation_id, message)?).await
    }

    /// Blocks until the channel reaches `Terminated`.
    pub async fn await_termination(&self) {
        let mut rx = self.state_tx.subscribe();
        // the sender lives as long as `self`
        let _ = rx.wait_for(|state| *state == ChannelState::Terminated).await;
    }

    /// Closes the outbound stream and moves the channel to `Terminated`.
    ///
    /// # Errors
    /// [`NetworkError::NeverConnected`] when called before any `connect()`.
    pub fn shutdown(&self) -> Result<()> {
        if self.state() == ChannelState::Disconnected {
            return Err(NetworkError::NeverConnected.into());
        }
        info!("Shutting down tunnel");
        self.terminate();
        Ok(())
    }

    fn terminate(&self) {
        self.outbound.write().take();
        if self.transition(ChannelState::Terminated) {
            warn!("Tunnel terminated");
        }
    }

    /// Applies a transition. `Terminated` is absorbing: returns false and
    /// leaves the state untouched when already terminated.
    fn transition(
        &self,
        to: ChannelState,
    ) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == ChannelState::Terminated || *state == to {
                return false;
            }
            debug!("channel {} -> {}", state, to);
            *state = to;
            true
        })
    }
}
