//! Agent Error Hierarchy
//!
//! Errors are grouped by the layer that raises them. Only
//! [`NetworkError`]s coming out of the tunnel are ever escalated to
//! process termination; everything else is logged and recovered locally.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (network, codec, watch, handlers)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Failure raised by a command handler while processing a request
    #[error("Handler failed: {0}")]
    Handler(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Send attempted while the tunnel is not connected
    #[error("Channel is not connected (state: {0})")]
    NotConnected(&'static str),

    /// `shutdown()` called on a channel that never connected
    #[error("Client never connected")]
    NeverConnected,

    /// `connect()` called twice on the same channel
    #[error("Channel already connected or terminated (state: {0})")]
    AlreadyConnected(&'static str),

    /// Outbound queue has been dropped by the transport
    #[error("Outbound stream closed")]
    OutboundClosed,

    /// Persistent connection failures
    #[error("Socket connect failed error")]
    ConnectError,

    /// Malformed core addresses
    #[error("Invalid URI format: {0}")]
    InvalidURI(String),

    /// Retry policy exhaustion
    #[error("Retry timeout after {0:?}")]
    RetryTimeoutError(Duration),

    /// TLS material could not be loaded
    #[error("TLS setup failed: {0}")]
    TlsSetup(String),

    /// gRPC transport layer errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),

    /// gRPC status code errors
    #[error(transparent)]
    TonicStatusError(#[from] Box<tonic::Status>),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Envelope arrived without a payload
    #[error("Envelope has no payload")]
    MissingPayload,

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("Failed to decode {type_url}: {source}")]
    Decode {
        type_url: String,
        #[source]
        source: prost::DecodeError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The resumption token is no longer served by the cluster (HTTP 410)
    #[error("Resource version {0:?} is gone")]
    Gone(Option<String>),

    /// The baseline snapshot carried no resumption token
    #[error("Snapshot carried no resource version")]
    MissingResourceVersion,

    /// Any other cluster API failure
    #[error("Cluster API error: {0}")]
    Api(String),
}

impl WatchError {
    pub fn is_gone(&self) -> bool {
        matches!(self, WatchError::Gone(_))
    }
}

impl Error {
    /// True when the cluster reported that the resumption token expired.
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::System(SystemError::Watch(e)) if e.is_gone())
    }
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::System(SystemError::Codec(e))
    }
}

impl From<WatchError> for Error {
    fn from(e: WatchError) -> Self {
        Error::System(SystemError::Watch(e))
    }
}

impl From<prost::EncodeError> for Error {
    fn from(e: prost::EncodeError) -> Self {
        CodecError::Encode(e).into()
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        NetworkError::TonicError(Box::new(err)).into()
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        NetworkError::TonicStatusError(Box::new(status)).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}
