//! Cluster-resident agent core for PodDeck.
//!
//! The agent keeps one persistent, multiplexed gRPC tunnel to the core
//! ([`Channel`]), routes every inbound [`Envelope`] to the handlers
//! registered for its type ([`HandlerRegistry`], [`Dispatcher`]) and streams
//! cluster events back as unsolicited reports ([`EventWatcher`]).
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! tokio::spawn(graceful_shutdown(shutdown_tx));
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register_service::<PodListRequest, _>(pods);
//!
//! AgentBuilder::load(None, shutdown_rx)?
//!     .registry(registry)
//!     .event_source(events)
//!     .build()
//!     .run()
//!     .await?;
//! ```
mod agent;
mod config;
mod dispatch;
mod envelope;
mod errors;
mod network;
mod watch;
pub mod metrics;
pub mod proto;
pub mod utils;

pub use agent::*;
pub use config::*;
pub use dispatch::*;
pub use envelope::*;
pub use errors::*;
pub use network::*;
pub use utils::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
