//! Cluster event watch loop.
//!
//! [`EventWatcher`] turns the cluster's change stream, exposed through the
//! [`EventSource`] seam, into unsolicited `EventReport` envelopes on the
//! tunnel, resuming from the last forwarded resource version across
//! subscription timeouts and transient failures.
mod event_source;
mod watcher;
pub use event_source::*;
pub use watcher::*;

#[cfg(test)]
mod watcher_test;
