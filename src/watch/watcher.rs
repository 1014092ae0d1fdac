//! ```text
//!            snapshot ok
//! NoCursor ---------------> Watching <---------------------+
//!    ^                        |   |                        |
//!    |       Gone (410)       |   | ended normally          |
//!    +---- LostHistory <------+   +-----> Cooldown --------+
//!                             |           (1s, 2s, .. 30s)
//!                             | other error
//!                             +-----> Watching (same cursor)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ClusterEvent;
use super::EventSource;
use crate::metrics;
use crate::proto::EventReport;
use crate::Channel;
use crate::Envelope;
use crate::Error;
use crate::Result;
use crate::WatchConfig;

/// Slack on top of the subscription timeout before the loop gives up on a
/// subscription the cluster failed to close.
pub(crate) const SUBSCRIPTION_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    NoCursor,
    Watching,
    Cooldown,
    LostHistory,
}

impl fmt::Display for WatchState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            WatchState::NoCursor => "no_cursor",
            WatchState::Watching => "watching",
            WatchState::Cooldown => "cooldown",
            WatchState::LostHistory => "lost_history",
        };
        f.write_str(name)
    }
}

/// Last forwarded position in the cluster's change stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchCursor {
    pub resource_version: Option<String>,
}

impl WatchCursor {
    pub fn is_none(&self) -> bool {
        self.resource_version.is_none()
    }
}

pub struct EventWatcher {
    source: Arc<dyn EventSource>,
    channel: Arc<Channel>,
    config: WatchConfig,
    state: WatchState,
    cursor: WatchCursor,
    cooldown: Duration,
}

impl fmt::Debug for EventWatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EventWatcher")
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

impl EventWatcher {
    pub fn new(
        source: Arc<dyn EventSource>,
        channel: Arc<Channel>,
        config: WatchConfig,
    ) -> Self {
        let cooldown = config.cooldown.base_delay();
        Self {
            source,
            channel,
            config,
            state: WatchState::NoCursor,
            cursor: WatchCursor::default(),
            cooldown,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn cursor(&self) -> &WatchCursor {
        &self.cursor
    }

    /// Delay the next `Cooldown` will sleep.
    pub fn next_cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Runs until `cancel` fires. Never touches the channel's lifecycle.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
    ) {
        info!("Event watch loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(state = %self.state, "Event watch loop cancelled");
                    return;
                }
                _ = self.step() => {}
            }
        }
    }

    /// Executes the current state once and returns the next one.
    ///
    /// `LostHistory` is transient: the cursor is dropped within the same
    /// step, so a step that hits an expired resource version returns
    /// `NoCursor`.
    pub async fn step(&mut self) -> WatchState {
        let next = match self.state {
            WatchState::NoCursor => self.fetch_snapshot().await,
            WatchState::Watching => self.watch_once().await,
            WatchState::Cooldown => {
                debug!(delay = ?self.cooldown, "watch cooldown");
                tokio::time::sleep(self.cooldown).await;
                self.cooldown = self.config.cooldown.next_delay(self.cooldown);
                WatchState::Watching
            }
            WatchState::LostHistory => self.resync(),
        };
        self.state = match next {
            WatchState::LostHistory => self.resync(),
            next => next,
        };
        self.state
    }

    fn resync(&mut self) -> WatchState {
        metrics::WATCH_RESYNCS.inc();
        self.cursor = WatchCursor::default();
        self.cooldown = self.config.cooldown.base_delay();
        WatchState::NoCursor
    }

    async fn fetch_snapshot(&mut self) -> WatchState {
        match self.source.snapshot().await {
            Ok(resource_version) => {
                info!(%resource_version, "Event baseline fetched");
                self.cursor.resource_version = Some(resource_version);
                WatchState::Watching
            }
            Err(e) => {
                self.recover("snapshot", e).await;
                WatchState::NoCursor
            }
        }
    }

    async fn watch_once(&mut self) -> WatchState {
        let Some(resource_version) = self.cursor.resource_version.clone() else {
            return WatchState::NoCursor;
        };
        let timeout = self.config.timeout();
        debug!(%resource_version, "open event subscription");

        let mut events = match self.source.watch(resource_version, timeout).await {
            Ok(events) => events,
            Err(e) => return self.subscription_failed(e).await,
        };

        // unrepresentable deadline: rely on the cluster to end the subscription
        let deadline = Instant::now().checked_add(timeout.saturating_add(SUBSCRIPTION_GRACE));
        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, events.next()).await,
                None => Ok(events.next().await),
            };
            match next {
                Ok(Some(Ok(event))) => {
                    if let Err(e) = self.forward(&event).await {
                        return self.subscription_failed(e).await;
                    }
                }
                Ok(Some(Err(e))) => return self.subscription_failed(e).await,
                Ok(None) => {
                    debug!("event subscription ended");
                    return WatchState::Cooldown;
                }
                Err(_) => {
                    debug!("event subscription outlived its timeout, closing it");
                    return WatchState::Cooldown;
                }
            }
        }
    }

    /// Sends one event, then advances the cursor to the event's own
    /// resource version.
    async fn forward(
        &mut self,
        event: &ClusterEvent,
    ) -> Result<()> {
        let envelope = Envelope::unsolicited(&EventReport::from(event))?;
        self.channel.send(envelope).await?;
        metrics::WATCH_EVENTS_SENT.inc();

        if let Some(resource_version) = &event.resource_version {
            debug!(%resource_version, "event forwarded");
            self.cursor.resource_version = Some(resource_version.clone());
        }
        Ok(())
    }

    async fn subscription_failed(
        &mut self,
        error: Error,
    ) -> WatchState {
        if error.is_gone() {
            warn!(
                resource_version = self.cursor.resource_version.as_deref().unwrap_or(""),
                "Event history no longer available, resyncing"
            );
            return WatchState::LostHistory;
        }
        self.recover("subscription", error).await;
        WatchState::Watching
    }

    async fn recover(
        &mut self,
        stage: &str,
        error: Error,
    ) {
        metrics::WATCH_ERRORS.inc();
        warn!(
            resource_version = self.cursor.resource_version.as_deref().unwrap_or(""),
            "Event {} failed: {:?}", stage, error
        );
        self.cooldown = self.config.cooldown.base_delay();
        tokio::time::sleep(self.config.error_retry_delay()).await;
    }
}
