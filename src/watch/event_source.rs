use std::time::Duration;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::proto;
use crate::Result;

/// One change record from the cluster's event stream.
///
/// Every field the cluster may omit is optional; the wire encoding fills the
/// gaps with `""`, `0` and `-1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterEvent {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub involved_object_kind: Option<String>,
    pub involved_object_name: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub event_type: Option<String>,
    pub count: Option<i32>,
    /// Epoch milliseconds
    pub first_timestamp: Option<i64>,
    /// Epoch milliseconds
    pub last_timestamp: Option<i64>,
    /// Resumption token of this record
    pub resource_version: Option<String>,
}

impl From<&ClusterEvent> for proto::Event {
    fn from(event: &ClusterEvent) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        proto::Event {
            name: text(&event.name),
            namespace: text(&event.namespace),
            involved_object_kind: text(&event.involved_object_kind),
            involved_object_name: text(&event.involved_object_name),
            reason: text(&event.reason),
            message: text(&event.message),
            r#type: text(&event.event_type),
            count: event.count.unwrap_or(0),
            first_timestamp: event.first_timestamp.unwrap_or(-1),
            last_timestamp: event.last_timestamp.unwrap_or(-1),
        }
    }
}

impl From<&ClusterEvent> for proto::EventReport {
    fn from(event: &ClusterEvent) -> Self {
        proto::EventReport {
            event: Some(event.into()),
        }
    }
}

/// Change records of one subscription. Ends when the cluster closes the
/// subscription; an item error ends it as well.
pub type EventStream = BoxStream<'static, Result<ClusterEvent>>;

/// Read side of the cluster-management API used by the watch loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Lists current events and returns the list's resource version.
    ///
    /// # Errors
    /// [`WatchError::MissingResourceVersion`](crate::WatchError) when the
    /// list carries none, [`WatchError::Api`](crate::WatchError) otherwise.
    async fn snapshot(&self) -> Result<String>;

    /// Opens a subscription resuming after `resource_version`. The cluster
    /// ends it normally after `timeout`.
    ///
    /// # Errors
    /// [`WatchError::Gone`](crate::WatchError) when the resource version is
    /// no longer served. The same error may also arrive as a stream item.
    async fn watch(
        &self,
        resource_version: String,
        timeout: Duration,
    ) -> Result<EventStream>;
}
