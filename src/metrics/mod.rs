//! Process-wide Prometheus metrics for the tunnel, dispatcher and watch loop.
//!
//! All collectors are registered in the default registry; hosts expose them
//! with [`render`].

use lazy_static::lazy_static;
use prometheus::register_int_counter;
use prometheus::register_int_counter_vec;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::TextEncoder;

lazy_static! {
    pub static ref INBOUND_ENVELOPES: IntCounter = register_int_counter!(
        "agent_inbound_envelopes_total",
        "Envelopes received from the core"
    )
    .expect("metric can not be created");

    pub static ref OUTBOUND_ENVELOPES: IntCounter = register_int_counter!(
        "agent_outbound_envelopes_total",
        "Envelopes written to the tunnel, handshake included"
    )
    .expect("metric can not be created");

    pub static ref SEND_FAILURES: IntCounter = register_int_counter!(
        "agent_send_failures_total",
        "send() calls rejected because the tunnel was not connected"
    )
    .expect("metric can not be created");

    pub static ref UNMATCHED_ENVELOPES: IntCounter = register_int_counter!(
        "agent_unmatched_envelopes_total",
        "Inbound envelopes dropped because no handler matched"
    )
    .expect("metric can not be created");

    pub static ref HANDLER_INVOCATIONS: IntCounterVec = register_int_counter_vec!(
        "agent_handler_invocations_total",
        "Handler tasks spawned, by type tag",
        &["type_tag"]
    )
    .expect("metric can not be created");

    pub static ref HANDLER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "agent_handler_failures_total",
        "Handler tasks that returned an error or panicked, by type tag",
        &["type_tag"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EVENTS_SENT: IntCounter = register_int_counter!(
        "agent_watch_events_sent_total",
        "Cluster events forwarded to the core"
    )
    .expect("metric can not be created");

    pub static ref WATCH_RESYNCS: IntCounter = register_int_counter!(
        "agent_watch_resyncs_total",
        "Resumption tokens discarded after the cluster reported lost history"
    )
    .expect("metric can not be created");

    pub static ref WATCH_ERRORS: IntCounter = register_int_counter!(
        "agent_watch_errors_total",
        "Failed snapshots and subscriptions"
    )
    .expect("metric can not be created");
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {:?}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
