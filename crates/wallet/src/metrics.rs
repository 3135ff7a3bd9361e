use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub const LEDGER_OPS: &str = "wallet_ledger_operations_total";
pub const VALIDATION_REJECTIONS: &str = "wallet_validation_rejections_total";
pub const STORE_ERRORS: &str = "wallet_store_errors_total";
pub const REALTIME_REFRESHES: &str = "wallet_realtime_refreshes_total";
pub const REALTIME_RECONNECTS: &str = "wallet_realtime_reconnects_total";

pub fn describe() {
    describe_counter!(
        LEDGER_OPS,
        "Ledger operations completed, labelled by op (deposit, withdraw, invest)."
    );
    describe_counter!(
        VALIDATION_REJECTIONS,
        "Operations rejected by client-side validation."
    );
    describe_counter!(STORE_ERRORS, "Store calls that failed, labelled by kind.");
    describe_counter!(
        REALTIME_REFRESHES,
        "Change notifications that invalidated the cached ledger view."
    );
    describe_counter!(
        REALTIME_RECONNECTS,
        "Realtime websocket reconnect attempts."
    );
    describe_counter!(
        "wallet_backend_requests_total",
        "Backend HTTP requests, labelled by endpoint and status."
    );
    describe_histogram!(
        "wallet_backend_latency_ms",
        "Backend HTTP request latency in milliseconds."
    );
    describe_counter!(
        common::observability::ERROR_EVENTS_METRIC,
        "ERROR-level tracing events, labelled by target."
    );
}

/// Install the global recorder and serve `/metrics` on `port`.
///
/// Must be called inside the Tokio runtime; the listener is spawned onto it.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
