//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric names shared by the gateway modules.

/// Live device connections (gauge).
pub const DEVICE_CONNECTIONS_ACTIVE: &str = "device_connections_active";
/// Device connections admitted (counter).
pub const DEVICE_CONNECTIONS_TOTAL: &str = "device_connections_total";
/// Device connections ended (counter, labels: reason).
pub const DEVICE_DISCONNECTIONS_TOTAL: &str = "device_disconnections_total";
/// Connection lifetime (histogram).
pub const DEVICE_CONNECTION_DURATION_SECONDS: &str = "device_connection_duration_seconds";
/// Inbound frames by classification (counter, labels: kind).
pub const DEVICE_FRAMES_TOTAL: &str = "device_frames_total";
/// Inbound frames that failed to decode (counter).
pub const DEVICE_DECODE_ERRORS_TOTAL: &str = "device_decode_errors_total";
/// Broadcast deliveries that failed (counter).
pub const GATEWAY_BROADCAST_FAILURES_TOTAL: &str = "gateway_broadcast_failures_total";
/// Telemetry snapshots stored (counter).
pub const TELEMETRY_WRITES_TOTAL: &str = "telemetry_writes_total";
/// RPC requests dispatched (counter, labels: method). Recorded by `athena-rpc`.
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// RPC errors (counter, labels: method, `error_type`). Recorded by `athena-rpc`.
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC handler latency (histogram, labels: method). Recorded by `athena-rpc`.
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(DEVICE_CONNECTIONS_TOTAL).increment(2);
        });
        let output = handle.render();
        assert!(output.contains("device_connections_total 2"));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            DEVICE_CONNECTIONS_ACTIVE,
            DEVICE_CONNECTIONS_TOTAL,
            DEVICE_DISCONNECTIONS_TOTAL,
            DEVICE_CONNECTION_DURATION_SECONDS,
            DEVICE_FRAMES_TOTAL,
            DEVICE_DECODE_ERRORS_TOTAL,
            GATEWAY_BROADCAST_FAILURES_TOTAL,
            TELEMETRY_WRITES_TOTAL,
            RPC_REQUESTS_TOTAL,
            RPC_ERRORS_TOTAL,
            RPC_REQUEST_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name not snake_case: {name}"
            );
        }
    }
}
