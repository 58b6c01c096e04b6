//! `/health` and `/` response bodies.

use std::time::Instant;

use athena_rpc::types::wire_timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Service name reported on `/`.
pub const SERVICE_NAME: &str = "Athena Device Gateway";

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"healthy"` while the server is answering.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live device connections.
    pub active_connections: usize,
    /// Time of the check.
    pub timestamp: String,
}

/// Service banner returned by `/`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Human-readable service name.
    pub name: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Live device connections.
    pub active_connections: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    active_connections: usize,
    now: DateTime<Utc>,
) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        uptime_secs: start_time.elapsed().as_secs(),
        active_connections,
        timestamp: wire_timestamp(now),
    }
}

/// Build the `/` banner.
pub fn service_info(active_connections: usize) -> ServiceInfo {
    ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        active_connections,
    }
}
