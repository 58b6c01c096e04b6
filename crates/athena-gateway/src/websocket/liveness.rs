//! Evicts device connections that stopped sending `heartbeat`.
//!
//! A half-open TCP connection can sit in the registry indefinitely, so the
//! supervisor sweeps on a fixed interval and releases every connection whose
//! last heartbeat is older than the grace window. Release is id-checked, so a
//! device that reconnected between the scan and the eviction keeps its new
//! channel. The sweep also purges expired telemetry, and keeps doing so when
//! eviction is disabled.

use std::sync::Arc;

use athena_core::DeviceId;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::DisconnectReason;
use super::registry::ConnectionRegistry;
use crate::config::LivenessConfig;
use crate::telemetry::TelemetryStore;

/// Periodic heartbeat-age sweep.
pub struct LivenessSupervisor {
    registry: Arc<ConnectionRegistry>,
    telemetry: Arc<TelemetryStore>,
    config: LivenessConfig,
}

impl LivenessSupervisor {
    /// Create a supervisor over the shared registry and telemetry cache.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        telemetry: Arc<TelemetryStore>,
        config: LivenessConfig,
    ) -> Self {
        Self {
            registry,
            telemetry,
            config,
        }
    }

    /// Run one sweep, returning the evicted devices.
    ///
    /// Evicts nothing when liveness is disabled; expired telemetry is purged
    /// either way.
    pub fn sweep(&self) -> Vec<DeviceId> {
        let evicted = if self.config.enabled {
            self.evict_silent()
        } else {
            Vec::new()
        };

        let purged = self.telemetry.purge_expired();
        if purged > 0 {
            debug!(purged, "purged expired telemetry");
        }
        evicted
    }

    fn evict_silent(&self) -> Vec<DeviceId> {
        let mut evicted = Vec::new();
        for conn in self.registry.connections() {
            let silent_for = conn.heartbeat_elapsed();
            if silent_for <= self.config.grace {
                continue;
            }
            if self.registry.release(&conn, DisconnectReason::LivenessExpired) {
                warn!(
                    device_id = %conn.device_id(),
                    connection_id = %conn.id(),
                    silent_secs = silent_for.as_secs(),
                    "evicting silent device"
                );
                evicted.push(conn.device_id().clone());
            }
        }
        evicted
    }

    /// Sweep every `check_interval` until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        if self.config.enabled {
            info!(
                interval_secs = self.config.check_interval.as_secs(),
                grace_secs = self.config.grace.as_secs(),
                "liveness supervisor started"
            );
        } else {
            info!(
                interval_secs = self.config.check_interval.as_secs(),
                "liveness eviction disabled, purging telemetry only"
            );
        }

        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.sweep();
                }
            }
        }
        debug!("liveness supervisor stopped");
    }
}
