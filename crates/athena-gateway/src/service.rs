//! Gateway operations shared by the HTTP routes and the device sessions.

use std::sync::Arc;

use athena_core::DeviceId;
use athena_rpc::MethodRegistry;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ChannelConfig, ServerConfig};
use crate::errors::GatewayError;
use crate::metrics::GATEWAY_BROADCAST_FAILURES_TOTAL;
use crate::telemetry::{TelemetrySnapshot, TelemetryStore};
use crate::websocket::{ConnectionInfo, ConnectionRegistry, DeviceConnection, DisconnectReason};

/// Outcome of a broadcast.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BroadcastReport {
    /// Devices that accepted the message.
    pub delivered: usize,
    /// Devices whose channel failed; they have been disconnected.
    pub failed: Vec<DeviceId>,
}

/// Owns the connection registry, the telemetry cache, and the method table.
pub struct GatewayService {
    registry: Arc<ConnectionRegistry>,
    telemetry: Arc<TelemetryStore>,
    methods: Arc<MethodRegistry>,
    channel: ChannelConfig,
}

impl GatewayService {
    /// Build the service from runtime config and a populated method table.
    pub fn new(config: &ServerConfig, methods: MethodRegistry) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            telemetry: Arc::new(TelemetryStore::new(config.telemetry_ttl)),
            methods: Arc::new(methods),
            channel: config.channel,
        }
    }

    /// Shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shared telemetry cache.
    pub fn telemetry(&self) -> &Arc<TelemetryStore> {
        &self.telemetry
    }

    /// Method table used for device calls.
    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Outbound channel settings.
    pub fn channel(&self) -> ChannelConfig {
        self.channel
    }

    /// Register a new channel for the device, superseding any existing one.
    pub fn admit(
        &self,
        device_id: DeviceId,
        tx: mpsc::Sender<Arc<String>>,
    ) -> Arc<DeviceConnection> {
        self.registry
            .admit(DeviceConnection::new(device_id, tx, self.channel.write_timeout))
    }

    /// Send a JSON message to one device.
    ///
    /// The message is forwarded verbatim. A failed write drops the connection.
    pub async fn send_to_device(&self, device_id: &str, message: &Value) -> Result<(), GatewayError> {
        let Some(conn) = self.registry.lookup(device_id) else {
            debug!(device_id, "send to unknown device");
            return Err(GatewayError::NotConnected {
                device_id: DeviceId::from(device_id),
            });
        };

        match conn.send(Arc::new(message.to_string())).await {
            Ok(()) => {
                debug!(device_id, "message queued for device");
                Ok(())
            }
            Err(err) => {
                warn!(device_id, error = %err, "send failed, dropping connection");
                let _ = self.registry.release(&conn, DisconnectReason::WriteFailed);
                Err(err)
            }
        }
    }

    /// Send a JSON message to every connected device.
    ///
    /// Writes run concurrently; one slow or broken channel does not block the
    /// others. Failed devices are disconnected and listed in the report.
    pub async fn broadcast(&self, message: &Value) -> BroadcastReport {
        let targets = self.registry.connections();
        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let payload = Arc::new(message.to_string());
        let sends = targets.iter().map(|conn| {
            let payload = payload.clone();
            async move { conn.send(payload).await }
        });
        let results = futures::future::join_all(sends).await;

        let mut report = BroadcastReport::default();
        for (conn, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(device_id = %conn.device_id(), error = %err, "broadcast write failed");
                    counter!(GATEWAY_BROADCAST_FAILURES_TOTAL).increment(1);
                    let _ = self.registry.release(conn, DisconnectReason::WriteFailed);
                    report.failed.push(conn.device_id().clone());
                }
            }
        }
        report.failed.sort();
        info!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "broadcast complete"
        );
        report
    }

    /// Inventory of live connections, ordered by device id.
    pub fn list_connections(&self) -> Vec<ConnectionInfo> {
        self.registry.snapshot()
    }

    /// Whether the device has a live connection.
    pub fn is_connected(&self, device_id: &str) -> bool {
        self.registry.contains(device_id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Latest unexpired telemetry for the device.
    pub fn latest_telemetry(&self, device_id: &str) -> Option<TelemetrySnapshot> {
        self.telemetry.latest(device_id)
    }
}
