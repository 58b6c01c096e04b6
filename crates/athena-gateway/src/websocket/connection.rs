//! Per-device connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use athena_core::{ConnectionId, DeviceId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::GatewayError;

/// Why a connection left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The device closed the channel or the socket errored.
    Closed,
    /// A newer connection for the same device replaced it.
    Superseded,
    /// An outbound write failed or timed out.
    WriteFailed,
    /// No heartbeat within the grace window.
    LivenessExpired,
    /// The gateway is shutting down.
    Shutdown,
}

impl DisconnectReason {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Superseded => "superseded",
            Self::WriteFailed => "write_failed",
            Self::LivenessExpired => "liveness_expired",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Inventory row for one live connection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Device identity.
    pub device_id: DeviceId,
    /// When the channel was admitted.
    pub connected_at: DateTime<Utc>,
    /// Last `heartbeat` frame (initially the connect time).
    pub last_heartbeat_at: DateTime<Utc>,
}

struct Heartbeat {
    at: DateTime<Utc>,
    instant: Instant,
}

/// A device's live channel.
///
/// Outbound messages go through a bounded queue drained by the session's
/// writer task. Closing cancels [`DeviceConnection::close_token`], which stops
/// the writer and unblocks the reader.
pub struct DeviceConnection {
    device_id: DeviceId,
    id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    write_timeout: Duration,
    connected_at: DateTime<Utc>,
    last_heartbeat: Mutex<Heartbeat>,
    close: CancellationToken,
    dropped_messages: AtomicU64,
}

impl DeviceConnection {
    /// Create a connection around the sending half of its outbound queue.
    pub fn new(device_id: DeviceId, tx: mpsc::Sender<Arc<String>>, write_timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            device_id,
            id: ConnectionId::new(),
            tx,
            write_timeout,
            connected_at: now,
            last_heartbeat: Mutex::new(Heartbeat {
                at: now,
                instant: Instant::now(),
            }),
            close: CancellationToken::new(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Device identity.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Identity of this particular channel.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// When the channel was admitted.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Wall-clock time of the last heartbeat.
    pub fn last_heartbeat_at(&self) -> DateTime<Utc> {
        self.last_heartbeat.lock().at
    }

    /// Time since the last heartbeat (monotonic).
    pub fn heartbeat_elapsed(&self) -> Duration {
        self.last_heartbeat.lock().instant.elapsed()
    }

    /// Record a heartbeat now.
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.lock() = Heartbeat {
            at: Utc::now(),
            instant: Instant::now(),
        };
    }

    /// Snapshot for the connection inventory.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            device_id: self.device_id.clone(),
            connected_at: self.connected_at,
            last_heartbeat_at: self.last_heartbeat_at(),
        }
    }

    /// Queue a text frame for the device.
    ///
    /// Fails if the connection is closed, the writer is gone, or the queue
    /// stays full for longer than the write timeout. The caller decides
    /// whether to drop the connection.
    pub async fn send(&self, message: Arc<String>) -> Result<(), GatewayError> {
        if self.close.is_cancelled() {
            return Err(self.dropped("connection closed"));
        }
        tokio::select! {
            biased;
            () = self.close.cancelled() => Err(self.dropped("connection closed")),
            result = self.tx.send_timeout(message, self.write_timeout) => match result {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(self.dropped("write timed out")),
                Err(SendTimeoutError::Closed(_)) => Err(self.dropped("channel closed")),
            },
        }
    }

    fn dropped(&self, reason: &str) -> GatewayError {
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        GatewayError::transport(&self.device_id, reason)
    }

    /// Total messages that could not be queued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Close the channel. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token cancelled when the connection closes.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("device_id", &self.device_id)
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
