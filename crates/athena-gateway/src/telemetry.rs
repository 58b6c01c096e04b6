//! Short-TTL cache of the latest telemetry snapshot per device.
//!
//! Each telemetry frame overwrites the device's entry and restarts its TTL.
//! Expired entries are dropped lazily on read and eagerly by
//! [`TelemetryStore::purge_expired`], which the liveness supervisor calls on
//! every sweep. Absence is a normal state, not an error.

use std::collections::HashMap;
use std::time::Duration;

use athena_core::DeviceId;
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics::TELEMETRY_WRITES_TOTAL;

/// The most recent telemetry a device reported.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Reporting device.
    pub device_id: DeviceId,
    /// Opaque payload, stored verbatim.
    pub payload: Value,
    /// When the gateway received it.
    pub recorded_at: DateTime<Utc>,
}

struct Entry {
    snapshot: TelemetrySnapshot,
    /// `None` when the TTL runs past what the clock can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    /// Visible through `expires_at` inclusive.
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Per-device telemetry cache with a fixed TTL.
pub struct TelemetryStore {
    ttl: Duration,
    entries: Mutex<HashMap<DeviceId, Entry>>,
}

impl TelemetryStore {
    /// Create an empty store.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `payload` as the device's latest snapshot, replacing any previous one.
    pub fn record(&self, device_id: &DeviceId, payload: Value) {
        let snapshot = TelemetrySnapshot {
            device_id: device_id.clone(),
            payload,
            recorded_at: Utc::now(),
        };
        let entry = Entry {
            snapshot,
            expires_at: Instant::now().checked_add(self.ttl),
        };
        let _ = self.entries.lock().insert(device_id.clone(), entry);
        counter!(TELEMETRY_WRITES_TOTAL).increment(1);
        debug!(%device_id, "telemetry stored");
    }

    /// Latest unexpired snapshot for the device.
    pub fn latest(&self, device_id: &str) -> Option<TelemetrySnapshot> {
        let mut entries = self.entries.lock();
        let expired = entries.get(device_id)?.is_expired(Instant::now());
        if expired {
            let _ = entries.remove(device_id);
            return None;
        }
        entries.get(device_id).map(|e| e.snapshot.clone())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Number of entries held, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
