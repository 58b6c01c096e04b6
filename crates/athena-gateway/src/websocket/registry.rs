//! Live `DeviceId -> DeviceConnection` bindings.
//!
//! All mutation goes through [`ConnectionRegistry::admit`],
//! [`ConnectionRegistry::remove`], and [`ConnectionRegistry::release`]. The
//! lock is never held across an `.await`; callers that write to many
//! connections take a [`ConnectionRegistry::connections`] snapshot first.

use std::collections::HashMap;
use std::sync::Arc;

use athena_core::DeviceId;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::connection::{ConnectionInfo, DeviceConnection, DisconnectReason};
use crate::metrics::{
    DEVICE_CONNECTIONS_ACTIVE, DEVICE_CONNECTIONS_TOTAL, DEVICE_DISCONNECTIONS_TOTAL,
};

/// At most one live connection per device.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<DeviceId, Arc<DeviceConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection, closing and evicting any existing one for the
    /// same device first.
    pub fn admit(&self, connection: DeviceConnection) -> Arc<DeviceConnection> {
        let connection = Arc::new(connection);
        let (superseded, total) = {
            let mut conns = self.connections.lock();
            let old = conns.insert(connection.device_id().clone(), connection.clone());
            (old, conns.len())
        };

        if let Some(old) = superseded {
            old.close();
            counter!(DEVICE_DISCONNECTIONS_TOTAL, "reason" => DisconnectReason::Superseded.as_str())
                .increment(1);
            info!(
                device_id = %old.device_id(),
                old_connection = %old.id(),
                new_connection = %connection.id(),
                "device reconnected, superseding previous connection"
            );
        }

        counter!(DEVICE_CONNECTIONS_TOTAL).increment(1);
        set_active_gauge(total);
        info!(
            device_id = %connection.device_id(),
            connection_id = %connection.id(),
            total,
            "device connected"
        );
        connection
    }

    /// Remove and close the device's connection. No-op if absent.
    pub fn remove(&self, device_id: &str, reason: DisconnectReason) -> Option<Arc<DeviceConnection>> {
        let (removed, total) = {
            let mut conns = self.connections.lock();
            let removed = conns.remove(device_id);
            (removed, conns.len())
        };
        let removed = removed?;
        finish_removal(&removed, reason, total);
        Some(removed)
    }

    /// Remove `connection` only if it is still the registered one for its
    /// device. Returns whether it was removed.
    ///
    /// The connection is closed either way.
    pub fn release(&self, connection: &DeviceConnection, reason: DisconnectReason) -> bool {
        let outcome = {
            let mut conns = self.connections.lock();
            let current = conns
                .get(connection.device_id().as_str())
                .is_some_and(|c| c.id() == connection.id());
            if current {
                let _ = conns.remove(connection.device_id().as_str());
            }
            current.then(|| conns.len())
        };
        connection.close();

        match outcome {
            Some(total) => {
                finish_removal(connection, reason, total);
                true
            }
            None => {
                debug!(
                    device_id = %connection.device_id(),
                    connection_id = %connection.id(),
                    "connection already replaced or removed"
                );
                false
            }
        }
    }

    /// Current connection for the device.
    pub fn lookup(&self, device_id: &str) -> Option<Arc<DeviceConnection>> {
        self.connections.lock().get(device_id).cloned()
    }

    /// Whether the device has a live connection.
    pub fn contains(&self, device_id: &str) -> bool {
        self.connections.lock().contains_key(device_id)
    }

    /// Point-in-time inventory, ordered by device id.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut rows: Vec<ConnectionInfo> = self
            .connections
            .lock()
            .values()
            .map(|c| c.info())
            .collect();
        rows.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        rows
    }

    /// Point-in-time list of live connections.
    pub fn connections(&self) -> Vec<Arc<DeviceConnection>> {
        self.connections.lock().values().cloned().collect()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no device is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

fn finish_removal(connection: &DeviceConnection, reason: DisconnectReason, total: usize) {
    connection.close();
    counter!(DEVICE_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    set_active_gauge(total);
    info!(
        device_id = %connection.device_id(),
        connection_id = %connection.id(),
        reason = reason.as_str(),
        total,
        "device disconnected"
    );
}

#[allow(clippy::cast_precision_loss)]
fn set_active_gauge(total: usize) {
    gauge!(DEVICE_CONNECTIONS_ACTIVE).set(total as f64);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn make_connection(device: &str) -> (DeviceConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        let conn = DeviceConnection::new(DeviceId::from(device), tx, Duration::from_secs(1));
        (conn, rx)
    }

    #[test]
    fn admit_and_lookup() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("dev1");
        let admitted = reg.admit(conn);

        let found = reg.lookup("dev1").unwrap();
        assert_eq!(found.id(), admitted.id());
        assert!(reg.contains("dev1"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn lookup_absent() {
        let reg = ConnectionRegistry::new();
        assert!(reg.lookup("ghost").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn admit_supersedes_existing() {
        let reg = ConnectionRegistry::new();
        let (first, _rx1) = make_connection("dev1");
        let (second, _rx2) = make_connection("dev1");

        let first = reg.admit(first);
        let second = reg.admit(second);

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup("dev1").unwrap().id(), second.id());
    }

    #[test]
    fn remove_closes_and_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("dev1");
        let conn = reg.admit(conn);

        assert!(reg.remove("dev1", DisconnectReason::Closed).is_some());
        assert!(conn.is_closed());
        assert!(reg.remove("dev1", DisconnectReason::Closed).is_none());
        assert!(reg.remove("never-seen", DisconnectReason::Closed).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn release_of_superseded_keeps_replacement() {
        let reg = ConnectionRegistry::new();
        let (old, _rx1) = make_connection("dev1");
        let (new, _rx2) = make_connection("dev1");
        let old = reg.admit(old);
        let new = reg.admit(new);

        assert!(!reg.release(&old, DisconnectReason::Closed));
        assert_eq!(reg.lookup("dev1").unwrap().id(), new.id());
        assert!(!new.is_closed());
    }

    #[test]
    fn release_of_current_removes() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("dev1");
        let conn = reg.admit(conn);

        assert!(reg.release(&conn, DisconnectReason::Closed));
        assert!(reg.is_empty());
        assert!(conn.is_closed());
    }

    #[test]
    fn snapshot_ordered_by_device_id() {
        let reg = ConnectionRegistry::new();
        let mut rxs = Vec::new();
        for id in ["charlie", "alpha", "bravo"] {
            let (conn, rx) = make_connection(id);
            let _ = reg.admit(conn);
            rxs.push(rx);
        }

        let ids: Vec<String> = reg
            .snapshot()
            .into_iter()
            .map(|i| i.device_id.into_inner())
            .collect();
        assert_eq!(ids, ["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let reg = ConnectionRegistry::new();
        let (conn, _rx) = make_connection("dev1");
        let _ = reg.admit(conn);

        let snap = reg.snapshot();
        let _ = reg.remove("dev1", DisconnectReason::Closed);
        assert_eq!(snap.len(), 1);
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn supersede_logged_at_info() {
        let (logs, _guard) = athena_core::logging::capture_logs();
        let reg = ConnectionRegistry::new();
        let (a, _ra) = make_connection("dev1");
        let (b, _rb) = make_connection("dev1");
        let _ = reg.admit(a);
        let _ = reg.admit(b);

        assert!(logs.has_event(tracing::Level::INFO, "superseding previous connection"));
    }
}
