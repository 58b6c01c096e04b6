//! Gateway error type.

use athena_core::DeviceId;

/// Errors surfaced by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No live connection for the device.
    #[error("device {device_id} is not connected")]
    NotConnected {
        /// Target device.
        device_id: DeviceId,
    },

    /// The device's channel could not accept the message.
    ///
    /// The connection has been removed by the time this is returned.
    #[error("transport failure for device {device_id}: {reason}")]
    Transport {
        /// Target device.
        device_id: DeviceId,
        /// What went wrong (closed, timed out).
        reason: String,
    },

    /// The listener could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

impl GatewayError {
    /// Build a transport error.
    pub fn transport(device_id: &DeviceId, reason: impl Into<String>) -> Self {
        Self::Transport {
            device_id: device_id.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_display() {
        let err = GatewayError::NotConnected {
            device_id: DeviceId::from("dev1"),
        };
        assert_eq!(err.to_string(), "device dev1 is not connected");
    }

    #[test]
    fn transport_display() {
        let err = GatewayError::transport(&DeviceId::from("dev1"), "write timed out");
        assert_eq!(
            err.to_string(),
            "transport failure for device dev1: write timed out"
        );
    }

    #[test]
    fn bind_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: GatewayError = io.into();
        assert!(matches!(err, GatewayError::Bind(_)));
        assert!(err.to_string().contains("in use"));
    }
}
