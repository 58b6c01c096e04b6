//! Per-call context passed to every handler.

use athena_core::DeviceId;
use chrono::{DateTime, Utc};

/// Identity and clock reading for one inbound call.
#[derive(Clone, Debug)]
pub struct RpcContext {
    /// Device that sent the call.
    pub device_id: DeviceId,
    /// When the gateway received the frame.
    pub received_at: DateTime<Utc>,
}

impl RpcContext {
    /// Context stamped with the current time.
    pub fn new(device_id: DeviceId) -> Self {
        Self::at(device_id, Utc::now())
    }

    /// Context with an explicit receive time.
    pub fn at(device_id: DeviceId, received_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            received_at,
        }
    }
}
