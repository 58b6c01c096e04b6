//! Device channel management: connection state, registry, frame handling,
//! session lifecycle, and liveness supervision.

pub mod connection;
pub mod handler;
pub mod liveness;
pub mod registry;
pub mod session;

pub use connection::{ConnectionInfo, DeviceConnection, DisconnectReason};
pub use registry::ConnectionRegistry;
