//! # athena-core
//!
//! Foundation types shared by every Athena crate.
//!
//! - **Branded IDs**: [`ids::DeviceId`], [`ids::ConnectionId`], [`ids::SnapshotId`]
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::{ConnectionId, DeviceId, SnapshotId};
