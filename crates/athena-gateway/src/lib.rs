//! # athena-gateway
//!
//! Real-time device gateway.
//!
//! - [`websocket`]: per-device channel state, the connection registry, the
//!   frame handler (RPC engine), the session loop, and the liveness supervisor
//! - [`telemetry`]: short-TTL cache of the latest telemetry per device
//! - [`service`]: send-to-device, broadcast, and connection inventory
//! - [`server`]: Axum router exposing the device channel and HTTP control routes
//! - [`health`], [`metrics`], [`shutdown`]: operational plumbing

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod telemetry;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::GatewayError;
pub use server::GatewayServer;
pub use service::{BroadcastReport, GatewayService};
pub use telemetry::{TelemetrySnapshot, TelemetryStore};
