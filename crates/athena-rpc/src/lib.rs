//! # athena-rpc
//!
//! JSON-RPC 2.0 protocol layer spoken by devices over their gateway channel.
//!
//! - [`types`]: inbound frame classification and outbound responses
//! - [`errors`]: standard error codes and the handler error type
//! - [`registry`]: method name to handler mapping with timed dispatch
//! - [`handlers`]: the device method table (`getSystemInfo`, `takeSnapshot`,
//!   `setDestination`, `reboot`)
//!
//! `heartbeat` and `telemetry` are not in the table; they touch gateway state
//! and are handled by the gateway's frame handler before dispatch.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;

pub use context::RpcContext;
pub use errors::RpcError;
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{FrameError, InboundFrame, RpcErrorBody, RpcRequest, RpcResponse};
