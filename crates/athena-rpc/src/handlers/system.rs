//! System handlers: getSystemInfo, reboot.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::MethodHandler;
use crate::types::wire_timestamp;

/// Returns the gateway version and the receive timestamp.
pub struct GetSystemInfoHandler;

#[async_trait]
impl MethodHandler for GetSystemInfoHandler {
    #[instrument(skip_all, fields(method = "getSystemInfo", device_id = %ctx.device_id))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": wire_timestamp(ctx.received_at),
        }))
    }
}

/// Acknowledges a reboot request. The device acts on the acknowledgement.
pub struct RebootHandler;

#[async_trait]
impl MethodHandler for RebootHandler {
    #[instrument(skip_all, fields(method = "reboot", device_id = %ctx.device_id))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        info!(device_id = %ctx.device_id, "reboot requested");
        Ok(serde_json::json!({ "status": "reboot_requested" }))
    }
}
