//! Camera handlers.

use async_trait::async_trait;
use athena_core::SnapshotId;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::MethodHandler;

/// Mints a snapshot id for the calling device.
///
/// Ids have one-second resolution, so two requests in the same second
/// receive the same id.
pub struct TakeSnapshotHandler;

#[async_trait]
impl MethodHandler for TakeSnapshotHandler {
    #[instrument(skip_all, fields(method = "takeSnapshot", device_id = %ctx.device_id))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let snapshot_id = SnapshotId::for_device(&ctx.device_id, ctx.received_at);
        debug!(%snapshot_id, "snapshot requested");
        Ok(serde_json::json!({
            "status": "requested",
            "snapshotId": snapshot_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{TEST_DEVICE, make_test_context};

    #[tokio::test]
    async fn snapshot_requested() {
        let ctx = make_test_context();
        let result = TakeSnapshotHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(result["status"], "requested");
    }

    #[tokio::test]
    async fn snapshot_id_embeds_device_and_seconds() {
        let ctx = make_test_context();
        let result = TakeSnapshotHandler.handle(None, &ctx).await.unwrap();
        let expected = format!("snap_{TEST_DEVICE}_{}", ctx.received_at.timestamp());
        assert_eq!(result["snapshotId"], expected);
    }

    #[tokio::test]
    async fn same_second_same_id() {
        let ctx = make_test_context();
        let mut later = ctx.clone();
        later.received_at += chrono::Duration::milliseconds(900);

        let a = TakeSnapshotHandler.handle(None, &ctx).await.unwrap();
        let b = TakeSnapshotHandler.handle(None, &later).await.unwrap();
        assert_eq!(a["snapshotId"], b["snapshotId"]);
    }
}
