//! Navigation handlers.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::optional_number_param;
use crate::registry::MethodHandler;

/// Accepts a destination and echoes it back.
///
/// Coordinates are not range-checked. Missing values echo as `null`.
pub struct SetDestinationHandler;

#[async_trait]
impl MethodHandler for SetDestinationHandler {
    #[instrument(skip_all, fields(method = "setDestination", device_id = %ctx.device_id))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let lat = optional_number_param(params.as_ref(), "lat")?;
        let lon = optional_number_param(params.as_ref(), "lon")?;
        Ok(serde_json::json!({
            "status": "destination_set",
            "lat": lat,
            "lon": lon,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::INVALID_PARAMS;
    use crate::handlers::test_helpers::make_test_context;
    use serde_json::json;

    #[tokio::test]
    async fn echoes_coordinates() {
        let ctx = make_test_context();
        let result = SetDestinationHandler
            .handle(Some(json!({"lat": 32.7157, "lon": -117.1611})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result,
            json!({"status": "destination_set", "lat": 32.7157, "lon": -117.1611})
        );
    }

    #[tokio::test]
    async fn out_of_range_values_pass_through() {
        let ctx = make_test_context();
        let result = SetDestinationHandler
            .handle(Some(json!({"lat": 500, "lon": -999.5})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["lat"], 500);
        assert_eq!(result["lon"], -999.5);
    }

    #[tokio::test]
    async fn missing_values_echo_null() {
        let ctx = make_test_context();
        let result = SetDestinationHandler
            .handle(Some(json!({"lat": 1.0})), &ctx)
            .await
            .unwrap();
        assert_eq!(result["lat"], 1.0);
        assert!(result["lon"].is_null());

        let result = SetDestinationHandler.handle(None, &ctx).await.unwrap();
        assert!(result["lat"].is_null());
        assert!(result["lon"].is_null());
    }

    #[tokio::test]
    async fn wrong_type_is_invalid_params() {
        let ctx = make_test_context();
        let err = SetDestinationHandler
            .handle(Some(json!({"lat": "north", "lon": 1})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }
}
