//! Inbound frame handling for the device channel.
//!
//! `heartbeat` and `telemetry` touch gateway state (liveness and the
//! telemetry cache) and are answered here. Every other method goes through the
//! [`MethodRegistry`]. Requests without an id get no reply, whatever the
//! outcome.

use athena_rpc::types::wire_timestamp;
use athena_rpc::{InboundFrame, MethodRegistry, RpcContext, RpcRequest, RpcResponse};
use chrono::Utc;
use metrics::counter;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use super::connection::DeviceConnection;
use crate::metrics::{DEVICE_DECODE_ERRORS_TOTAL, DEVICE_FRAMES_TOTAL};
use crate::telemetry::TelemetryStore;

/// Liveness ping from the device.
pub const HEARTBEAT_METHOD: &str = "heartbeat";
/// Telemetry upload from the device.
pub const TELEMETRY_METHOD: &str = "telemetry";

/// Handle one text frame, returning the reply to write back, if any.
///
/// Never fails: malformed input is logged and dropped so the channel stays up.
#[instrument(skip_all, fields(device_id = %conn.device_id()))]
pub async fn handle_frame(
    text: &str,
    conn: &DeviceConnection,
    telemetry: &TelemetryStore,
    methods: &MethodRegistry,
) -> Option<RpcResponse> {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(error) => {
            counter!(DEVICE_DECODE_ERRORS_TOTAL).increment(1);
            warn!(%error, len = text.len(), "dropping undecodable frame");
            return None;
        }
    };

    match frame {
        InboundFrame::Request(request) => {
            counter!(DEVICE_FRAMES_TOTAL, "kind" => "request").increment(1);
            handle_request(request, conn, telemetry, methods).await
        }
        InboundFrame::Reply { id, is_error, .. } => {
            counter!(DEVICE_FRAMES_TOTAL, "kind" => "reply").increment(1);
            debug!(?id, is_error, "device replied to pushed command");
            None
        }
        InboundFrame::Unrecognized(value) => {
            counter!(DEVICE_FRAMES_TOTAL, "kind" => "unrecognized").increment(1);
            warn!(frame = %value, "ignoring frame without method");
            None
        }
    }
}

async fn handle_request(
    request: RpcRequest,
    conn: &DeviceConnection,
    telemetry: &TelemetryStore,
    methods: &MethodRegistry,
) -> Option<RpcResponse> {
    match request.method.as_str() {
        HEARTBEAT_METHOD => {
            conn.record_heartbeat();
            request.id.map(|id| {
                RpcResponse::success(
                    Some(id),
                    json!({ "status": "ok", "timestamp": wire_timestamp(Utc::now()) }),
                )
            })
        }
        TELEMETRY_METHOD => {
            let payload = request.params.unwrap_or_else(|| Value::Object(Map::new()));
            telemetry.record(conn.device_id(), payload);
            request
                .id
                .map(|id| RpcResponse::success(Some(id), json!({ "status": "received" })))
        }
        _ => {
            let notification = request.is_notification();
            let ctx = RpcContext::new(conn.device_id().clone());
            let response = methods.dispatch(request, &ctx).await;
            if notification {
                if let Some(error) = &response.error {
                    debug!(code = error.code, message = %error.message, "notification failed");
                }
                None
            } else {
                Some(response)
            }
        }
    }
}
