//! Device session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Instant;

use athena_core::DeviceId;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::histogram;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::DisconnectReason;
use super::handler::handle_frame;
use crate::metrics::DEVICE_CONNECTION_DURATION_SECONDS;
use crate::service::GatewayService;

/// Run a device's channel until it closes, is superseded or evicted, or the
/// gateway shuts down.
///
/// 1. Admits the connection, superseding any previous one for the device
/// 2. Spawns a writer that drains the outbound queue and sends periodic Pings
/// 3. Handles inbound frames in arrival order, queueing replies
/// 4. Releases the registry entry, unless a newer connection owns it
#[instrument(skip_all, fields(device_id = %device_id))]
pub async fn run_device_session(
    ws: WebSocket,
    device_id: DeviceId,
    service: Arc<GatewayService>,
    shutdown: CancellationToken,
) {
    let started = Instant::now();
    let channel = service.channel();
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(channel.send_queue);
    let conn = service.admit(device_id, send_tx);
    let close = conn.close_token();

    let writer_close = close.clone();
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(channel.ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        let mut write_failed = false;
        loop {
            let outgoing = tokio::select! {
                biased;
                () = writer_close.cancelled() => break,
                msg = send_rx.recv() => match msg {
                    Some(text) => Message::Text(text.as_str().into()),
                    None => break,
                },
                _ = ping.tick() => Message::Ping(Bytes::new()),
            };
            if !matches!(
                timeout(channel.write_timeout, ws_tx.send(outgoing)).await,
                Ok(Ok(()))
            ) {
                write_failed = true;
                break;
            }
        }

        writer_close.cancel();
        let _ = timeout(channel.write_timeout, ws_tx.send(Message::Close(None))).await;
        write_failed
    });

    let reason = loop {
        let next = tokio::select! {
            biased;
            () = close.cancelled() => break DisconnectReason::Closed,
            () = shutdown.cancelled() => break DisconnectReason::Shutdown,
            next = ws_rx.next() => next,
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    warn!(len = data.len(), "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) => {
                debug!("device sent close frame");
                break DisconnectReason::Closed;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Err(error)) => {
                debug!(%error, "device socket error");
                break DisconnectReason::Closed;
            }
            None => break DisconnectReason::Closed,
        };

        let Some(reply) =
            handle_frame(&text, &conn, service.telemetry(), service.methods()).await
        else {
            continue;
        };
        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "failed to serialize reply");
                continue;
            }
        };
        if let Err(error) = conn.send(Arc::new(json)).await {
            info!(%error, "failed to queue reply");
            break DisconnectReason::WriteFailed;
        }
    };

    conn.close();
    let write_failed = writer.await.unwrap_or(false);
    let reason = if write_failed {
        DisconnectReason::WriteFailed
    } else {
        reason
    };
    let _ = service.registry().release(&conn, reason);

    histogram!(DEVICE_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    debug!(
        reason = reason.as_str(),
        dropped = conn.drop_count(),
        "device session ended"
    );
}
