//! End-to-end tests against a real gateway using WebSocket device clients.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use athena_gateway::config::LivenessConfig;
use athena_gateway::{GatewayServer, ServerConfig};
use athena_rpc::{MethodHandler, MethodRegistry, RpcContext, RpcError};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Echoes the calling device's id, so tests can see the context a handler gets.
struct WhoAmIHandler;

#[async_trait]
impl MethodHandler for WhoAmIHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({ "deviceId": ctx.device_id }))
    }
}

async fn boot_with(config: ServerConfig) -> (GatewayServer, SocketAddr) {
    let mut methods = MethodRegistry::new();
    athena_rpc::handlers::register_all(&mut methods);
    methods.register("whoAmI", WhoAmIHandler);

    let server = GatewayServer::new(config, methods);
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

async fn boot() -> (GatewayServer, SocketAddr) {
    boot_with(ServerConfig::default()).await
}

async fn connect(addr: SocketAddr, device: &str) -> WsStream {
    let url = format!("ws://{addr}/ws/athena/{device}");
    let (ws, _resp) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

/// Connect and wait until the gateway has registered the device.
async fn connect_registered(server: &GatewayServer, addr: SocketAddr, device: &str) -> WsStream {
    let before = server.service().registry().lookup(device).map(|c| c.id().clone());
    let ws = connect(addr, device).await;
    wait_for(|| {
        server
            .service()
            .registry()
            .lookup(device)
            .is_some_and(|c| Some(c.id()) != before.as_ref())
    })
    .await;
    ws
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next text frame as JSON, skipping transport control frames.
async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert no text frame arrives within `window`.
async fn expect_silence(ws: &mut WsStream, window: Duration) {
    let quiet = timeout(window, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => return other,
            }
        }
    })
    .await;
    if let Ok(frame) = quiet {
        panic!("expected no frame, got {frame:?}");
    }
}

/// Wait until the gateway closes the channel.
async fn expect_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("channel was not closed");
}

#[tokio::test]
async fn get_system_info_round_trip() {
    let (_server, addr) = boot().await;
    let mut ws = connect(addr, "dev1").await;

    send_json(&mut ws, &json!({"jsonrpc": "2.0", "method": "getSystemInfo", "id": 7})).await;
    let resp = recv_json(&mut ws).await;

    assert_eq!(resp["jsonrpc"], "2.0");
    assert_eq!(resp["id"], 7);
    assert!(resp["result"]["version"].is_string());
    assert!(resp.get("error").is_none());
}

#[tokio::test]
async fn unknown_method_returns_method_not_found() {
    let (_server, addr) = boot().await;
    let mut ws = connect(addr, "dev1").await;

    send_json(&mut ws, &json!({"jsonrpc": "2.0", "method": "bogus", "id": 9})).await;
    let resp = recv_json(&mut ws).await;

    assert_eq!(resp["id"], 9);
    assert_eq!(resp["error"]["code"], -32601);
    assert_eq!(resp["error"]["message"], "Method not found: bogus");
}

#[tokio::test]
async fn heartbeat_without_id_is_not_answered() {
    let (server, addr) = boot().await;
    let mut ws = connect_registered(&server, addr, "dev1").await;
    let connected_at = server.service().list_connections()[0].connected_at;

    send_json(&mut ws, &json!({"jsonrpc": "2.0", "method": "heartbeat", "id": null})).await;
    send_json(&mut ws, &json!({"jsonrpc": "2.0", "method": "getSystemInfo", "id": 1})).await;

    // Frames are handled in order, so the first reply belongs to the second frame.
    let resp = recv_json(&mut ws).await;
    assert_eq!(resp["id"], 1);
    let info = &server.service().list_connections()[0];
    assert!(info.last_heartbeat_at >= connected_at);
}

#[tokio::test]
async fn malformed_frame_keeps_channel_open() {
    let (_server, addr) = boot().await;
    let mut ws = connect(addr, "dev1").await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    send_json(&mut ws, &json!({"method": "getSystemInfo", "id": "after"})).await;

    assert_eq!(recv_json(&mut ws).await["id"], "after");
}

#[tokio::test]
async fn handler_sees_calling_device() {
    let (_server, addr) = boot().await;
    let mut ws = connect(addr, "a2a0ccea32023010").await;

    send_json(&mut ws, &json!({"method": "whoAmI", "id": 1})).await;
    assert_eq!(recv_json(&mut ws).await["result"]["deviceId"], "a2a0ccea32023010");
}

#[tokio::test]
async fn replies_route_to_originating_device() {
    let (server, addr) = boot().await;
    let mut a = connect_registered(&server, addr, "a").await;
    let mut b = connect_registered(&server, addr, "b").await;

    let who = json!({"method": "whoAmI", "id": 1});
    send_json(&mut a, &who).await;
    send_json(&mut b, &who).await;

    let reply_a = recv_json(&mut a).await;
    let reply_b = recv_json(&mut b).await;
    assert_eq!(reply_a["id"], 1);
    assert_eq!(reply_a["result"]["deviceId"], "a");
    assert_eq!(reply_b["id"], 1);
    assert_eq!(reply_b["result"]["deviceId"], "b");

    send_json(&mut a, &json!({"method": "whoAmI", "id": 2})).await;
    assert_eq!(recv_json(&mut a).await["result"]["deviceId"], "a");
    expect_silence(&mut b, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn telemetry_is_cached() {
    let (server, addr) = boot().await;
    let mut ws = connect(addr, "dev1").await;

    send_json(
        &mut ws,
        &json!({"method": "telemetry", "params": {"speed": 27.5, "gear": "D"}, "id": 2}),
    )
    .await;
    assert_eq!(recv_json(&mut ws).await["result"]["status"], "received");

    let snap = server.service().latest_telemetry("dev1").unwrap();
    assert_eq!(snap.payload["gear"], "D");
}

#[tokio::test]
async fn reconnect_supersedes_previous_channel() {
    let (server, addr) = boot().await;
    let mut first = connect_registered(&server, addr, "dev1").await;
    let mut second = connect_registered(&server, addr, "dev1").await;

    expect_closed(&mut first).await;
    assert_eq!(server.service().connection_count(), 1);

    // The old session's cleanup must not evict the new channel.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.service().is_connected("dev1"));

    server
        .service()
        .send_to_device("dev1", &json!({"method": "reboot", "id": "c1"}))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut second).await["method"], "reboot");
}

#[tokio::test]
async fn send_to_device_delivers_command() {
    let (server, addr) = boot().await;
    let mut ws = connect_registered(&server, addr, "dev1").await;

    let cmd = json!({"jsonrpc": "2.0", "method": "takeSnapshot", "params": {}, "id": "cmd-1"});
    server.service().send_to_device("dev1", &cmd).await.unwrap();
    assert_eq!(recv_json(&mut ws).await, cmd);

    // The device's reply to a pushed command is accepted silently.
    send_json(&mut ws, &json!({"jsonrpc": "2.0", "result": {"ok": true}, "id": "cmd-1"})).await;
    send_json(&mut ws, &json!({"method": "getSystemInfo", "id": 2})).await;
    assert_eq!(recv_json(&mut ws).await["id"], 2);
}

#[tokio::test]
async fn broadcast_reaches_every_device() {
    let (server, addr) = boot().await;
    let mut a = connect_registered(&server, addr, "a").await;
    let mut b = connect_registered(&server, addr, "b").await;

    let msg = json!({"method": "reboot"});
    let report = server.service().broadcast(&msg).await;

    assert_eq!(report.delivered, 2);
    assert!(report.failed.is_empty());
    assert_eq!(recv_json(&mut a).await, msg);
    assert_eq!(recv_json(&mut b).await, msg);
}

#[tokio::test]
async fn client_close_unregisters_device() {
    let (server, addr) = boot().await;
    let mut ws = connect_registered(&server, addr, "dev1").await;

    ws.close(None).await.unwrap();
    wait_for(|| !server.service().is_connected("dev1")).await;
}

#[tokio::test]
async fn silent_device_is_evicted() {
    let config = ServerConfig {
        liveness: LivenessConfig {
            enabled: true,
            check_interval: Duration::from_millis(50),
            grace: Duration::from_millis(200),
        },
        ..ServerConfig::default()
    };
    let (server, addr) = boot_with(config).await;
    let _liveness = server.spawn_liveness();
    let mut ws = connect_registered(&server, addr, "quiet").await;

    expect_closed(&mut ws).await;
    assert!(!server.service().is_connected("quiet"));
}

#[tokio::test]
async fn shutdown_closes_device_channels() {
    let (server, addr) = boot().await;
    let mut ws = connect_registered(&server, addr, "dev1").await;

    server.shutdown().shutdown();
    expect_closed(&mut ws).await;
    wait_for(|| server.service().connection_count() == 0).await;
}
