//! `GatewayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use athena_core::DeviceId;
use athena_rpc::MethodRegistry;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::GatewayError;
use crate::health::{self, HealthResponse, ServiceInfo};
use crate::service::{BroadcastReport, GatewayService};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::liveness::LivenessSupervisor;
use crate::websocket::session::run_device_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, telemetry cache, and method table.
    pub service: Arc<GatewayService>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Renders `/metrics`; absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Largest accepted inbound device frame.
    pub max_message_size: usize,
}

/// The Athena device gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    service: Arc<GatewayService>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, methods: MethodRegistry) -> Self {
        let service = Arc::new(GatewayService::new(&config, methods));
        Self {
            config,
            service,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/connections", get(connections_handler))
            .route("/send/{device_id}", post(send_handler))
            .route("/broadcast", post(broadcast_handler))
            .route("/telemetry/{device_id}", get(telemetry_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/athena/{device_id}", get(ws_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the listener and serve until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), GatewayError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(err) = result {
                error!(error = %err, "gateway server error");
            }
        });

        info!(%addr, "athena gateway listening");
        Ok((addr, handle))
    }

    /// Start the liveness supervisor; it stops on shutdown.
    pub fn spawn_liveness(&self) -> JoinHandle<()> {
        let supervisor = LivenessSupervisor::new(
            self.service.registry().clone(),
            self.service.telemetry().clone(),
            self.config.liveness,
        );
        tokio::spawn(supervisor.run(self.shutdown.token()))
    }

    /// Get the gateway service.
    pub fn service(&self) -> &Arc<GatewayService> {
        &self.service
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /
async fn root_handler(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(health::service_info(state.service.connection_count()))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.service.connection_count();
    Json(health::health_check(state.start_time, connections, Utc::now()))
}

/// GET /connections
async fn connections_handler(State(state): State<AppState>) -> Json<Value> {
    let connections = state.service.list_connections();
    let total = connections.len();
    Json(json!({ "connections": connections, "total": total }))
}

/// POST /send/{device_id}
async fn send_handler(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(message): Json<Value>,
) -> Response {
    match state.service.send_to_device(&device_id, &message).await {
        Ok(()) => Json(json!({ "status": "sent" })).into_response(),
        Err(GatewayError::NotConnected { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Device not connected" })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to send command" })),
        )
            .into_response(),
    }
}

/// POST /broadcast
async fn broadcast_handler(
    State(state): State<AppState>,
    Json(message): Json<Value>,
) -> Json<BroadcastReport> {
    Json(state.service.broadcast(&message).await)
}

/// GET /telemetry/{device_id}
async fn telemetry_handler(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Response {
    match state.service.latest_telemetry(&device_id) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No recent telemetry" })),
        )
            .into_response(),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws/athena/{device_id}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let service = state.service.clone();
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            run_device_session(socket, DeviceId::from(device_id), service, shutdown)
        })
}
