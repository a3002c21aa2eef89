// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{Router, routing::get};
use nestor_config::SocketConfig;
use nestor_core::NestorError;
use nestor_socket::{ConnectionHub, EventPropagator, SocketRegistry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenAuthenticator;
use crate::{handlers, ws};

/// Renders the metrics exposition served on `/metrics`.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<SocketRegistry>,
    pub hub: Arc<ConnectionHub>,
    pub auth: Arc<TokenAuthenticator>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    pub metrics_render: Option<MetricsRender>,
}

impl GatewayState {
    pub fn new(registry: Arc<SocketRegistry>, hub: Arc<ConnectionHub>, config: &SocketConfig) -> Self {
        Self {
            registry,
            hub,
            auth: Arc::new(TokenAuthenticator::new(&config.tokens)),
            start_time: Instant::now(),
            metrics_render: None,
        }
    }

    pub fn with_metrics_render(mut self, render: MetricsRender) -> Self {
        self.metrics_render = Some(render);
        self
    }

    /// State sharing the propagator's registry and hub, so events it
    /// consumes reach sockets accepted here.
    pub fn for_propagator(propagator: &EventPropagator, config: &SocketConfig) -> Self {
        Self::new(propagator.registry().clone(), propagator.hub().clone(), config)
    }
}

/// Routes:
/// - GET /health (uptime and connection counts)
/// - GET /metrics (Prometheus text, 404 without a recorder)
/// - GET /ws (auth during handshake)
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves on an already-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), NestorError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| NestorError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Binds `config.host:config.port` and serves until `cancel` fires.
pub async fn start_server(
    config: &SocketConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), NestorError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| NestorError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");
    serve(listener, state, cancel).await
}
