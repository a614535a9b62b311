//! HTTP/WebSocket server
//!
//! Routes:
//! - `GET /ws`: grant protocol socket for facilitators and players
//! - `GET /health`: liveness
//! - `GET /api/status`: aggregate gateway counters
//! - `GET /api/characters/:character_id`: one character's protocol state
//! - `DELETE /api/characters/:character_id`: delete the record and its in-memory grant state

use crate::config::ServerConfig;
use crate::websocket::handle_socket;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bondsmith_core::{CharacterId, CharacterRecords, SystemClock};
use bondsmith_sync::{CharacterSnapshot, DeliveryGateway, GatewayStats, InMemoryCharacterRecords};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared state for Axum handlers
#[derive(Clone)]
pub struct ServerState {
    /// Grant protocol entry point
    pub gateway: Arc<DeliveryGateway>,
    /// Character records backing the gateway
    pub records: Arc<InMemoryCharacterRecords>,
}

impl ServerState {
    /// Build the gateway over `records`
    pub fn new(config: &ServerConfig, records: Arc<InMemoryCharacterRecords>) -> Self {
        let gateway = DeliveryGateway::new(
            config.gateway.clone(),
            Arc::clone(&records) as Arc<dyn CharacterRecords>,
            Arc::new(SystemClock),
        );
        Self {
            gateway: Arc::new(gateway),
            records,
        }
    }
}

/// Grant delivery server
pub struct GrantServer {
    config: ServerConfig,
    state: ServerState,
}

impl GrantServer {
    /// Create a server with records seeded from the config
    pub fn from_config(config: ServerConfig) -> Self {
        let records = Arc::new(config.records());
        let state = ServerState::new(&config, records);
        Self { config, state }
    }

    /// Shared handler state
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, characters = self.config.characters.len(), "Starting grant server");
        serve(listener, self.state, shutdown).await
    }
}

/// Router over `state`
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/api/status", get(server_status))
        .route(
            "/api/characters/:character_id",
            get(character_status).delete(delete_character),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve `state` on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Grant server stopped");
    Ok(())
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn server_status(State(state): State<ServerState>) -> Json<GatewayStats> {
    Json(state.gateway.stats())
}

async fn character_status(
    Path(character_id): Path<String>,
    State(state): State<ServerState>,
) -> Json<CharacterSnapshot> {
    Json(state.gateway.snapshot(&CharacterId::new(character_id)))
}

async fn delete_character(
    Path(character_id): Path<String>,
    State(state): State<ServerState>,
) -> StatusCode {
    let character_id = CharacterId::new(character_id);
    let had_record = state.records.delete(&character_id);
    let had_state = state.gateway.forget_character(&character_id);
    if had_record || had_state {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
