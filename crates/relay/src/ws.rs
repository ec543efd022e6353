//! WebSocket-Router des Relays
//!
//! `GET /` und `GET /ws` akzeptieren WebSocket-Upgrades. Ein normaler
//! HTTP-Request auf `/` bekommt eine kurze Begruessung.

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::server_state::RelayState;

/// Begruessung fuer Requests ohne Upgrade
pub const BEGRUESSUNG: &str = "Hello from BeatSync server!";

#[derive(Clone)]
struct WsState {
    relay: Arc<RelayState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Axum-Router fuer die WebSocket-Endpunkte
pub fn relay_router(relay: Arc<RelayState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(WsState { relay, shutdown_rx })
}

async fn ws_handler(
    State(state): State<WsState>,
    upgrade: Option<WebSocketUpgrade>,
    verbindung: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let Some(upgrade) = upgrade else {
        return BEGRUESSUNG.into_response();
    };

    let peer_addr = verbindung.map(|ConnectInfo(addr)| addr);
    upgrade.on_upgrade(move |socket| {
        ClientConnection::neu(state.relay, peer_addr).verarbeiten(socket, state.shutdown_rx)
    })
}
