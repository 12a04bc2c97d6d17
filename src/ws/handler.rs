//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use super::connection::{Connection, ConnectionConfig};
use super::hub::HubHandle;
use crate::app_state::AppState;

/// `GET /ws/stock-updates`: upgrade to a stock update subscription.
///
/// The connection is registered with the hub before its loops start, then
/// the handler returns; it does not supervise the connection afterwards.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let config = state.connection_config;

    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(move |err| {
            tracing::warn!(%peer, %err, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| attach(socket, hub, peer, config))
}

async fn attach(socket: WebSocket, hub: HubHandle, peer: SocketAddr, config: ConnectionConfig) {
    let connection = match Connection::accept(&hub, peer, config).await {
        Ok(connection) => connection,
        Err(err) => {
            // Dropping the socket closes the transport.
            tracing::warn!(%peer, %err, "rejecting subscriber");
            return;
        }
    };
    tracing::info!(connection_id = %connection.id(), %peer, "subscriber connected");

    let (sink, stream) = socket.split();
    let _state = connection.start(sink, stream);
}
