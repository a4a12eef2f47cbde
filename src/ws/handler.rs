//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Outbound, PlayerInput, RoomCommand};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// Replies that bypass the room (protocol errors)
const DIRECT_BUFFER: usize = 16;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before joining so the init message is not missed
    let outbound_rx = state.room.subscribe();
    let commands = state.room.commands.clone();

    if commands.send(RoomCommand::Join { player_id }).await.is_err() {
        error!(player_id = %player_id, "Room is not running");
        return;
    }

    run_session(player_id, ws_sink, ws_stream, commands.clone(), outbound_rx).await;

    // Cleanup on disconnect
    let _ = commands.send(RoomCommand::Leave { player_id }).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    commands: mpsc::Sender<RoomCommand>,
    mut outbound_rx: broadcast::Receiver<Arc<Outbound>>,
) {
    let rate_limiter = PlayerRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_BUFFER);

    // Spawn writer task: room messages addressed to this player -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = outbound_rx.recv() => match received {
                    Ok(outbound) => {
                        if !outbound.to.includes(player_id) {
                            continue;
                        }
                        outbound.msg.clone()
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(player_id = %player_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %player_id, "Room channel closed");
                        break;
                    }
                },
                Some(msg) = direct_rx.recv() => msg,
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        let parsed = match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(player_id = %player_id, "Rate limited message");
                    continue;
                }
                ClientMsg::parse(&text)
            }
            Ok(Message::Binary(_)) => Err(ProtocolError::Binary),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        };

        match parsed {
            Ok(msg) => {
                let input = PlayerInput {
                    player_id,
                    msg,
                    received_at: unix_millis(),
                };
                if commands.send(RoomCommand::Input(input)).await.is_err() {
                    debug!(player_id = %player_id, "Room channel closed");
                    break;
                }
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Rejected client frame");
                let _ = direct_tx.try_send(e.to_server_msg());
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
