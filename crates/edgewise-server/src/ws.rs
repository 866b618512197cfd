use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ConnectInfo;
use axum::extract::FromRequest;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use edgewise_core::error::RoomError;
use edgewise_core::net::messages::{ClientMessage, JoinRoomMsg, MakeMoveMsg};
use edgewise_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
};
use edgewise_core::player::PlayerId;

use crate::rate_limit::TokenBucket;
use crate::room_manager::{JoinError, JoinRequest, JoinTicket, RoomManager, lock_room};
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let Some(ip_guard) = IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip)
    else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be a JoinRoom.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    if first_msg.len() > MAX_MESSAGE_SIZE {
        return;
    }
    let Ok(ClientMessage::JoinRoom(join)) = decode_client_message(&first_msg) else {
        return;
    };

    // Validate protocol version
    if join.protocol_version != 0 && join.protocol_version != PROTOCOL_VERSION {
        let error = format!(
            "Protocol version mismatch: client={}, server={}",
            join.protocol_version, PROTOCOL_VERSION
        );
        send_join_error(&mut ws_sender, &error, None, None).await;
        return;
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let ticket = match attempt_join(&join, &state, tx).await {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::debug!(room = %join.room_code, error = %e, "Join refused");
            let room_code = (!join.room_code.is_empty()).then_some(join.room_code.as_str());
            send_join_error(&mut ws_sender, &e.to_string(), e.reason(), room_code).await;
            return;
        },
    };

    let response = match RoomManager::make_join_response(&ticket) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode JoinRoomResponse");
            disconnect(&state, &ticket).await;
            return;
        },
    };
    if ws_sender
        .send(Message::Binary(response.into()))
        .await
        .is_err()
    {
        disconnect(&state, &ticket).await;
        return;
    }

    let writer = spawn_writer(ws_sender, rx);

    tokio::select! {
        () = read_loop(&mut ws_receiver, &state, &ticket.room_code, ticket.player_id) => {},
        // The room dropped our sender (closed by the janitor) or the socket
        // stopped accepting writes.
        _ = writer => {
            tracing::debug!(
                player_id = ticket.player_id,
                room = %ticket.room_code,
                "Outbound channel closed, ending connection"
            );
        },
    }

    disconnect(&state, &ticket).await;
}

/// Session reconnect first, then a normal join.
async fn attempt_join(
    join: &JoinRoomMsg,
    state: &AppState,
    tx: mpsc::Sender<Bytes>,
) -> Result<JoinTicket, JoinError> {
    let mut rooms = state.rooms.write().await;

    if let Some(ref token) = join.session_token {
        match rooms.reconnect(token, tx.clone()) {
            Ok(ticket) => return Ok(ticket),
            Err(e) => {
                tracing::debug!(error = %e, "Session reconnect failed, trying normal join");
            },
        }
    }

    rooms.join_room(
        JoinRequest {
            room_code: join.room_code.clone(),
            variant: join.variant,
            player_name: join.player_name.clone(),
            symbol: join.symbol.clone(),
            color: join.color,
        },
        tx,
    )
}

async fn disconnect(state: &AppState, ticket: &JoinTicket) {
    let destroyed = {
        let mut rooms = state.rooms.write().await;
        rooms.leave_room(&ticket.room_code, ticket.player_id)
    };
    tracing::info!(
        player_id = ticket.player_id,
        room = %ticket.room_code,
        destroyed,
        "Player disconnected"
    );
}

async fn send_join_error(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    error: &str,
    reason: Option<RoomError>,
    room_code: Option<&str>,
) {
    match RoomManager::make_join_error(error, reason, room_code) {
        Ok(response) => {
            if let Err(e) = ws_sender.send(Message::Binary(response.into())).await {
                tracing::warn!(error = %e, "Failed to send join error response");
            }
        },
        Err(e) => tracing::warn!(error = %e, "Failed to encode join error response"),
    }
}

/// Forward queued frames to the socket. Once every sender is gone the
/// remaining queue is flushed and the socket is closed.
fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    })
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    room_code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = TokenBucket::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, room_code, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(player_id, room_code, error = %e, "Undecodable frame");
                continue;
            },
        };

        if msg_type.is_server_only() {
            tracing::warn!(
                player_id,
                room_code,
                ?msg_type,
                "Rejected server-only message from client"
            );
            continue;
        }

        let msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(player_id, room_code, error = %e, "Malformed client message");
                continue;
            },
        };

        match msg {
            ClientMessage::MakeMove(mv) => {
                if mv.player_id != player_id {
                    tracing::warn!(
                        player_id,
                        claimed = mv.player_id,
                        room_code,
                        "Dropped move with spoofed player id"
                    );
                    continue;
                }
                handle_move(state, room_code, player_id, &mv).await;
            },
            ClientMessage::LeaveRoom(leave) => {
                if leave.player_id != player_id {
                    tracing::warn!(
                        player_id,
                        claimed = leave.player_id,
                        room_code,
                        "Dropped leave with spoofed player id"
                    );
                    continue;
                }
                tracing::info!(player_id, room_code, "Player left");
                break;
            },
            ClientMessage::JoinRoom(_) => {
                // One seat per connection.
                let Some(shared) = state.rooms.read().await.room(room_code) else {
                    continue;
                };
                let reason = RoomError::DuplicatePlayer;
                if let Ok(data) =
                    RoomManager::make_join_error(&reason.to_string(), Some(reason), Some(room_code))
                {
                    lock_room(&shared).send_to_player(player_id, Bytes::from(data));
                }
            },
        }
    }
}

async fn handle_move(state: &AppState, room_code: &str, player_id: PlayerId, mv: &MakeMoveMsg) {
    // Gone rooms are noticed by the writer ending.
    let Some(shared) = state.rooms.read().await.room(room_code) else {
        return;
    };
    let mut entry = lock_room(&shared);
    if mv.room_code != room_code {
        entry.reject_move(player_id, RoomError::UnknownRoom, mv.start, mv.end);
        return;
    }
    // Rejections are delivered to the proposer inside apply_move.
    let _ = entry.apply_move(player_id, mv.start, mv.end);
}
