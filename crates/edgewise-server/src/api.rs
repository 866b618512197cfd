use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use edgewise_core::board::Variant;
use edgewise_core::error::RoomError;
use edgewise_core::room::{PlayerScore, RoomSnapshot, is_valid_room_code};

use crate::error::AppError;
use crate::room_manager::lock_room;
use crate::state::AppState;

/// Largest accepted create-room body.
const MAX_CREATE_BODY: usize = 1024;

/// Optional body for `POST /api/v1/rooms`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomBody {
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room: String,
    pub variant: Variant,
}

/// Room state as served over HTTP: the wire snapshot plus derived totals.
#[derive(Debug, Serialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub snapshot: RoomSnapshot,
    pub scores: Vec<PlayerScore>,
    pub board_full: bool,
}

/// POST /api/v1/rooms: pre-create an empty room with a fresh code.
pub async fn create_room(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    if !state.room_create_limiter.check_rate_limit(ip).await {
        tracing::warn!(%ip, "Room creation rate limited");
        return Err(AppError::TooManyRequests(
            "too many rooms created, try again later".to_string(),
        ));
    }

    let bytes = axum::body::to_bytes(request.into_body(), MAX_CREATE_BODY)
        .await
        .map_err(|e| AppError::BadRequest(format!("unreadable body: {e}")))?;
    let body: CreateRoomBody = if bytes.iter().all(u8::is_ascii_whitespace) {
        CreateRoomBody::default()
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let variant = match body.variant.as_deref() {
        None => None,
        Some(name) => Some(
            Variant::from_str_opt(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown variant: {name}")))?,
        ),
    };

    let (room, variant) = state.rooms.write().await.create_room(variant);
    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse { room, variant }),
    ))
}

/// GET /api/v1/rooms/{room}: current authoritative state.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    if !is_valid_room_code(&room) {
        return Err(AppError::BadRequest("invalid room code".to_string()));
    }
    let shared = state
        .rooms
        .read()
        .await
        .room(&room)
        .ok_or_else(|| AppError::NotFound(RoomError::UnknownRoom.to_string()))?;

    let entry = lock_room(&shared);
    let room = entry.room();
    Ok(Json(RoomView {
        snapshot: room.snapshot(),
        scores: room.scores(),
        board_full: room.is_board_full(),
    }))
}
