use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use edgewise_core::board::{Board, GridBoard, PointBoard, Variant, Vertex};
use edgewise_core::error::RoomError;
use edgewise_core::net::messages::{
    JoinRoomResponseMsg, MoveRejectedMsg, RoomStateMsg, ServerMessage,
};
use edgewise_core::net::protocol::{ProtocolError, encode_server_message};
use edgewise_core::player::{PlayerColor, PlayerId, sanitize_name, sanitize_symbol};
use edgewise_core::room::{
    MoveOutcome, PlayerInfo, Room, RoomConfig, generate_room_code,
    is_valid_room_code,
};

use crate::config::RoomsConfig;

/// Per-player sender for outbound WebSocket binary messages. Bounded by
/// `limits.player_message_buffer`.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// One room behind its own lock.
pub type SharedRoom = Arc<Mutex<RoomEntry>>;

/// Lock a room, recovering the guard if a previous holder panicked.
pub fn lock_room(room: &SharedRoom) -> MutexGuard<'_, RoomEntry> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a join or reconnect was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    Room(RoomError),
    InvalidRoomCode,
    InvalidName,
    InvalidSymbol,
    InvalidSession,
    SessionExpired,
}

impl JoinError {
    /// The room-level reason, if the room itself refused.
    pub fn reason(self) -> Option<RoomError> {
        match self {
            Self::Room(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RoomError> for JoinError {
    fn from(e: RoomError) -> Self {
        Self::Room(e)
    }
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Room(e) => write!(f, "{e}"),
            Self::InvalidRoomCode => write!(f, "invalid room code"),
            Self::InvalidName => write!(f, "invalid player name"),
            Self::InvalidSymbol => write!(f, "invalid symbol"),
            Self::InvalidSession => write!(f, "invalid or expired session"),
            Self::SessionExpired => write!(f, "session expired"),
        }
    }
}

impl std::error::Error for JoinError {}

/// What a connection asks for when it joins.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Empty to create a fresh room.
    pub room_code: String,
    /// Board family if the join creates the room.
    pub variant: Option<Variant>,
    pub player_name: String,
    pub symbol: String,
    pub color: PlayerColor,
}

/// A granted seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTicket {
    pub room_code: String,
    pub player_id: PlayerId,
    pub seat: u8,
    pub session_token: String,
}

/// Session record for reconnection. A disconnected seat can be reclaimed
/// with its token until the reconnect grace period lapses.
struct DisconnectedSession {
    room_code: String,
    player_id: PlayerId,
    disconnected_at: Instant,
}

/// Counts from one janitor sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_sessions: usize,
    pub closed_rooms: usize,
}

/// Registry of live rooms.
pub struct RoomManager {
    rooms: HashMap<String, SharedRoom>,
    next_player_id: PlayerId,
    /// Maps session_token → disconnected session info.
    sessions: HashMap<String, DisconnectedSession>,
    settings: RoomsConfig,
}

/// A room plus its live connections.
pub struct RoomEntry {
    room: Room,
    connections: HashMap<PlayerId, PlayerSender>,
    /// Maps player_id → session_token for connected players.
    player_sessions: HashMap<PlayerId, String>,
    last_activity: Instant,
    /// When the last connection left; `None` while anyone is connected or
    /// if nobody ever joined.
    emptied_at: Option<Instant>,
}

impl RoomManager {
    pub fn new(settings: RoomsConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            next_player_id: 1,
            sessions: HashMap::new(),
            settings,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    fn generate_session_token() -> String {
        Uuid::new_v4().to_string()
    }

    fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.settings.reconnect_grace_secs)
    }

    /// Generate a room code not already in use.
    fn unique_room_code(&self) -> String {
        loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    fn build_board(&self, variant: Variant) -> Board {
        match variant {
            Variant::Squares => {
                let s = &self.settings.squares;
                Board::Grid(GridBoard::new(s.rows, s.cols))
            },
            Variant::Triangles => {
                let t = &self.settings.triangles;
                Board::Points(PointBoard::generate(
                    &mut rand::rng(),
                    t.point_count,
                    t.canvas_width,
                    t.canvas_height,
                    t.margin,
                ))
            },
        }
    }

    fn insert_room(&mut self, code: String, variant: Option<Variant>) -> SharedRoom {
        let variant = variant.unwrap_or(self.settings.default_variant);
        let config = RoomConfig {
            max_players: self.settings.max_players(variant),
        };
        let room = Room::new(code.clone(), self.build_board(variant), config);
        let shared = Arc::new(Mutex::new(RoomEntry {
            room,
            connections: HashMap::new(),
            player_sessions: HashMap::new(),
            last_activity: Instant::now(),
            emptied_at: None,
        }));
        tracing::info!(room = %code, %variant, "Room created");
        self.rooms.insert(code, Arc::clone(&shared));
        shared
    }

    /// Create an empty room with a fresh code. Returns the code and variant.
    pub fn create_room(&mut self, variant: Option<Variant>) -> (String, Variant) {
        let code = self.unique_room_code();
        let shared = self.insert_room(code.clone(), variant);
        let variant = lock_room(&shared).room.variant();
        (code, variant)
    }

    /// Seat a player. An empty code creates a fresh room; a well-formed
    /// unknown code creates that room.
    pub fn join_room(
        &mut self,
        request: JoinRequest,
        sender: PlayerSender,
    ) -> Result<JoinTicket, JoinError> {
        let display_name = sanitize_name(&request.player_name).ok_or(JoinError::InvalidName)?;
        let symbol = sanitize_symbol(&request.symbol).ok_or(JoinError::InvalidSymbol)?;

        let shared = if request.room_code.is_empty() {
            let code = self.unique_room_code();
            self.insert_room(code, request.variant)
        } else if !is_valid_room_code(&request.room_code) {
            return Err(JoinError::InvalidRoomCode);
        } else if let Some(existing) = self.rooms.get(&request.room_code) {
            Arc::clone(existing)
        } else {
            self.insert_room(request.room_code.clone(), request.variant)
        };

        let player_id = self.alloc_player_id();
        let session_token = Self::generate_session_token();

        let mut entry = lock_room(&shared);
        let seat = entry.room.join(PlayerInfo {
            id: player_id,
            display_name,
            symbol,
            color: request.color,
        })?;
        entry.connections.insert(player_id, sender);
        entry
            .player_sessions
            .insert(player_id, session_token.clone());
        entry.emptied_at = None;
        entry.touch();
        entry.announce(player_id);

        let room_code = entry.room.code().to_string();
        tracing::info!(player_id, room = %room_code, seat, "Player joined");
        Ok(JoinTicket {
            room_code,
            player_id,
            seat,
            session_token,
        })
    }

    /// Reclaim a disconnected seat with its session token. Issues a fresh
    /// token; the old one is spent either way.
    pub fn reconnect(
        &mut self,
        session_token: &str,
        sender: PlayerSender,
    ) -> Result<JoinTicket, JoinError> {
        let session = self
            .sessions
            .remove(session_token)
            .ok_or(JoinError::InvalidSession)?;

        if session.disconnected_at.elapsed() > self.reconnect_grace() {
            return Err(JoinError::SessionExpired);
        }

        let shared = self
            .rooms
            .get(&session.room_code)
            .cloned()
            .ok_or(JoinError::Room(RoomError::UnknownRoom))?;
        let mut entry = lock_room(&shared);

        if !entry.room.reactivate(session.player_id) {
            return Err(JoinError::Room(RoomError::RoomClosed));
        }
        let seat = entry
            .room
            .player(session.player_id)
            .map(|p| p.seat)
            .ok_or(JoinError::InvalidSession)?;

        let new_token = Self::generate_session_token();
        entry.connections.insert(session.player_id, sender);
        entry
            .player_sessions
            .insert(session.player_id, new_token.clone());
        entry.emptied_at = None;
        entry.touch();
        entry.announce(session.player_id);

        tracing::info!(
            player_id = session.player_id,
            room = %session.room_code,
            "Player reconnected via session"
        );
        Ok(JoinTicket {
            room_code: session.room_code,
            player_id: session.player_id,
            seat,
            session_token: new_token,
        })
    }

    /// Drop a player's connection. The seat goes inactive and stays
    /// reclaimable for the grace period. Returns true if the room was
    /// destroyed (no grace configured and nobody left).
    pub fn leave_room(&mut self, room_code: &str, player_id: PlayerId) -> bool {
        let Some(shared) = self.rooms.get(room_code).cloned() else {
            return false;
        };
        let mut entry = lock_room(&shared);
        if entry.connections.remove(&player_id).is_none() {
            return false;
        }
        entry.room.deactivate(player_id);
        let token = entry.player_sessions.remove(&player_id);
        entry.touch();

        let grace = self.reconnect_grace();
        if entry.connections.is_empty() {
            if grace.is_zero() {
                entry.room.close();
                drop(entry);
                self.remove_room(room_code);
                return true;
            }
            entry.emptied_at = Some(Instant::now());
        }

        if !grace.is_zero()
            && let Some(token) = token
        {
            self.sessions.insert(
                token,
                DisconnectedSession {
                    room_code: room_code.to_string(),
                    player_id,
                    disconnected_at: Instant::now(),
                },
            );
        }
        entry.broadcast_state();
        false
    }

    fn remove_room(&mut self, room_code: &str) {
        self.rooms.remove(room_code);
        self.sessions.retain(|_, s| s.room_code != room_code);
        tracing::info!(room = room_code, "Room destroyed");
    }

    /// Expire stale sessions and close rooms that are abandoned past the
    /// grace period or idle past the idle timeout.
    pub fn cleanup(&mut self) -> CleanupReport {
        let grace = self.reconnect_grace();
        let idle_timeout = Duration::from_secs(self.settings.idle_timeout_secs);

        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.disconnected_at.elapsed() <= grace);
        let expired_sessions = before - self.sessions.len();

        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, shared)| {
                let entry = lock_room(shared);
                let abandoned = entry.connections.is_empty()
                    && entry.emptied_at.is_some_and(|t| t.elapsed() >= grace);
                abandoned || entry.last_activity.elapsed() >= idle_timeout
            })
            .map(|(code, _)| code.clone())
            .collect();

        for code in &stale {
            if let Some(shared) = self.rooms.get(code) {
                let mut entry = lock_room(shared);
                entry.room.close();
                // Anyone still attached learns the room is gone.
                entry.broadcast_state();
                entry.connections.clear();
            }
            self.remove_room(code);
        }

        CleanupReport {
            expired_sessions,
            closed_rooms: stale.len(),
        }
    }

    pub fn room(&self, room_code: &str) -> Option<SharedRoom> {
        self.rooms.get(room_code).cloned()
    }

    #[cfg(test)]
    fn snapshot(&self, room_code: &str) -> Option<edgewise_core::room::RoomSnapshot> {
        self.rooms
            .get(room_code)
            .map(|shared| lock_room(shared).room.snapshot())
    }

    /// (live rooms, connected players)
    pub fn stats(&self) -> (usize, usize) {
        let players = self
            .rooms
            .values()
            .map(|shared| lock_room(shared).connections.len())
            .sum();
        (self.rooms.len(), players)
    }

    /// Build a JoinRoomResponse success message.
    pub fn make_join_response(ticket: &JoinTicket) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinRoomResponse(JoinRoomResponseMsg {
            success: true,
            player_id: Some(ticket.player_id),
            seat: Some(ticket.seat),
            room_code: Some(ticket.room_code.clone()),
            session_token: Some(ticket.session_token.clone()),
            error: None,
            reason: None,
        });
        encode_server_message(&msg)
    }

    /// Build a JoinRoomResponse error message.
    pub fn make_join_error(
        error: &str,
        reason: Option<RoomError>,
        room_code: Option<&str>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinRoomResponse(JoinRoomResponseMsg {
            success: false,
            player_id: None,
            seat: None,
            room_code: room_code.map(str::to_string),
            session_token: None,
            error: Some(error.to_string()),
            reason,
        });
        encode_server_message(&msg)
    }

    #[cfg(test)]
    fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }
}

impl RoomEntry {
    pub fn room(&self) -> &Room {
        &self.room
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Run a move through the room. Accepted moves are broadcast to every
    /// member; rejections go back to the proposer only.
    pub fn apply_move(
        &mut self,
        player_id: PlayerId,
        start: Vertex,
        end: Vertex,
    ) -> Result<MoveOutcome, RoomError> {
        match self.room.propose_move(player_id, start, end) {
            Ok(outcome) => {
                self.touch();
                if !outcome.shapes.is_empty() {
                    tracing::debug!(
                        player_id,
                        room = self.room.code(),
                        shapes = outcome.shapes.len(),
                        "Shapes claimed"
                    );
                }
                self.broadcast_state();
                Ok(outcome)
            },
            Err(reason) => {
                tracing::debug!(
                    player_id,
                    room = self.room.code(),
                    error = %reason,
                    "Move rejected"
                );
                self.reject_move(player_id, reason, start, end);
                Err(reason)
            },
        }
    }

    /// Tell one player their move was refused.
    pub fn reject_move(&self, player_id: PlayerId, reason: RoomError, start: Vertex, end: Vertex) {
        let msg = ServerMessage::MoveRejected(MoveRejectedMsg { reason, start, end });
        match encode_server_message(&msg) {
            Ok(data) => self.send_to_player(player_id, Bytes::from(data)),
            Err(e) => tracing::warn!(error = %e, "Failed to encode MoveRejected"),
        }
    }

    /// Send the full snapshot to every connected member.
    pub fn broadcast_state(&self) {
        if let Some(data) = self.encode_snapshot(false) {
            self.broadcast_except(None, &data);
        }
    }

    /// `RoomInit` to a new arrival, `RoomState` to everyone else.
    fn announce(&self, joiner: PlayerId) {
        if let Some(init) = self.encode_snapshot(true) {
            self.send_to_player(joiner, init);
        }
        if let Some(state) = self.encode_snapshot(false) {
            self.broadcast_except(Some(joiner), &state);
        }
    }

    fn encode_snapshot(&self, init: bool) -> Option<Bytes> {
        let payload = Box::new(RoomStateMsg {
            snapshot: self.room.snapshot(),
        });
        let msg = if init {
            ServerMessage::RoomInit(payload)
        } else {
            ServerMessage::RoomState(payload)
        };
        match encode_server_message(&msg) {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                tracing::warn!(room = self.room.code(), error = %e, "Failed to encode snapshot");
                None
            },
        }
    }

    /// Send a raw binary message to a specific player.
    pub fn send_to_player(&self, player_id: PlayerId, data: Bytes) {
        if let Some(sender) = self.connections.get(&player_id)
            && let Err(e) = sender.try_send(data)
        {
            tracing::debug!(
                player_id, room = self.room.code(), error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    fn broadcast_except(&self, exclude: Option<PlayerId>, data: &Bytes) {
        for (&pid, sender) in &self.connections {
            if Some(pid) != exclude
                && let Err(e) = sender.try_send(data.clone())
            {
                tracing::debug!(
                    player_id = pid, room = self.room.code(), error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }
}
