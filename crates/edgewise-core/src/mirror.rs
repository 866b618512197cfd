//! Client-side copy of a room's state.
//!
//! The server is the only authority. A client never applies its own moves
//! locally; it replaces its [`Mirror`] with each snapshot the server sends.
//! Snapshots carry a per-room revision, so a duplicated or reordered
//! `RoomState` broadcast is ignored instead of rolling the view back.

use crate::board::{EdgeKey, Vertex};
use crate::net::messages::ServerMessage;
use crate::player::PlayerId;
use crate::room::RoomSnapshot;

#[derive(Debug, Clone, Default)]
pub struct Mirror {
    player_id: Option<PlayerId>,
    session_token: Option<String>,
    snapshot: Option<RoomSnapshot>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.snapshot.as_ref()
    }

    /// Replace the held state if `snapshot` is for a different room or is
    /// newer than what we have. Returns true if it was applied.
    pub fn apply(&mut self, snapshot: RoomSnapshot) -> bool {
        let newer = match &self.snapshot {
            Some(held) => {
                held.room_code != snapshot.room_code || snapshot.revision > held.revision
            },
            None => true,
        };
        if newer {
            self.snapshot = Some(snapshot);
        }
        newer
    }

    /// Feed a decoded server message. Returns true if the visible state
    /// changed.
    pub fn apply_message(&mut self, msg: ServerMessage) -> bool {
        match msg {
            ServerMessage::JoinRoomResponse(resp) => {
                if resp.success {
                    self.player_id = resp.player_id;
                    self.session_token = resp.session_token;
                }
                false
            },
            // Init always replaces: it marks a fresh (re)join.
            ServerMessage::RoomInit(init) => {
                self.snapshot = Some(init.snapshot);
                true
            },
            ServerMessage::RoomState(state) => self.apply(state.snapshot),
            ServerMessage::MoveRejected(_) => false,
        }
    }

    pub fn contains_edge(&self, u: Vertex, v: Vertex) -> bool {
        let (Some(snap), Some(key)) = (&self.snapshot, EdgeKey::new(u, v)) else {
            return false;
        };
        snap.moves.iter().any(|e| e.key() == Some(key))
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.snapshot, self.player_id) {
            (Some(snap), Some(me)) => snap.current_player == Some(me),
            _ => false,
        }
    }
}
