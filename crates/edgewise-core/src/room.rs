//! The authoritative per-room state machine.
//!
//! A [`Room`] owns the board, the seated players, and the append-only edge
//! and shape logs. [`Room::propose_move`] is the single accept path: it
//! validates everything first and only then commits, so a rejected move
//! leaves no trace.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{Board, EdgeKey, Variant, Vertex};
use crate::detect::{EdgeIndex, ShapeKey, on_edge_added};
use crate::error::RoomError;
use crate::player::{MAX_NAME_LEN, MAX_SYMBOL_CHARS, Player, PlayerColor, PlayerId};

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random room code like `k3x9qa`.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Validate the room code format (6 lowercase alphanumerics).
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

/// Per-room limits fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub max_players: u8,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { max_players: 4 }
    }
}

/// Lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    /// Accepting joins, no move accepted yet.
    Forming,
    /// At least one move accepted.
    Active,
    /// Every member is gone; the room rejects all further input.
    Closed,
}

/// An accepted edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: Vertex,
    pub b: Vertex,
    pub owner: PlayerId,
    pub symbol: String,
    pub color: PlayerColor,
    /// Position in the room's edge log.
    pub seq: u32,
}

impl Edge {
    pub fn key(&self) -> Option<EdgeKey> {
        EdgeKey::new(self.a, self.b)
    }
}

/// A claimed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Corner vertices in ascending order.
    pub vertices: Vec<Vertex>,
    pub owner: PlayerId,
    pub symbol: String,
    pub color: PlayerColor,
    /// Sequence number of the edge that closed it.
    pub seq: u32,
}

/// What a player brings to a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub display_name: String,
    pub symbol: String,
    pub color: PlayerColor,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub edge: Edge,
    /// Shapes closed by this edge, in canonical order. Usually empty.
    pub shapes: Vec<Shape>,
}

/// Shapes claimed per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub player_id: PlayerId,
    pub shapes: u32,
}

/// Full authoritative state as broadcast to every member. Clients replace
/// their mirror with this wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_code: String,
    pub variant: Variant,
    /// Grid dimensions or the point list.
    pub board: Board,
    pub moves: Vec<Edge>,
    pub shapes: Vec<Shape>,
    pub turn_index: u64,
    pub current_player: Option<PlayerId>,
    pub players: Vec<Player>,
    pub phase: RoomPhase,
    /// Bumped on every state change; lets clients drop stale snapshots.
    pub revision: u64,
}

#[derive(Debug, Clone)]
pub struct Room {
    code: String,
    config: RoomConfig,
    board: Board,
    players: Vec<Player>,
    edges: Vec<Edge>,
    shapes: Vec<Shape>,
    claimed: HashSet<ShapeKey>,
    index: EdgeIndex,
    turn_index: u64,
    phase: RoomPhase,
    revision: u64,
}

impl Room {
    pub fn new(code: String, board: Board, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            board,
            players: Vec::new(),
            edges: Vec::new(),
            shapes: Vec::new(),
            claimed: HashSet::new(),
            index: EdgeIndex::new(),
            turn_index: 0,
            phase: RoomPhase::Forming,
            revision: 0,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn variant(&self) -> Variant {
        self.board.variant()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn turn_index(&self) -> u64 {
        self.turn_index
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active).count()
    }

    /// The player expected to move next: `turn_index mod active_count`
    /// taken over the active seats in seat order.
    pub fn current_player(&self) -> Option<&Player> {
        let active = self.active_player_count();
        if active == 0 {
            return None;
        }
        let slot = (self.turn_index % active as u64) as usize;
        self.players.iter().filter(|p| p.is_active).nth(slot)
    }

    /// True once every legal edge has been drawn.
    pub fn is_board_full(&self) -> bool {
        self.edges.len() >= self.board.legal_edge_count()
    }

    /// Seat a new player. Returns the seat index.
    pub fn join(&mut self, info: PlayerInfo) -> Result<u8, RoomError> {
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomClosed);
        }
        if self.player(info.id).is_some() {
            return Err(RoomError::DuplicatePlayer);
        }
        if self.players.len() >= self.config.max_players as usize {
            return Err(RoomError::RoomFull);
        }

        let seat = self.players.len() as u8;
        self.players.push(Player {
            id: info.id,
            display_name: info.display_name,
            symbol: info.symbol,
            color: info.color,
            seat,
            is_active: true,
        });
        self.revision += 1;
        Ok(seat)
    }

    /// Validate and, if valid, commit a move from `player_id` joining `u`
    /// and `v`. Checks run in order: turn, legality, duplicate.
    pub fn propose_move(
        &mut self,
        player_id: PlayerId,
        u: Vertex,
        v: Vertex,
    ) -> Result<MoveOutcome, RoomError> {
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomClosed);
        }
        let mover = self
            .current_player()
            .filter(|p| p.id == player_id)
            .ok_or(RoomError::OutOfTurn)?;
        let (symbol, color) = (mover.symbol.clone(), mover.color);

        if !self.board.is_legal_edge(u, v) {
            return Err(RoomError::IllegalEdge);
        }
        let key = EdgeKey::new(u, v).ok_or(RoomError::IllegalEdge)?;
        if self.index.contains(&key) {
            return Err(RoomError::DuplicateEdge);
        }

        // Commit.
        let seq = self.edges.len() as u32;
        let edge = Edge {
            a: key.low(),
            b: key.high(),
            owner: player_id,
            symbol: symbol.clone(),
            color,
            seq,
        };
        self.index.insert(key);
        self.edges.push(edge.clone());

        let closed = on_edge_added(&self.board, &self.index, key, &self.claimed);
        let mut shapes = Vec::with_capacity(closed.len());
        for shape_key in closed {
            debug_assert_eq!(shape_key.vertices().len(), self.variant().shape_size());
            self.claimed.insert(shape_key.clone());
            let shape = Shape {
                vertices: shape_key.into_vertices(),
                owner: player_id,
                symbol: symbol.clone(),
                color,
                seq,
            };
            self.shapes.push(shape.clone());
            shapes.push(shape);
        }

        // The turn always passes, closure or not.
        self.turn_index += 1;
        if self.phase == RoomPhase::Forming {
            self.phase = RoomPhase::Active;
            tracing::debug!(room = %self.code, "Room active");
        }
        self.revision += 1;

        Ok(MoveOutcome { edge, shapes })
    }

    /// Mark a seat inactive (connection lost). The seat keeps its position.
    /// Returns false if the player is unknown or already inactive.
    pub fn deactivate(&mut self, player_id: PlayerId) -> bool {
        self.set_active(player_id, false)
    }

    /// Re-activate a seat after a session reconnect.
    pub fn reactivate(&mut self, player_id: PlayerId) -> bool {
        if self.phase == RoomPhase::Closed {
            return false;
        }
        self.set_active(player_id, true)
    }

    fn set_active(&mut self, player_id: PlayerId, active: bool) -> bool {
        match self.players.iter_mut().find(|p| p.id == player_id) {
            Some(p) if p.is_active != active => {
                p.is_active = active;
                self.revision += 1;
                true
            },
            _ => false,
        }
    }

    /// Shut the room. Every seat goes inactive and all input is refused.
    pub fn close(&mut self) {
        if self.phase == RoomPhase::Closed {
            return;
        }
        for p in &mut self.players {
            p.is_active = false;
        }
        self.phase = RoomPhase::Closed;
        self.revision += 1;
    }

    /// Shapes claimed by each seated player, in seat order.
    pub fn scores(&self) -> Vec<PlayerScore> {
        self.players
            .iter()
            .map(|p| PlayerScore {
                player_id: p.id,
                shapes: self.shapes.iter().filter(|s| s.owner == p.id).count() as u32,
            })
            .collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            variant: self.variant(),
            board: self.board.clone(),
            moves: self.edges.clone(),
            shapes: self.shapes.clone(),
            turn_index: self.turn_index,
            current_player: self.current_player().map(|p| p.id),
            players: self.players.clone(),
            phase: self.phase,
            revision: self.revision,
        }
    }
}

/// Snapshot of `board` played to the end by `max_players` seats whose names
/// and symbols are as long as sanitizing allows. No room on this board can
/// produce a larger one.
pub fn largest_snapshot(board: Board, max_players: u8) -> RoomSnapshot {
    let edges = board.legal_edges();
    let mut room = Room::new(
        "z".repeat(ROOM_CODE_LEN),
        board,
        RoomConfig { max_players },
    );
    for seat in 0..max_players {
        let joined = room.join(PlayerInfo {
            id: PlayerId::MAX - PlayerId::from(seat),
            display_name: "W".repeat(MAX_NAME_LEN),
            symbol: "\u{1F600}".repeat(MAX_SYMBOL_CHARS),
            color: PlayerColor::default(),
        });
        if joined.is_err() {
            break;
        }
    }
    for key in edges {
        let Some(mover) = room.current_player().map(|p| p.id) else {
            break;
        };
        if room.propose_move(mover, key.low(), key.high()).is_err() {
            break;
        }
    }
    room.snapshot()
}
