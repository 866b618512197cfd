use serde::{Deserialize, Serialize};

/// Why a room refused a join or a move. Every variant is a local rejection:
/// the room's shared state is untouched when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomError {
    /// The proposer is not the seat whose turn it is.
    OutOfTurn,
    /// The vertex pair is not an edge of this board.
    IllegalEdge,
    /// The vertex pair has already been drawn.
    DuplicateEdge,
    /// The connecting identity already holds a seat.
    DuplicatePlayer,
    /// Every seat is taken.
    RoomFull,
    /// No room with that code exists.
    UnknownRoom,
    /// The room has shut down and accepts nothing further.
    RoomClosed,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfTurn => write!(f, "not your turn"),
            Self::IllegalEdge => write!(f, "illegal edge for this board"),
            Self::DuplicateEdge => write!(f, "edge already drawn"),
            Self::DuplicatePlayer => write!(f, "player already holds a seat"),
            Self::RoomFull => write!(f, "room is full"),
            Self::UnknownRoom => write!(f, "room not found"),
            Self::RoomClosed => write!(f, "room is closed"),
        }
    }
}

impl std::error::Error for RoomError {}
