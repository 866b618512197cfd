use serde::{Deserialize, Serialize};

use crate::board::{Variant, Vertex};
use crate::error::RoomError;
use crate::player::{PlayerColor, PlayerId};
use crate::room::RoomSnapshot;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    JoinRoom = 0x01,
    MakeMove = 0x02,
    LeaveRoom = 0x03,

    // Server -> Client
    JoinRoomResponse = 0x10,
    RoomInit = 0x11,
    RoomState = 0x12,
    MoveRejected = 0x13,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::JoinRoom),
            0x02 => Some(Self::MakeMove),
            0x03 => Some(Self::LeaveRoom),
            0x10 => Some(Self::JoinRoomResponse),
            0x11 => Some(Self::RoomInit),
            0x12 => Some(Self::RoomState),
            0x13 => Some(Self::MoveRejected),
            _ => None,
        }
    }

    /// Types only the server may send. A client frame carrying one is dropped.
    pub fn is_server_only(self) -> bool {
        matches!(
            self,
            Self::JoinRoomResponse | Self::RoomInit | Self::RoomState | Self::MoveRejected
        )
    }
}

// --- Client -> Server ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    /// Empty to have the server pick a fresh room.
    pub room_code: String,
    pub player_name: String,
    pub symbol: String,
    pub color: PlayerColor,
    /// Board family to use if this join creates the room.
    pub variant: Option<Variant>,
    pub protocol_version: u8,
    /// Token from an earlier `JoinRoomResponse`, to reclaim a seat.
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeMoveMsg {
    pub room_code: String,
    pub start: Vertex,
    pub end: Vertex,
    pub player_id: PlayerId,
    /// Informational; the server draws with the seat's own symbol and color.
    pub symbol: String,
    pub color: PlayerColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {
    pub player_id: PlayerId,
}

// --- Server -> Client ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomResponseMsg {
    pub success: bool,
    pub player_id: Option<PlayerId>,
    pub seat: Option<u8>,
    pub room_code: Option<String>,
    pub session_token: Option<String>,
    pub error: Option<String>,
    pub reason: Option<RoomError>,
}

/// Wholesale room state. Sent as `RoomInit` to a new joiner and as
/// `RoomState` to every member after each change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStateMsg {
    pub snapshot: RoomSnapshot,
}

/// Sent only to the proposer of a rejected move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRejectedMsg {
    pub reason: RoomError,
    pub start: Vertex,
    pub end: Vertex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinRoom(JoinRoomMsg),
    MakeMove(MakeMoveMsg),
    LeaveRoom(LeaveRoomMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::MakeMove(_) => MessageType::MakeMove,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinRoomResponse(JoinRoomResponseMsg),
    RoomInit(Box<RoomStateMsg>),
    RoomState(Box<RoomStateMsg>),
    MoveRejected(MoveRejectedMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinRoomResponse(_) => MessageType::JoinRoomResponse,
            Self::RoomInit(_) => MessageType::RoomInit,
            Self::RoomState(_) => MessageType::RoomState,
            Self::MoveRejected(_) => MessageType::MoveRejected,
        }
    }
}
