use serde::{Deserialize, Serialize};

/// Unique identifier for a connected player. Stable for the lifetime of a
/// seat, including across session reconnects.
pub type PlayerId = u64;

/// Maximum display name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum symbol length in characters.
pub const MAX_SYMBOL_CHARS: usize = 3;

/// A seated player in an Edgewise room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// Short glyph drawn inside shapes this player closes.
    pub symbol: String,
    pub color: PlayerColor,
    /// Fixed ordinal position used for turn rotation.
    pub seat: u8,
    /// False while the player's connection is gone. Inactive seats are
    /// skipped by turn rotation but keep their position.
    pub is_active: bool,
}

/// Player color used for their edges and shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// Predefined palette colors for player selection.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 255,
            g: 111,
            b: 145,
        }, // Pink
        PlayerColor {
            r: 78,
            g: 205,
            b: 196,
        }, // Teal
        PlayerColor {
            r: 255,
            g: 195,
            b: 18,
        }, // Yellow
        PlayerColor {
            r: 130,
            g: 88,
            b: 255,
        }, // Purple
        PlayerColor {
            r: 46,
            g: 213,
            b: 115,
        }, // Green
        PlayerColor {
            r: 83,
            g: 152,
            b: 255,
        }, // Blue
    ];
}

impl std::fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Trim and validate a display name. Returns `None` if empty, too long, or
/// containing control characters.
pub fn sanitize_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(name.to_string())
}

/// Trim and validate a shape symbol (1 to [`MAX_SYMBOL_CHARS`] visible chars).
pub fn sanitize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    let count = symbol.chars().count();
    if count == 0 || count > MAX_SYMBOL_CHARS || symbol.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(symbol.to_string())
}
