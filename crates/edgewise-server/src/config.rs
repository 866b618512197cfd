use serde::Deserialize;

use edgewise_core::board::{Board, GridBoard, Point, PointBoard, Variant};
use edgewise_core::net::messages::{RoomStateMsg, ServerMessage};
use edgewise_core::net::protocol::{MAX_MESSAGE_SIZE, encode_server_message};
use edgewise_core::room::largest_snapshot;

/// Upper bound on triangle points, checked before any snapshot is sized.
pub const MAX_POINT_COUNT: u16 = 64;

/// Upper bound on squares grid vertices, checked before any snapshot is sized.
pub const MAX_GRID_VERTICES: usize = 4096;

/// Room state must fit in a frame with this many bytes to spare, since
/// revision and turn counters keep growing after the board fills.
const SNAPSHOT_HEADROOM: usize = 64;

/// Top-level server configuration, loaded from `edgewise.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    /// Room-creation endpoint: max burst tokens per IP.
    pub api_rate_limit_burst: usize,
    /// Room-creation endpoint: token refill rate (requests per second) per IP.
    pub api_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_ws_per_ip: 10,
            ws_rate_limit_per_sec: 20.0,
            player_message_buffer: 64,
            api_rate_limit_burst: 10,
            api_rate_limit_per_sec: 1.0,
        }
    }
}

/// Squares board settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SquaresConfig {
    /// Vertex rows.
    pub rows: u16,
    /// Vertex columns.
    pub cols: u16,
    pub max_players: u8,
}

impl Default for SquaresConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            max_players: 4,
        }
    }
}

/// Triangles board settings. Points are scattered uniformly inside the
/// canvas with `margin` kept clear on every side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrianglesConfig {
    pub point_count: u16,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub margin: f32,
    pub max_players: u8,
}

impl Default for TrianglesConfig {
    fn default() -> Self {
        Self {
            point_count: 18,
            canvas_width: 700.0,
            canvas_height: 650.0,
            margin: 40.0,
            max_players: 4,
        }
    }
}

/// Room creation and lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub default_variant: Variant,
    pub squares: SquaresConfig,
    pub triangles: TrianglesConfig,
    /// How long a disconnected seat can be reclaimed. 0 destroys a room as
    /// soon as its last member leaves.
    pub reconnect_grace_secs: u64,
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_variant: Variant::Squares,
            squares: SquaresConfig::default(),
            triangles: TrianglesConfig::default(),
            reconnect_grace_secs: 60,
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

impl RoomsConfig {
    pub fn max_players(&self, variant: Variant) -> u8 {
        match variant {
            Variant::Squares => self.squares.max_players,
            Variant::Triangles => self.triangles.max_players,
        }
    }
}

impl ServerConfig {
    /// First configuration problem found, if any.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }

        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".into());
        }
        if self.limits.max_ws_per_ip == 0 {
            return Err("limits.max_ws_per_ip must be > 0".into());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".into());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".into());
        }
        if self.limits.api_rate_limit_burst == 0 {
            return Err("limits.api_rate_limit_burst must be > 0".into());
        }

        let squares = &self.rooms.squares;
        if squares.rows < 2 || squares.cols < 2 {
            return Err("rooms.squares needs at least 2 rows and 2 cols".into());
        }
        if squares.max_players == 0 {
            return Err("rooms.squares.max_players must be > 0".into());
        }
        let triangles = &self.rooms.triangles;
        if triangles.point_count < 3 {
            return Err("rooms.triangles.point_count must be >= 3".into());
        }
        if triangles.max_players == 0 {
            return Err("rooms.triangles.max_players must be > 0".into());
        }
        if !(triangles.canvas_width > 0.0 && triangles.canvas_height > 0.0)
            || triangles.margin < 0.0
        {
            return Err("rooms.triangles canvas must be positive with a non-negative margin".into());
        }

        if squares.rows as usize * squares.cols as usize > MAX_GRID_VERTICES {
            return Err(format!(
                "rooms.squares grid must have at most {MAX_GRID_VERTICES} vertices"
            ));
        }
        if triangles.point_count > MAX_POINT_COUNT {
            return Err(format!(
                "rooms.triangles.point_count must be <= {MAX_POINT_COUNT}"
            ));
        }
        self.check_snapshot_fits(Variant::Squares)?;
        self.check_snapshot_fits(Variant::Triangles)?;

        if self.rooms.idle_timeout_secs == 0 {
            return Err("rooms.idle_timeout_secs must be > 0".into());
        }
        if self.rooms.idle_check_interval_secs == 0 {
            return Err("rooms.idle_check_interval_secs must be > 0".into());
        }
        Ok(())
    }

    /// Every broadcast carries the whole room, so a full board with every
    /// seat taken must still encode into one frame.
    fn check_snapshot_fits(&self, variant: Variant) -> Result<(), String> {
        let (board, setting) = match variant {
            Variant::Squares => {
                let s = &self.rooms.squares;
                (
                    Board::Grid(GridBoard::new(s.rows, s.cols)),
                    "rooms.squares rows/cols",
                )
            },
            Variant::Triangles => {
                let t = &self.rooms.triangles;
                let corner = Point::new(t.canvas_width, t.canvas_height);
                (
                    Board::Points(PointBoard::from_points(vec![
                        corner;
                        t.point_count as usize
                    ])),
                    "rooms.triangles.point_count",
                )
            },
        };
        let seats = self.rooms.max_players(variant);
        let snapshot = largest_snapshot(board, seats);
        let msg = ServerMessage::RoomState(Box::new(RoomStateMsg { snapshot }));
        match encode_server_message(&msg) {
            Ok(data) if data.len() + SNAPSHOT_HEADROOM <= MAX_MESSAGE_SIZE => Ok(()),
            Ok(data) => Err(format!(
                "{setting} too large with {seats} seats: a full {variant} board needs {} of {MAX_MESSAGE_SIZE} bytes",
                data.len() + SNAPSHOT_HEADROOM
            )),
            Err(e) => Err(format!(
                "{setting} too large with {seats} seats: a full {variant} board fails to encode ({e})"
            )),
        }
    }

    /// Validate configuration, exiting on the first error.
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }

        let t = &self.rooms.triangles;
        if t.canvas_width <= 2.0 * t.margin || t.canvas_height <= 2.0 * t.margin {
            tracing::warn!(
                width = t.canvas_width,
                height = t.canvas_height,
                margin = t.margin,
                "Triangle canvas leaves no room inside the margin; points will overlap"
            );
        }
    }

    /// Load config from `edgewise.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("edgewise.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from edgewise.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse edgewise.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No edgewise.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("EDGEWISE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = var("EDGEWISE_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(val) = var("EDGEWISE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = var("EDGEWISE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Some(val) = var("EDGEWISE_DEFAULT_VARIANT") {
            match Variant::from_str_opt(&val) {
                Some(v) => self.rooms.default_variant = v,
                None => tracing::warn!(value = %val, "Ignoring unknown EDGEWISE_DEFAULT_VARIANT"),
            }
        }
        if let Some(val) = var("EDGEWISE_MAX_PLAYERS")
            && let Ok(n) = val.parse::<u8>()
        {
            self.rooms.squares.max_players = n;
            self.rooms.triangles.max_players = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.web_root, "web");
        assert_eq!(cfg.rooms.default_variant, Variant::Squares);
        assert_eq!((cfg.rooms.squares.rows, cfg.rooms.squares.cols), (4, 4));
        assert_eq!(cfg.rooms.triangles.point_count, 18);
        assert_eq!(cfg.rooms.reconnect_grace_secs, 60);
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
web_root = "/var/www"

[limits]
max_ws_connections = 500
ws_rate_limit_per_sec = 5.0

[rooms]
default_variant = "triangles"
reconnect_grace_secs = 0

[rooms.squares]
rows = 6
cols = 5

[rooms.triangles]
point_count = 12
max_players = 3
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.web_root, "/var/www");
        assert_eq!(cfg.limits.max_ws_connections, 500);
        assert_eq!(cfg.limits.max_ws_per_ip, 10);
        assert!((cfg.limits.ws_rate_limit_per_sec - 5.0).abs() < f64::EPSILON);
        assert_eq!(cfg.rooms.default_variant, Variant::Triangles);
        assert_eq!(cfg.rooms.reconnect_grace_secs, 0);
        assert_eq!((cfg.rooms.squares.rows, cfg.rooms.squares.cols), (6, 5));
        assert_eq!(cfg.rooms.squares.max_players, 4);
        assert_eq!(cfg.rooms.triangles.point_count, 12);
        assert_eq!(cfg.rooms.max_players(Variant::Triangles), 3);
        assert!((cfg.rooms.triangles.canvas_width - 700.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: ServerConfig = toml::from_str(r#"listen_addr = "0.0.0.0:8080""#).unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 200);
        assert_eq!(cfg.rooms.idle_timeout_secs, 3600);
    }

    #[test]
    fn check_rejects_bad_values() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(cfg.check().is_err());

        let mut cfg = ServerConfig::default();
        cfg.rooms.squares.rows = 1;
        assert!(cfg.check().unwrap_err().contains("squares"));

        let mut cfg = ServerConfig::default();
        cfg.rooms.triangles.point_count = 2;
        assert!(cfg.check().unwrap_err().contains("point_count"));

        let mut cfg = ServerConfig::default();
        cfg.limits.ws_rate_limit_per_sec = 0.0;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn check_rejects_boards_whose_full_state_overflows_a_frame() {
        let mut cfg = ServerConfig::default();
        cfg.rooms.triangles.point_count = 30;
        assert!(cfg.check().unwrap_err().contains("point_count"));

        let mut cfg = ServerConfig::default();
        cfg.rooms.triangles.point_count = MAX_POINT_COUNT + 1;
        assert!(cfg.check().unwrap_err().contains("point_count"));

        let mut cfg = ServerConfig::default();
        cfg.rooms.squares.rows = 40;
        cfg.rooms.squares.cols = 40;
        assert!(cfg.check().unwrap_err().contains("squares"));

        let mut cfg = ServerConfig::default();
        cfg.rooms.squares.rows = 200;
        cfg.rooms.squares.cols = 200;
        assert!(cfg.check().unwrap_err().contains("squares"));

        let mut cfg = ServerConfig::default();
        cfg.rooms.triangles.max_players = u8::MAX;
        assert!(cfg.check().unwrap_err().contains("triangles"));
    }

    #[test]
    fn largest_accepted_boards_encode_when_full() {
        let mut cfg = ServerConfig::default();
        let mut largest = cfg.rooms.triangles.point_count;
        while largest < MAX_POINT_COUNT {
            cfg.rooms.triangles.point_count = largest + 1;
            if cfg.check().is_err() {
                break;
            }
            largest += 1;
        }
        assert!(largest >= ServerConfig::default().rooms.triangles.point_count);
        assert!(largest < 30);
        let points = Board::Points(PointBoard::from_points(vec![
            Point::new(700.0, 650.0);
            largest as usize
        ]));
        let snapshot = largest_snapshot(points, cfg.rooms.triangles.max_players);
        assert_eq!(snapshot.moves.len(), snapshot.board.legal_edge_count());
        let msg = ServerMessage::RoomState(Box::new(RoomStateMsg { snapshot }));
        assert!(encode_server_message(&msg).unwrap().len() < MAX_MESSAGE_SIZE);

        let mut cfg = ServerConfig::default();
        let mut side = cfg.rooms.squares.rows;
        loop {
            cfg.rooms.squares.rows = side + 1;
            cfg.rooms.squares.cols = side + 1;
            if cfg.check().is_err() {
                break;
            }
            side += 1;
        }
        assert!(side >= 4);
        let grid = Board::Grid(GridBoard::new(side, side));
        let snapshot = largest_snapshot(grid, cfg.rooms.squares.max_players);
        let msg = ServerMessage::RoomState(Box::new(RoomStateMsg { snapshot }));
        assert!(encode_server_message(&msg).unwrap().len() < MAX_MESSAGE_SIZE);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("EDGEWISE_LISTEN_ADDR", "127.0.0.1:1234"),
            ("EDGEWISE_WEB_ROOT", ""),
            ("EDGEWISE_MAX_WS_CONNECTIONS", "7"),
            ("EDGEWISE_DEFAULT_VARIANT", "Triangle"),
            ("EDGEWISE_MAX_PLAYERS", "2"),
            ("EDGEWISE_WS_RATE_LIMIT", "fast"),
        ]
        .into_iter()
        .collect();
        let mut cfg = ServerConfig::default();
        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.listen_addr, "127.0.0.1:1234");
        assert_eq!(cfg.web_root, "web");
        assert_eq!(cfg.limits.max_ws_connections, 7);
        assert_eq!(cfg.rooms.default_variant, Variant::Triangles);
        assert_eq!(cfg.rooms.max_players(Variant::Squares), 2);
        assert_eq!(cfg.rooms.max_players(Variant::Triangles), 2);
        assert!((cfg.limits.ws_rate_limit_per_sec - 20.0).abs() < f64::EPSILON);
    }
}
