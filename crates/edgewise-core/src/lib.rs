pub mod board;
pub mod detect;
pub mod error;
pub mod mirror;
pub mod net;
pub mod player;
pub mod room;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::board::{Board, GridBoard, Point, PointBoard};
    use crate::player::{PlayerColor, PlayerId};
    use crate::room::{PlayerInfo, Room, RoomConfig};

    /// Create `n` join requests with sequential IDs starting at 1. Symbols
    /// run `A`, `B`, `C`... and colors cycle through the palette.
    pub fn make_player_info(n: usize) -> Vec<PlayerInfo> {
        (0..n)
            .map(|i| PlayerInfo {
                id: i as PlayerId + 1,
                display_name: format!("Player{}", i + 1),
                symbol: char::from(b'A' + (i % 26) as u8).to_string(),
                color: PlayerColor::PALETTE[i % PlayerColor::PALETTE.len()],
            })
            .collect()
    }

    /// `n` points on a convex curve, so no three are collinear.
    pub fn make_points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(40.0 + i as f32 * 30.0, 40.0 + (i * i) as f32 * 5.0))
            .collect()
    }

    /// A squares room on a `rows` × `cols` vertex grid with `players` seated.
    pub fn square_room(rows: u16, cols: u16, players: usize) -> Room {
        let board = Board::Grid(GridBoard::new(rows, cols));
        seat_players(Room::new("sqtest".into(), board, room_config(players)), players)
    }

    /// A triangles room over `points` fixed points with `players` seated.
    pub fn triangle_room(points: usize, players: usize) -> Room {
        let board = Board::Points(PointBoard::from_points(make_points(points)));
        seat_players(Room::new("trtest".into(), board, room_config(players)), players)
    }

    fn room_config(players: usize) -> RoomConfig {
        RoomConfig {
            max_players: players.max(4) as u8,
        }
    }

    fn seat_players(mut room: Room, players: usize) -> Room {
        for info in make_player_info(players) {
            room.join(info).expect("test room has a free seat");
        }
        room
    }
}
