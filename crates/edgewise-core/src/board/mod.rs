pub mod grid;
pub mod points;

use serde::{Deserialize, Serialize};

pub use grid::{Cell, GridBoard};
pub use points::{Point, PointBoard};

/// Which board family a room plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Grid vertices, 4-adjacent edges, unit squares score.
    #[default]
    Squares,
    /// Free point set, any pair is an edge, triangles score.
    Triangles,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Squares => "squares",
            Self::Triangles => "triangles",
        }
    }

    /// Parse a variant name as used in config files and the REST API.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squares" | "square" => Some(Self::Squares),
            "triangles" | "triangle" => Some(Self::Triangles),
            _ => None,
        }
    }

    /// Number of vertices in one scoring shape.
    pub fn shape_size(self) -> usize {
        match self {
            Self::Squares => 4,
            Self::Triangles => 3,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A board vertex. Grid vertices are addressed by row/column, free points by
/// their index in the room's point list.
///
/// The derived ordering (row-major for grid vertices, by index for points) is
/// the canonical order used for edge keys and shape reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vertex {
    Grid { row: u16, col: u16 },
    Point(u16),
}

impl Vertex {
    pub const fn grid(row: u16, col: u16) -> Self {
        Self::Grid { row, col }
    }

    pub const fn point(index: u16) -> Self {
        Self::Point(index)
    }
}

/// An unordered pair of distinct vertices, stored low-then-high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    low: Vertex,
    high: Vertex,
}

impl EdgeKey {
    /// Build the canonical key for `u`–`v`. Returns `None` for a self-loop.
    pub fn new(u: Vertex, v: Vertex) -> Option<Self> {
        match u.cmp(&v) {
            std::cmp::Ordering::Less => Some(Self { low: u, high: v }),
            std::cmp::Ordering::Greater => Some(Self { low: v, high: u }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Caller guarantees `u != v`.
    pub(crate) fn from_distinct(u: Vertex, v: Vertex) -> Self {
        if u < v {
            Self { low: u, high: v }
        } else {
            Self { low: v, high: u }
        }
    }

    pub fn low(&self) -> Vertex {
        self.low
    }

    pub fn high(&self) -> Vertex {
        self.high
    }
}

/// The fixed vertex set of a room and the rule for which pairs are edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Board {
    Grid(GridBoard),
    Points(PointBoard),
}

impl Board {
    pub fn variant(&self) -> Variant {
        match self {
            Self::Grid(_) => Variant::Squares,
            Self::Points(_) => Variant::Triangles,
        }
    }

    pub fn contains(&self, v: Vertex) -> bool {
        match self {
            Self::Grid(grid) => grid.contains(v),
            Self::Points(points) => points.contains(v),
        }
    }

    /// Whether `u`–`v` may ever be drawn on this board. Unknown vertices and
    /// self-loops are never legal.
    pub fn is_legal_edge(&self, u: Vertex, v: Vertex) -> bool {
        if u == v || !self.contains(u) || !self.contains(v) {
            return false;
        }
        match self {
            Self::Grid(grid) => grid.is_adjacent(u, v),
            Self::Points(_) => true,
        }
    }

    /// Total number of distinct legal edges. A room whose accepted edge count
    /// reaches this value has nothing left to draw.
    pub fn legal_edge_count(&self) -> usize {
        match self {
            Self::Grid(grid) => grid.legal_edge_count(),
            Self::Points(points) => points.legal_edge_count(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Grid(grid) => grid.vertex_count(),
            Self::Points(points) => points.len(),
        }
    }

    /// Every legal edge, each once, in canonical form.
    pub fn legal_edges(&self) -> Vec<EdgeKey> {
        let mut edges = Vec::with_capacity(self.legal_edge_count());
        match self {
            Self::Grid(grid) => {
                for row in 0..grid.rows {
                    for col in 0..grid.cols {
                        let here = Vertex::grid(row, col);
                        if col + 1 < grid.cols {
                            edges.extend(EdgeKey::new(here, Vertex::grid(row, col + 1)));
                        }
                        if row + 1 < grid.rows {
                            edges.extend(EdgeKey::new(here, Vertex::grid(row + 1, col)));
                        }
                    }
                }
            },
            Self::Points(_) => {
                let n = self.vertex_count() as u16;
                for a in 0..n {
                    for b in a + 1..n {
                        edges.extend(EdgeKey::new(Vertex::point(a), Vertex::point(b)));
                    }
                }
            },
        }
        edges
    }

    /// Point positions for the triangle variant.
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            Self::Points(points) => Some(points.points()),
            Self::Grid(_) => None,
        }
    }
}
