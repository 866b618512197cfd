use serde::{Deserialize, Serialize};

use super::{EdgeKey, Vertex};

/// A rows × cols lattice of vertices. Edges join 4-adjacent vertices and
/// each unit cell between four vertices is a potential square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBoard {
    pub rows: u16,
    pub cols: u16,
}

/// A unit cell, addressed by its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: u16,
    pub col: u16,
}

impl GridBoard {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    pub fn vertex_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn contains(&self, v: Vertex) -> bool {
        match v {
            Vertex::Grid { row, col } => row < self.rows && col < self.cols,
            Vertex::Point(_) => false,
        }
    }

    /// Manhattan distance exactly 1. Both vertices must already be known to
    /// lie on the grid.
    pub fn is_adjacent(&self, u: Vertex, v: Vertex) -> bool {
        match (u, v) {
            (Vertex::Grid { row: r1, col: c1 }, Vertex::Grid { row: r2, col: c2 }) => {
                r1.abs_diff(r2) + c1.abs_diff(c2) == 1
            },
            _ => false,
        }
    }

    pub fn legal_edge_count(&self) -> usize {
        let rows = self.rows as usize;
        let cols = self.cols as usize;
        rows * cols.saturating_sub(1) + cols * rows.saturating_sub(1)
    }

    pub fn cell_count(&self) -> usize {
        self.rows.saturating_sub(1) as usize * self.cols.saturating_sub(1) as usize
    }

    /// The (at most two) cells bordered by `edge`.
    pub fn cells_touching(&self, edge: EdgeKey) -> Vec<Cell> {
        let (Vertex::Grid { row, col }, Vertex::Grid { row: row2, .. }) = (edge.low(), edge.high())
        else {
            return Vec::new();
        };
        let mut cells = Vec::with_capacity(2);
        if row == row2 {
            // Horizontal: cells above and below.
            if row > 0 {
                cells.push(Cell { row: row - 1, col });
            }
            if row + 1 < self.rows {
                cells.push(Cell { row, col });
            }
        } else {
            // Vertical: cells left and right.
            if col > 0 {
                cells.push(Cell { row, col: col - 1 });
            }
            if col + 1 < self.cols {
                cells.push(Cell { row, col });
            }
        }
        cells
    }

    /// Top, bottom, left, right boundary edges of a cell.
    pub fn cell_edges(cell: Cell) -> [EdgeKey; 4] {
        let [tl, tr, bl, br] = Self::cell_corners(cell);
        [
            EdgeKey::from_distinct(tl, tr),
            EdgeKey::from_distinct(bl, br),
            EdgeKey::from_distinct(tl, bl),
            EdgeKey::from_distinct(tr, br),
        ]
    }

    /// Corners in canonical (row-major) order.
    pub fn cell_corners(cell: Cell) -> [Vertex; 4] {
        let Cell { row, col } = cell;
        [
            Vertex::grid(row, col),
            Vertex::grid(row, col + 1),
            Vertex::grid(row + 1, col),
            Vertex::grid(row + 1, col + 1),
        ]
    }
}
