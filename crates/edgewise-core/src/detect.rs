//! Shape closure detection.
//!
//! Detection is incremental: the room keeps an [`EdgeIndex`] that is updated
//! once per accepted edge, and [`on_edge_added`] only inspects the
//! neighbourhood of the new edge. Results are reported in canonical order so
//! two rooms fed the same edges (in any order) claim the same shapes.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::board::{Board, EdgeKey, GridBoard, Vertex};

/// Accepted edges plus a vertex → neighbour adjacency map.
#[derive(Debug, Clone, Default)]
pub struct EdgeIndex {
    edges: HashSet<EdgeKey>,
    adjacency: HashMap<Vertex, BTreeSet<Vertex>>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.edges.contains(key)
    }

    /// Record an edge. Returns `false` if it was already present.
    pub fn insert(&mut self, key: EdgeKey) -> bool {
        if !self.edges.insert(key) {
            return false;
        }
        self.adjacency
            .entry(key.low())
            .or_default()
            .insert(key.high());
        self.adjacency
            .entry(key.high())
            .or_default()
            .insert(key.low());
        true
    }

    pub fn neighbors(&self, v: Vertex) -> Option<&BTreeSet<Vertex>> {
        self.adjacency.get(&v)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Identity of a closed shape: its vertices in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeKey(Vec<Vertex>);

impl ShapeKey {
    pub fn from_vertices(mut vertices: Vec<Vertex>) -> Self {
        vertices.sort_unstable();
        vertices.dedup();
        Self(vertices)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.0
    }

    pub fn into_vertices(self) -> Vec<Vertex> {
        self.0
    }
}

/// Shapes closed by `edge` that are not yet in `claimed`, sorted.
///
/// `index` is the edge set the move is judged against; `edge` itself is
/// treated as present whether or not it has been inserted yet.
pub fn on_edge_added(
    board: &Board,
    index: &EdgeIndex,
    edge: EdgeKey,
    claimed: &HashSet<ShapeKey>,
) -> Vec<ShapeKey> {
    let mut closed = match board {
        Board::Grid(grid) => closed_squares(grid, index, edge),
        Board::Points(_) => closed_triangles(index, edge),
    };
    closed.retain(|shape| !claimed.contains(shape));
    closed.sort_unstable();
    closed
}

fn closed_squares(grid: &GridBoard, index: &EdgeIndex, edge: EdgeKey) -> Vec<ShapeKey> {
    grid.cells_touching(edge)
        .into_iter()
        .filter(|&cell| {
            GridBoard::cell_edges(cell)
                .iter()
                .all(|side| *side == edge || index.contains(side))
        })
        .map(|cell| ShapeKey::from_vertices(GridBoard::cell_corners(cell).to_vec()))
        .collect()
}

fn closed_triangles(index: &EdgeIndex, edge: EdgeKey) -> Vec<ShapeKey> {
    let (a, b) = (edge.low(), edge.high());
    let (Some(na), Some(nb)) = (index.neighbors(a), index.neighbors(b)) else {
        return Vec::new();
    };
    // Walk the smaller neighbour set, look up in the larger.
    let (small, large) = if na.len() <= nb.len() {
        (na, nb)
    } else {
        (nb, na)
    };
    small
        .iter()
        .filter(|&&c| c != a && c != b && large.contains(&c))
        .map(|&c| ShapeKey::from_vertices(vec![a, b, c]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Cell, Point, PointBoard};
    use std::collections::BTreeSet;

    fn grid_edge(r1: u16, c1: u16, r2: u16, c2: u16) -> EdgeKey {
        EdgeKey::new(Vertex::grid(r1, c1), Vertex::grid(r2, c2)).unwrap()
    }

    fn point_edge(a: u16, b: u16) -> EdgeKey {
        EdgeKey::new(Vertex::point(a), Vertex::point(b)).unwrap()
    }

    fn point_board(n: usize) -> Board {
        Board::Points(PointBoard::from_points(
            (0..n).map(|i| Point::new(i as f32, (i * i) as f32)).collect(),
        ))
    }

    /// Feed edges one at a time, collecting every claim in order.
    fn play(board: &Board, edges: &[EdgeKey]) -> Vec<ShapeKey> {
        let mut index = EdgeIndex::new();
        let mut claimed = HashSet::new();
        let mut all = Vec::new();
        for &edge in edges {
            index.insert(edge);
            for shape in on_edge_added(board, &index, edge, &claimed) {
                claimed.insert(shape.clone());
                all.push(shape);
            }
        }
        all
    }

    /// Every closed shape of a finished edge set, computed from scratch.
    fn closed_shapes(board: &Board, index: &EdgeIndex) -> BTreeSet<ShapeKey> {
        let mut found = BTreeSet::new();
        for edge in &index.edges {
            found.extend(on_edge_added(board, index, *edge, &HashSet::new()));
        }
        found
    }

    #[test]
    fn square_closes_on_fourth_edge() {
        let board = Board::Grid(GridBoard::new(2, 2));
        let mut index = EdgeIndex::new();
        let claimed = HashSet::new();
        for edge in [grid_edge(0, 0, 0, 1), grid_edge(0, 1, 1, 1), grid_edge(1, 1, 1, 0)] {
            index.insert(edge);
            assert!(on_edge_added(&board, &index, edge, &claimed).is_empty());
        }
        let closing = grid_edge(1, 0, 0, 0);
        index.insert(closing);
        let shapes = on_edge_added(&board, &index, closing, &claimed);
        assert_eq!(shapes.len(), 1);
        assert_eq!(
            shapes[0].vertices(),
            &[
                Vertex::grid(0, 0),
                Vertex::grid(0, 1),
                Vertex::grid(1, 0),
                Vertex::grid(1, 1)
            ]
        );
    }

    #[test]
    fn shared_edge_closes_two_squares() {
        let board = Board::Grid(GridBoard::new(2, 3));
        let edges = [
            grid_edge(0, 0, 0, 1),
            grid_edge(0, 1, 0, 2),
            grid_edge(1, 0, 1, 1),
            grid_edge(1, 1, 1, 2),
            grid_edge(0, 0, 1, 0),
            grid_edge(0, 2, 1, 2),
        ];
        assert!(play(&board, &edges).is_empty());

        let mut index = EdgeIndex::new();
        for e in edges {
            index.insert(e);
        }
        let middle = grid_edge(0, 1, 1, 1);
        index.insert(middle);
        let shapes = on_edge_added(&board, &index, middle, &HashSet::new());
        assert_eq!(shapes.len(), 2);
        assert!(shapes[0] < shapes[1], "shapes must be reported in order");
    }

    #[test]
    fn detection_does_not_require_prior_insert() {
        let board = Board::Grid(GridBoard::new(2, 2));
        let mut index = EdgeIndex::new();
        for edge in [grid_edge(0, 0, 0, 1), grid_edge(0, 1, 1, 1), grid_edge(1, 1, 1, 0)] {
            index.insert(edge);
        }
        let shapes = on_edge_added(&board, &index, grid_edge(0, 0, 1, 0), &HashSet::new());
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn triangle_closes_regardless_of_order() {
        let board = point_board(3);
        let orders = [
            [point_edge(0, 1), point_edge(1, 2), point_edge(0, 2)],
            [point_edge(0, 2), point_edge(0, 1), point_edge(1, 2)],
            [point_edge(1, 2), point_edge(0, 2), point_edge(0, 1)],
        ];
        for order in orders {
            let shapes = play(&board, &order);
            assert_eq!(shapes.len(), 1);
            assert_eq!(
                shapes[0].vertices(),
                &[Vertex::point(0), Vertex::point(1), Vertex::point(2)]
            );
        }
    }

    #[test]
    fn one_edge_closes_multiple_triangles() {
        let board = point_board(5);
        // 0 and 1 both connect to 2, 3, 4.
        let mut edges = Vec::new();
        for c in 2..5 {
            edges.push(point_edge(0, c));
            edges.push(point_edge(1, c));
        }
        assert!(play(&board, &edges).is_empty());
        edges.push(point_edge(0, 1));
        let shapes = play(&board, &edges);
        assert_eq!(shapes.len(), 3);
        let thirds: Vec<Vertex> = shapes.iter().map(|s| s.vertices()[2]).collect();
        assert_eq!(
            thirds,
            vec![Vertex::point(2), Vertex::point(3), Vertex::point(4)]
        );
    }

    #[test]
    fn claimed_shapes_are_not_reported_again() {
        let board = point_board(3);
        let edges = [point_edge(0, 1), point_edge(1, 2), point_edge(0, 2)];
        let mut index = EdgeIndex::new();
        let mut claimed = HashSet::new();
        for edge in edges {
            index.insert(edge);
            claimed.extend(on_edge_added(&board, &index, edge, &claimed));
        }
        assert_eq!(claimed.len(), 1);
        for edge in edges {
            assert!(on_edge_added(&board, &index, edge, &claimed).is_empty());
        }
    }

    #[test]
    fn index_rejects_duplicate_insert() {
        let mut index = EdgeIndex::new();
        assert!(index.insert(point_edge(0, 1)));
        assert!(!index.insert(point_edge(1, 0)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.neighbors(Vertex::point(0)).map(|n| n.len()), Some(1));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn triangle_claims_match_full_rescan(
                pairs in proptest::collection::vec((0u16..7, 0u16..7), 1..40),
                seed in 0u64..1000,
            ) {
                let board = point_board(7);
                let mut edges: Vec<EdgeKey> = Vec::new();
                for (a, b) in pairs {
                    if let Some(key) = EdgeKey::new(Vertex::point(a), Vertex::point(b))
                        && !edges.contains(&key)
                    {
                        edges.push(key);
                    }
                }
                let forward: BTreeSet<ShapeKey> = play(&board, &edges).into_iter().collect();

                // A different insertion order must claim the same shapes.
                let mut shuffled = edges.clone();
                let len = shuffled.len();
                for i in 0..len {
                    let j = ((seed as usize).wrapping_mul(31).wrapping_add(i * 17)) % len;
                    shuffled.swap(i, j);
                }
                let reordered: BTreeSet<ShapeKey> = play(&board, &shuffled).into_iter().collect();
                prop_assert_eq!(&forward, &reordered);

                let mut index = EdgeIndex::new();
                for e in &edges {
                    index.insert(*e);
                }
                prop_assert_eq!(forward, closed_shapes(&board, &index));
            }

            #[test]
            fn square_claims_match_full_rescan(
                moves in proptest::collection::vec((0u16..4, 0u16..4, proptest::bool::ANY), 1..60),
            ) {
                let grid = GridBoard::new(4, 4);
                let board = Board::Grid(grid);
                let mut edges = Vec::new();
                for (r, c, horizontal) in moves {
                    let (r2, c2) = if horizontal { (r, c + 1) } else { (r + 1, c) };
                    let (u, v) = (Vertex::grid(r, c), Vertex::grid(r2, c2));
                    if board.is_legal_edge(u, v)
                        && let Some(key) = EdgeKey::new(u, v)
                        && !edges.contains(&key)
                    {
                        edges.push(key);
                    }
                }
                let claims = play(&board, &edges);
                let unique: BTreeSet<ShapeKey> = claims.iter().cloned().collect();
                prop_assert_eq!(claims.len(), unique.len());
                prop_assert!(claims.len() <= grid.cell_count());

                // Every square whose four sides are drawn, and nothing else.
                let mut index = EdgeIndex::new();
                for e in &edges {
                    index.insert(*e);
                }
                prop_assert_eq!(&unique, &closed_shapes(&board, &index));
                let mut complete = BTreeSet::new();
                for row in 0..grid.rows - 1 {
                    for col in 0..grid.cols - 1 {
                        let cell = Cell { row, col };
                        if GridBoard::cell_edges(cell).iter().all(|side| index.contains(side)) {
                            complete.insert(ShapeKey::from_vertices(
                                GridBoard::cell_corners(cell).to_vec(),
                            ));
                        }
                    }
                }
                prop_assert_eq!(unique, complete);
            }
        }
    }
}
