use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Vertex;

/// A free vertex position in board (canvas) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An arbitrary point set where every distinct pair is a legal edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointBoard {
    points: Vec<Point>,
}

impl PointBoard {
    /// Point ids are `u16`; anything past that is dropped.
    pub fn from_points(mut points: Vec<Point>) -> Self {
        points.truncate(u16::MAX as usize);
        Self { points }
    }

    /// Scatter `count` points uniformly inside a `width` × `height` canvas,
    /// keeping `margin` clear on every side.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        count: u16,
        width: f32,
        height: f32,
        margin: f32,
    ) -> Self {
        let x_max = (width - margin).max(margin);
        let y_max = (height - margin).max(margin);
        let points = (0..count)
            .map(|_| Point {
                x: rng.random_range(margin..=x_max),
                y: rng.random_range(margin..=y_max),
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, v: Vertex) -> bool {
        match v {
            Vertex::Point(i) => (i as usize) < self.points.len(),
            Vertex::Grid { .. } => false,
        }
    }

    pub fn legal_edge_count(&self) -> usize {
        let n = self.points.len();
        n * n.saturating_sub(1) / 2
    }
}
