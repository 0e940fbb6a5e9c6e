//! Spatial erase: which elements does an eraser gesture touch?
//!
//! Erasing is a delete of whole elements. The gesture's samples accumulate
//! into a path, and on every new sample each element not yet marked is tested
//! against the whole path, so elements that arrive in a snapshot mid-gesture
//! are caught too. An element is hit when any path point lies within the erase
//! radius of it:
//!
//! - pen: within radius of any stroke vertex
//! - line: within radius of the segment
//! - rectangle, circle, triangle, text: inside the bounding box grown by the
//!   radius on every side
//!
//! The engine reports each element at most once per gesture, so callers can
//! issue one delete per id without tracking duplicates themselves.

#[cfg(test)]
#[path = "erase_test.rs"]
mod erase_test;

use std::collections::HashSet;

use crate::doc::{ElementId, ElementStore, Shape};
use crate::viewport::Point;

/// Whether an eraser sample at `at` with `radius` touches `shape`.
#[must_use]
pub fn shape_hit(shape: &Shape, at: Point, radius: f64) -> bool {
    match shape {
        Shape::Pen { points } => points.iter().any(|p| p.distance_to(at) <= radius),
        Shape::Line { from, to } => point_segment_distance(at, *from, *to) <= radius,
        Shape::Rectangle { .. } | Shape::Circle { .. } | Shape::Triangle { .. } | Shape::Text { .. } => {
            let (min, max) = shape.bounds();
            at.x >= min.x - radius && at.x <= max.x + radius && at.y >= min.y - radius && at.y <= max.y + radius
        }
    }
}

/// Shortest distance from `p` to the segment `a`–`b`.
#[must_use]
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Tracks one eraser gesture from pointer-down to pointer-up.
#[derive(Debug, Default)]
pub struct EraseEngine {
    active: bool,
    path: Vec<Point>,
    marked: HashSet<ElementId>,
}

impl EraseEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a gesture, forgetting anything marked by the previous one.
    pub fn begin(&mut self) {
        self.active = true;
        self.path.clear();
        self.marked.clear();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The gesture's samples so far.
    #[must_use]
    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Add a sample. Returns ids hit for the first time in this gesture, in
    /// painter's order.
    pub fn extend(&mut self, at: Point, elements: &ElementStore, radius: f64) -> Vec<ElementId> {
        if !self.active {
            return Vec::new();
        }
        self.path.push(at);
        let mut newly = Vec::new();
        for element in elements.iter() {
            if self.marked.contains(&element.id) || !self.path.iter().any(|p| shape_hit(&element.shape, *p, radius)) {
                continue;
            }
            self.marked.insert(element.id.clone());
            newly.push(element.id.clone());
        }
        newly
    }

    /// End the gesture. Returns how many elements it marked.
    pub fn finish(&mut self) -> usize {
        self.active = false;
        let count = self.marked.len();
        self.path.clear();
        self.marked.clear();
        count
    }
}
