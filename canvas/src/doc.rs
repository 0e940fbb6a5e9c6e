//! Document model: drawing elements, their wire shape, and the local store.
//!
//! Elements arrive from the document store as loosely typed JSON documents.
//! They are validated once, at the subscription boundary, into
//! [`DrawingElement`], whose [`Shape`] is a tagged variant per element type
//! with the point count that type requires. Render and erase code match on
//! `Shape` exhaustively and never see malformed documents.
//!
//! Data flows into this layer from snapshot subscriptions
//! ([`ElementStore::load_snapshot`]) and out of it towards the renderer
//! ([`ElementStore::iter`], painter's order) and the erase engine.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consts::{FONT_SIZE_PER_STROKE, MIN_FONT_SIZE, TEXT_ADVANCE_RATIO};
use crate::viewport::Point;

/// Store-assigned identifier of a persisted element.
pub type ElementId = String;

/// Identity of a user: an email, or a pseudonymous `anonymous_…` id.
pub type UserId = String;

/// Element type tag as stored in documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Freehand polyline.
    Pen,
    /// Straight segment.
    Line,
    /// Axis-aligned rectangle from two opposite corners.
    Rectangle,
    /// Circle from center and a point on the rim.
    Circle,
    /// Triangle from three vertices.
    Triangle,
    /// Text anchored at a single point.
    Text,
    /// Only ever a tool; never a stored element.
    Eraser,
}

/// Why a stored document could not become a [`DrawingElement`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElementError {
    #[error("document is not a drawing element: {0}")]
    Decode(String),
    #[error("{kind:?} element needs {expected} points, got {got}")]
    PointCount { kind: ElementKind, expected: &'static str, got: usize },
    #[error("point ({x}, {y}) lies outside the virtual canvas")]
    OutOfBounds { x: f64, y: f64 },
    #[error("stroke width must be positive, got {0}")]
    StrokeWidth(f64),
    #[error("eraser strokes are never persisted")]
    Eraser,
    #[error("text element is missing its text")]
    MissingText,
}

/// Geometry of an element, one variant per drawable type.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Pen { points: Vec<Point> },
    Line { from: Point, to: Point },
    Rectangle { corner_a: Point, corner_b: Point },
    Circle { center: Point, rim: Point },
    Triangle { vertices: [Point; 3] },
    Text { anchor: Point, text: String, font_size: f64 },
}

impl Shape {
    /// The stored type tag for this shape.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Pen { .. } => ElementKind::Pen,
            Self::Line { .. } => ElementKind::Line,
            Self::Rectangle { .. } => ElementKind::Rectangle,
            Self::Circle { .. } => ElementKind::Circle,
            Self::Triangle { .. } => ElementKind::Triangle,
            Self::Text { .. } => ElementKind::Text,
        }
    }

    /// The stored point list.
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        match self {
            Self::Pen { points } => points.clone(),
            Self::Line { from, to } => vec![*from, *to],
            Self::Rectangle { corner_a, corner_b } => vec![*corner_a, *corner_b],
            Self::Circle { center, rim } => vec![*center, *rim],
            Self::Triangle { vertices } => vertices.to_vec(),
            Self::Text { anchor, .. } => vec![*anchor],
        }
    }

    /// Axis-aligned bounds in virtual space: `(min, max)`.
    #[must_use]
    pub fn bounds(&self) -> (Point, Point) {
        match self {
            Self::Circle { center, rim } => {
                let r = center.distance_to(*rim);
                (Point::new(center.x - r, center.y - r), Point::new(center.x + r, center.y + r))
            }
            Self::Text { anchor, text, font_size } => {
                #[allow(clippy::cast_precision_loss)]
                let width = text.chars().count() as f64 * font_size * TEXT_ADVANCE_RATIO;
                (*anchor, Point::new(anchor.x + width, anchor.y + font_size))
            }
            _ => {
                let points = self.points();
                let mut min = Point::new(f64::INFINITY, f64::INFINITY);
                let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for p in &points {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                (min, max)
            }
        }
    }

    /// Whether the shape has no extent worth committing (a click without drag).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Pen { points } => points.is_empty(),
            Self::Line { from, to } | Self::Rectangle { corner_a: from, corner_b: to } | Self::Circle { center: from, rim: to } => {
                from == to
            }
            Self::Triangle { vertices: [a, b, c] } => {
                ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() < f64::EPSILON
            }
            Self::Text { text, .. } => text.trim().is_empty(),
        }
    }
}

/// Paint style shared by every element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// CSS color string.
    pub color: String,
    /// Stroke width in virtual units; always positive.
    pub stroke_width: f64,
    /// Whether closed shapes get a translucent fill.
    pub fill: bool,
}

/// Font size used for text elements drawn at `stroke_width`.
#[must_use]
pub fn font_size_for_stroke(stroke_width: f64) -> f64 {
    (stroke_width * FONT_SIZE_PER_STROKE).max(MIN_FONT_SIZE)
}

/// An element that exists only locally: the in-progress preview, or a finished
/// gesture waiting to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDraft {
    pub shape: Shape,
    pub style: Style,
}

impl ElementDraft {
    /// Stamp the draft with its creation time and author for persistence.
    #[must_use]
    pub fn into_wire(self, timestamp: i64, user_id: &str) -> WireElement {
        let (text, font_size) = match &self.shape {
            Shape::Text { text, font_size, .. } => (Some(text.clone()), Some(*font_size)),
            _ => (None, None),
        };
        WireElement {
            kind: self.shape.kind(),
            points: self.shape.points(),
            color: self.style.color,
            stroke_width: self.style.stroke_width,
            fill: Some(self.style.fill),
            text,
            font_size,
            timestamp,
            user_id: user_id.to_owned(),
        }
    }
}

/// The element document exactly as the store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    pub timestamp: i64,
    pub user_id: UserId,
}

/// A persisted, validated element. Immutable: edits are delete + recreate.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingElement {
    pub id: ElementId,
    pub shape: Shape,
    pub style: Style,
    /// Creation time in Unix milliseconds; the painter's-order key.
    pub timestamp: i64,
    pub user_id: UserId,
}

impl DrawingElement {
    /// Validate a raw store document.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] when the document does not decode or does
    /// not describe a well-formed element.
    pub fn from_document(id: &str, data: &serde_json::Value) -> Result<Self, ElementError> {
        let wire: WireElement =
            serde_json::from_value(data.clone()).map_err(|e| ElementError::Decode(e.to_string()))?;
        Self::from_wire(id, wire)
    }

    /// Validate a decoded wire element.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] when the point count, bounds or stroke width
    /// are wrong for the element type.
    pub fn from_wire(id: &str, wire: WireElement) -> Result<Self, ElementError> {
        if !(wire.stroke_width.is_finite() && wire.stroke_width > 0.0) {
            return Err(ElementError::StrokeWidth(wire.stroke_width));
        }
        if let Some(p) = wire.points.iter().find(|p| !p.is_on_canvas()) {
            return Err(ElementError::OutOfBounds { x: p.x, y: p.y });
        }

        let kind = wire.kind;
        let points = wire.points;
        let got = points.len();
        let count_err = move |expected| ElementError::PointCount { kind, expected, got };
        let shape = match kind {
            ElementKind::Eraser => return Err(ElementError::Eraser),
            ElementKind::Pen => {
                if points.is_empty() {
                    return Err(count_err("at least 1"));
                }
                Shape::Pen { points }
            }
            ElementKind::Line => match points.as_slice() {
                [from, to] => Shape::Line { from: *from, to: *to },
                _ => return Err(count_err("2")),
            },
            ElementKind::Rectangle => match points.as_slice() {
                [corner_a, corner_b] => Shape::Rectangle { corner_a: *corner_a, corner_b: *corner_b },
                _ => return Err(count_err("2")),
            },
            ElementKind::Circle => match points.as_slice() {
                [center, rim] => Shape::Circle { center: *center, rim: *rim },
                _ => return Err(count_err("2")),
            },
            ElementKind::Triangle => match points.as_slice() {
                [a, b, c] => Shape::Triangle { vertices: [*a, *b, *c] },
                _ => return Err(count_err("3")),
            },
            ElementKind::Text => {
                let [anchor] = points.as_slice() else {
                    return Err(count_err("1"));
                };
                let text = wire.text.filter(|t| !t.is_empty()).ok_or(ElementError::MissingText)?;
                let font_size = wire
                    .font_size
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .unwrap_or_else(|| font_size_for_stroke(wire.stroke_width));
                Shape::Text { anchor: *anchor, text, font_size }
            }
        };

        Ok(Self {
            id: id.to_owned(),
            shape,
            style: Style { color: wire.color, stroke_width: wire.stroke_width, fill: wire.fill.unwrap_or(false) },
            timestamp: wire.timestamp,
            user_id: wire.user_id,
        })
    }
}

/// Locally cached copy of a board's element collection, kept in painter's order.
#[derive(Debug, Default)]
pub struct ElementStore {
    elements: Vec<DrawingElement>,
}

impl ElementStore {
    #[must_use]
    pub fn new() -> Self {
        Self { elements: Vec::new() }
    }

    /// Replace everything with a full snapshot, sorting by `(timestamp, id)`
    /// so arrival order never affects paint order.
    pub fn load_snapshot(&mut self, mut elements: Vec<DrawingElement>) {
        elements.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        self.elements = elements;
    }

    /// Elements in painter's order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &DrawingElement> {
        self.elements.iter()
    }

    /// Look up an element by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DrawingElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// An online collaborator as the renderer needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub name: String,
    pub color: String,
}

/// Remote presence: who is online, and where their cursors are.
#[derive(Debug, Default)]
pub struct PeerStore {
    peers: HashMap<UserId, Peer>,
    cursors: HashMap<UserId, Point>,
}

impl PeerStore {
    /// Replace the online-peer list.
    pub fn load_presence(&mut self, peers: impl IntoIterator<Item = (UserId, Peer)>) {
        self.peers = peers.into_iter().collect();
    }

    /// Replace all cursors, dropping `local_user` and off-canvas positions.
    pub fn load_cursors(&mut self, cursors: impl IntoIterator<Item = (UserId, Point)>, local_user: &str) {
        self.cursors = cursors
            .into_iter()
            .filter(|(id, p)| id != local_user && p.is_on_canvas())
            .collect();
    }

    #[must_use]
    pub fn peer(&self, user_id: &str) -> Option<&Peer> {
        self.peers.get(user_id)
    }

    /// Online peers sorted by user id.
    #[must_use]
    pub fn online(&self) -> Vec<(&str, &Peer)> {
        let mut out: Vec<(&str, &Peer)> = self.peers.iter().map(|(id, peer)| (id.as_str(), peer)).collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Cursors of users that are online, sorted by user id for stable overlap.
    #[must_use]
    pub fn visible_cursors(&self) -> Vec<(&str, &Peer, Point)> {
        let mut out: Vec<(&str, &Peer, Point)> = self
            .cursors
            .iter()
            .filter_map(|(id, p)| self.peers.get(id).map(|peer| (id.as_str(), peer, *p)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Number of online peers (including the local user when present).
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.peers.len()
    }
}
