//! Input model: tools, pointer buttons, drawing style, and the gesture state machine.
//!
//! `Tool` and `UiState` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture tracked between pointer-down and
//! pointer-up, carrying everything needed to build the preview while the
//! pointer moves and the final element on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, MAX_STROKE_WIDTH, MIN_STROKE_WIDTH};
use crate::doc::{ElementKind, Shape, Style};
use crate::viewport::Point;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand drawing (default).
    #[default]
    Pen,
    /// Straight segment from press to release.
    Line,
    /// Rectangle spanned by press and release corners.
    Rectangle,
    /// Circle centered on the press point.
    Circle,
    /// Isosceles triangle inside the dragged box.
    Triangle,
    /// Place text at the press point.
    Text,
    /// Delete whole elements under the pointer.
    Eraser,
}

impl Tool {
    /// Whether this tool draws a two-point shape by dragging.
    #[must_use]
    pub fn is_shape(self) -> bool {
        matches!(self, Self::Line | Self::Rectangle | Self::Circle | Self::Triangle)
    }

    /// The element type this tool produces.
    #[must_use]
    pub fn element_kind(self) -> ElementKind {
        match self {
            Self::Pen => ElementKind::Pen,
            Self::Line => ElementKind::Line,
            Self::Rectangle => ElementKind::Rectangle,
            Self::Circle => ElementKind::Circle,
            Self::Triangle => ElementKind::Triangle,
            Self::Text => ElementKind::Text,
            Self::Eraser => ElementKind::Eraser,
        }
    }

    /// Parse a toolbar name such as `"rectangle"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pen" => Some(Self::Pen),
            "line" => Some(Self::Line),
            "rectangle" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "triangle" => Some(Self::Triangle),
            "text" => Some(Self::Text),
            "eraser" => Some(Self::Eraser),
            _ => None,
        }
    }
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button, pen contact, or single-finger touch.
    Primary,
    /// Middle mouse button.
    Middle,
    /// Right mouse button.
    Secondary,
}

/// Persistent toolbar state.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Currently active tool.
    pub tool: Tool,
    /// Stroke color for new elements.
    pub color: String,
    /// Stroke width for new elements; also the eraser radius.
    stroke_width: f64,
    /// Whether new closed shapes get a translucent fill.
    pub fill: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            color: DEFAULT_STROKE_COLOR.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            fill: false,
        }
    }
}

impl UiState {
    #[must_use]
    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    /// Set the stroke width, clamped to the toolbar range. Non-finite input
    /// is ignored.
    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() {
            self.stroke_width = width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        }
    }

    /// Style applied to elements drawn now.
    #[must_use]
    pub fn style(&self) -> Style {
        Style { color: self.color.clone(), stroke_width: self.stroke_width, fill: self.fill }
    }

    /// Erase radius in virtual units.
    #[must_use]
    pub fn eraser_radius(&self) -> f64 {
        self.stroke_width
    }
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Freehand stroke; every sample so far, in order.
    DrawingPen {
        points: Vec<Point>,
    },
    /// Two-point shape being dragged out.
    DrawingShape {
        /// Tool that started the gesture; later tool switches do not affect it.
        tool: Tool,
        /// Virtual position of the pointer-down.
        anchor: Point,
        /// Latest virtual pointer position.
        last: Point,
    },
    /// Eraser held down.
    Erasing,
}

/// Build the shape a drag from `anchor` to `end` produces with `tool`.
///
/// Returns `None` for tools that are not drag shapes.
#[must_use]
pub fn drag_shape(tool: Tool, anchor: Point, end: Point) -> Option<Shape> {
    match tool {
        Tool::Line => Some(Shape::Line { from: anchor, to: end }),
        Tool::Rectangle => Some(Shape::Rectangle { corner_a: anchor, corner_b: end }),
        Tool::Circle => Some(Shape::Circle { center: anchor, rim: end }),
        Tool::Triangle => Some(Shape::Triangle {
            vertices: [
                Point::new((anchor.x + end.x) / 2.0, anchor.y),
                Point::new(anchor.x, end.y),
                Point::new(end.x, end.y),
            ],
        }),
        Tool::Pen | Tool::Text | Tool::Eraser => None,
    }
}
