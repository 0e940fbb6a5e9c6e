//! Rendering: paints the board scene onto a [`Surface`].
//!
//! The renderer receives read-only views of element, peer and preview state
//! plus the fitted [`Viewport`], and produces drawing calls. It never mutates
//! application state. Every frame is a full repaint in fixed layers:
//!
//! 1. Background over the whole container, then the virtual canvas rect with
//!    its border (CSS pixel space).
//! 2. Persisted elements in timestamp order, then the local preview, clipped
//!    to the canvas rect (virtual space, scaled by the viewport).
//! 3. Remote cursors and the eraser indicator (CSS pixel space, so labels
//!    keep a constant on-screen size).
//!
//! All fallible surface calls propagate via `Result<(), SurfaceError>`. The
//! top-level caller ([`crate::engine::EngineCore::render`]) logs the failure.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::f64::consts::TAU;

use crate::consts::{
    BACKGROUND_COLOR, CURSOR_GLOW_PX, CURSOR_LABEL_FONT_PX, CURSOR_RADIUS_PX, ERASER_DASH_PX, ERASER_INDICATOR_COLOR,
    EXPORT_BACKGROUND_COLOR, FILL_TINT_ALPHA, FRAME_BUDGET_MS, FRAME_SLACK_MS, VIEWPORT_BORDER_COLOR,
    VIEWPORT_FILL_COLOR, VIRTUAL_HEIGHT, VIRTUAL_WIDTH,
};
use crate::doc::{ElementDraft, ElementStore, PeerStore, Shape, Style};
use crate::surface::{Surface, SurfaceError};
use crate::viewport::{Point, Viewport};

/// Eraser outline shown under the pointer while the eraser tool is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EraserIndicator {
    /// Pointer position in virtual space.
    pub at: Point,
    /// Erase radius in virtual units.
    pub radius: f64,
}

/// Everything one frame paints.
pub struct Scene<'a> {
    pub elements: &'a ElementStore,
    pub preview: Option<&'a ElementDraft>,
    pub peers: &'a PeerStore,
    pub eraser: Option<EraserIndicator>,
}

/// Draw a full frame.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn draw(surface: &mut dyn Surface, viewport: &Viewport, scene: &Scene<'_>) -> Result<(), SurfaceError> {
    let dpr = viewport.dpr;
    let (cw, ch) = (viewport.container.width, viewport.container.height);

    // Layer 1: background and canvas frame.
    surface.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    surface.clear_rect(0.0, 0.0, cw, ch);
    surface.set_fill_style(BACKGROUND_COLOR);
    surface.fill_rect(0.0, 0.0, cw, ch);

    let (x, y, w, h) = viewport.canvas_rect();
    surface.set_fill_style(VIEWPORT_FILL_COLOR);
    surface.fill_rect(x, y, w, h);
    surface.set_stroke_style(VIEWPORT_BORDER_COLOR);
    surface.set_line_width(1.0);
    surface.stroke_rect(x, y, w, h);

    // Layer 2: elements in virtual space.
    surface.save();
    let s = dpr * viewport.scale;
    surface.set_transform(s, 0.0, 0.0, s, dpr * viewport.offset_x, dpr * viewport.offset_y)?;
    surface.begin_path();
    surface.rect(0.0, 0.0, VIRTUAL_WIDTH, VIRTUAL_HEIGHT);
    surface.clip();

    for element in scene.elements.iter() {
        draw_shape(surface, &element.shape, &element.style)?;
    }
    if let Some(preview) = scene.preview {
        draw_shape(surface, &preview.shape, &preview.style)?;
    }
    surface.restore();

    // Layer 3: overlays in CSS pixel space.
    surface.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    for (_, peer, at) in scene.peers.visible_cursors() {
        draw_cursor(surface, viewport.virtual_to_canvas(at), &peer.name, &peer.color)?;
    }
    if let Some(eraser) = scene.eraser {
        draw_eraser_indicator(surface, viewport, eraser)?;
    }

    Ok(())
}

/// Paint the board for export: white background, native 1920x1080
/// resolution, elements only.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn draw_export(surface: &mut dyn Surface, elements: &ElementStore) -> Result<(), SurfaceError> {
    surface.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
    surface.set_fill_style(EXPORT_BACKGROUND_COLOR);
    surface.fill_rect(0.0, 0.0, VIRTUAL_WIDTH, VIRTUAL_HEIGHT);
    for element in elements.iter() {
        draw_shape(surface, &element.shape, &element.style)?;
    }
    Ok(())
}

// =============================================================
// Shape renderers
// =============================================================

fn draw_shape(surface: &mut dyn Surface, shape: &Shape, style: &Style) -> Result<(), SurfaceError> {
    surface.save();
    surface.set_stroke_style(&style.color);
    surface.set_fill_style(&style.color);
    surface.set_line_width(style.stroke_width);
    surface.set_line_cap("round");
    surface.set_line_join("round");

    match shape {
        Shape::Pen { points } => draw_pen(surface, points, style)?,
        Shape::Line { from, to } => {
            surface.begin_path();
            surface.move_to(from.x, from.y);
            surface.line_to(to.x, to.y);
            surface.stroke();
        }
        Shape::Rectangle { corner_a, corner_b } => {
            let x = corner_a.x.min(corner_b.x);
            let y = corner_a.y.min(corner_b.y);
            surface.begin_path();
            surface.rect(x, y, (corner_b.x - corner_a.x).abs(), (corner_b.y - corner_a.y).abs());
            fill_and_stroke(surface, style);
        }
        Shape::Circle { center, rim } => {
            surface.begin_path();
            surface.arc(center.x, center.y, center.distance_to(*rim), 0.0, TAU)?;
            fill_and_stroke(surface, style);
        }
        Shape::Triangle { vertices: [a, b, c] } => {
            surface.begin_path();
            surface.move_to(a.x, a.y);
            surface.line_to(b.x, b.y);
            surface.line_to(c.x, c.y);
            surface.close_path();
            fill_and_stroke(surface, style);
        }
        Shape::Text { anchor, text, font_size } => {
            surface.set_font(&format!("{font_size}px sans-serif"));
            surface.set_text_align("left");
            surface.set_text_baseline("top");
            surface.fill_text(text, anchor.x, anchor.y)?;
        }
    }

    surface.restore();
    Ok(())
}

fn draw_pen(surface: &mut dyn Surface, points: &[Point], style: &Style) -> Result<(), SurfaceError> {
    match points {
        [] => {}
        [dot] => {
            // A click without movement still leaves a mark.
            surface.begin_path();
            surface.arc(dot.x, dot.y, style.stroke_width / 2.0, 0.0, TAU)?;
            surface.fill();
        }
        [first, rest @ ..] => {
            surface.begin_path();
            surface.move_to(first.x, first.y);
            for p in rest {
                surface.line_to(p.x, p.y);
            }
            surface.stroke();
        }
    }
    Ok(())
}

fn fill_and_stroke(surface: &mut dyn Surface, style: &Style) {
    if style.fill {
        surface.set_global_alpha(FILL_TINT_ALPHA);
        surface.fill();
        surface.set_global_alpha(1.0);
    }
    surface.stroke();
}

// =============================================================
// Overlays
// =============================================================

fn draw_cursor(surface: &mut dyn Surface, at: Point, name: &str, color: &str) -> Result<(), SurfaceError> {
    surface.save();

    surface.set_shadow(color, CURSOR_GLOW_PX);
    surface.set_fill_style(color);
    surface.begin_path();
    surface.arc(at.x, at.y, CURSOR_RADIUS_PX, 0.0, TAU)?;
    surface.fill();
    surface.set_shadow("transparent", 0.0);

    surface.set_font(&format!("{CURSOR_LABEL_FONT_PX}px sans-serif"));
    surface.set_text_align("left");
    surface.set_text_baseline("alphabetic");
    let text_w = surface.measure_text(name)?;
    surface.set_fill_style("rgba(0, 0, 0, 0.8)");
    surface.fill_rect(at.x + 10.0, at.y - 20.0, text_w + 8.0, CURSOR_LABEL_FONT_PX + 4.0);
    surface.set_fill_style("#ffffff");
    surface.fill_text(name, at.x + 14.0, at.y - 8.0)?;

    surface.restore();
    Ok(())
}

fn draw_eraser_indicator(
    surface: &mut dyn Surface,
    viewport: &Viewport,
    eraser: EraserIndicator,
) -> Result<(), SurfaceError> {
    let center = viewport.virtual_to_canvas(eraser.at);
    surface.save();
    surface.set_global_alpha(0.8);
    surface.set_stroke_style(ERASER_INDICATOR_COLOR);
    surface.set_line_width(2.0);
    surface.set_line_dash(&[ERASER_DASH_PX, ERASER_DASH_PX])?;
    surface.begin_path();
    surface.arc(center.x, center.y, viewport.virtual_len_to_canvas(eraser.radius), 0.0, TAU)?;
    surface.stroke();
    surface.restore();
    Ok(())
}

// =============================================================
// Frame pacing
// =============================================================

/// Gates repaints: at most one per display frame, and only when something
/// changed since the last one.
#[derive(Debug)]
pub struct FrameClock {
    dirty: bool,
    last_frame_ms: Option<f64>,
}

impl FrameClock {
    /// A clock that paints on its first frame.
    #[must_use]
    pub fn new() -> Self {
        Self { dirty: true, last_frame_ms: None }
    }

    /// Request a repaint on the next eligible frame.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns true when the caller should paint now. Consumes the dirty flag.
    pub fn begin_frame(&mut self, now_ms: f64) -> bool {
        if !self.dirty {
            return false;
        }
        if let Some(last) = self.last_frame_ms
            && now_ms - last < FRAME_BUDGET_MS - FRAME_SLACK_MS
        {
            return false;
        }
        self.dirty = false;
        self.last_frame_ms = Some(now_ms);
        true
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
