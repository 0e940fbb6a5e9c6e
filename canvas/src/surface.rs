//! Drawing surface abstraction.
//!
//! [`Surface`] mirrors the subset of the `Canvas2D` API the renderer uses, so
//! [`crate::render`] can paint into a real `CanvasRenderingContext2d` (see the
//! `web` feature) or into a [`RecordingSurface`] that keeps the call list for
//! inspection. Calls that can fail on the real context return
//! `Result<(), SurfaceError>`; state setters cannot fail.

use crate::consts::TEXT_ADVANCE_RATIO;

/// A drawing call rejected by the underlying context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("canvas call failed: {0}")]
pub struct SurfaceError(pub String);

/// Immediate-mode 2D drawing target.
pub trait Surface {
    /// Replace the current transform with `[a b c d e f]`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the context rejects the matrix.
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), SurfaceError>;
    fn save(&mut self);
    fn restore(&mut self);

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    fn set_fill_style(&mut self, color: &str);
    fn set_stroke_style(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_line_cap(&mut self, cap: &str);
    fn set_line_join(&mut self, join: &str);
    /// Set the dash pattern; an empty slice means solid.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the context rejects the pattern.
    fn set_line_dash(&mut self, segments: &[f64]) -> Result<(), SurfaceError>;
    fn set_global_alpha(&mut self, alpha: f64);
    fn set_shadow(&mut self, color: &str, blur: f64);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    /// Add a circular arc to the current path.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] for a negative radius.
    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), SurfaceError>;
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);
    fn clip(&mut self);

    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: &str);
    fn set_text_baseline(&mut self, baseline: &str);
    /// Paint `text` at `(x, y)` with the current fill style.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the context rejects the call.
    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), SurfaceError>;
    /// Width of `text` in the current font.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the context cannot measure.
    fn measure_text(&mut self, text: &str) -> Result<f64, SurfaceError>;
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    SetTransform([f64; 6]),
    Save,
    Restore,
    ClearRect(f64, f64, f64, f64),
    FillRect(f64, f64, f64, f64),
    StrokeRect(f64, f64, f64, f64),
    FillStyle(String),
    StrokeStyle(String),
    LineWidth(f64),
    LineCap(String),
    LineJoin(String),
    LineDash(Vec<f64>),
    GlobalAlpha(f64),
    Shadow(String, f64),
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Arc { x: f64, y: f64, radius: f64 },
    Rect(f64, f64, f64, f64),
    ClosePath,
    Fill,
    Stroke,
    Clip,
    Font(String),
    TextAlign(String),
    TextBaseline(String),
    FillText(String, f64, f64),
}

/// Headless surface that records every call. Text is measured with a fixed
/// advance per character derived from the last font size set.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<Op>,
    font_px: f64,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Count calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    /// All text painted, in order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::FillText(text, _, _) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), SurfaceError> {
        self.ops.push(Op::SetTransform([a, b, c, d, e, f]));
        Ok(())
    }

    fn save(&mut self) {
        self.ops.push(Op::Save);
    }

    fn restore(&mut self) {
        self.ops.push(Op::Restore);
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(Op::ClearRect(x, y, w, h));
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(Op::FillRect(x, y, w, h));
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(Op::StrokeRect(x, y, w, h));
    }

    fn set_fill_style(&mut self, color: &str) {
        self.ops.push(Op::FillStyle(color.to_owned()));
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.ops.push(Op::StrokeStyle(color.to_owned()));
    }

    fn set_line_width(&mut self, width: f64) {
        self.ops.push(Op::LineWidth(width));
    }

    fn set_line_cap(&mut self, cap: &str) {
        self.ops.push(Op::LineCap(cap.to_owned()));
    }

    fn set_line_join(&mut self, join: &str) {
        self.ops.push(Op::LineJoin(join.to_owned()));
    }

    fn set_line_dash(&mut self, segments: &[f64]) -> Result<(), SurfaceError> {
        self.ops.push(Op::LineDash(segments.to_vec()));
        Ok(())
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.ops.push(Op::GlobalAlpha(alpha));
    }

    fn set_shadow(&mut self, color: &str, blur: f64) {
        self.ops.push(Op::Shadow(color.to_owned(), blur));
    }

    fn begin_path(&mut self) {
        self.ops.push(Op::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::LineTo(x, y));
    }

    fn arc(&mut self, x: f64, y: f64, radius: f64, _start: f64, _end: f64) -> Result<(), SurfaceError> {
        if radius < 0.0 {
            return Err(SurfaceError(format!("negative radius {radius}")));
        }
        self.ops.push(Op::Arc { x, y, radius });
        Ok(())
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(Op::Rect(x, y, w, h));
    }

    fn close_path(&mut self) {
        self.ops.push(Op::ClosePath);
    }

    fn fill(&mut self) {
        self.ops.push(Op::Fill);
    }

    fn stroke(&mut self) {
        self.ops.push(Op::Stroke);
    }

    fn clip(&mut self) {
        self.ops.push(Op::Clip);
    }

    fn set_font(&mut self, font: &str) {
        self.font_px = font_px(font).unwrap_or(10.0);
        self.ops.push(Op::Font(font.to_owned()));
    }

    fn set_text_align(&mut self, align: &str) {
        self.ops.push(Op::TextAlign(align.to_owned()));
    }

    fn set_text_baseline(&mut self, baseline: &str) {
        self.ops.push(Op::TextBaseline(baseline.to_owned()));
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), SurfaceError> {
        self.ops.push(Op::FillText(text.to_owned(), x, y));
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> Result<f64, SurfaceError> {
        #[allow(clippy::cast_precision_loss)]
        let chars = text.chars().count() as f64;
        Ok(chars * self.font_px * TEXT_ADVANCE_RATIO)
    }
}

/// Pixel size from a CSS font shorthand such as `"bold 12px sans-serif"`.
fn font_px(font: &str) -> Option<f64> {
    for part in font.split_whitespace() {
        if let Some(Ok(px)) = part.strip_suffix("px").map(str::parse::<f64>) {
            return Some(px);
        }
    }
    None
}
