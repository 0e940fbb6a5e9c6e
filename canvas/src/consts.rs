//! Shared numeric constants for the canvas crate.

// ── Virtual canvas ──────────────────────────────────────────────

/// Width of the fixed virtual drawing surface.
pub const VIRTUAL_WIDTH: f64 = 1920.0;

/// Height of the fixed virtual drawing surface.
pub const VIRTUAL_HEIGHT: f64 = 1080.0;

// ── Frame loop ──────────────────────────────────────────────────

/// Target frame budget in milliseconds (60 Hz).
pub const FRAME_BUDGET_MS: f64 = 1000.0 / 60.0;

/// Scheduler jitter tolerated before a frame counts as early.
pub const FRAME_SLACK_MS: f64 = 2.0;

// ── Viewport measurement ────────────────────────────────────────

/// Delay before re-measuring a container that reported a degenerate size.
pub const VIEWPORT_DEFER_MS: u32 = 100;

/// Re-measure schedule after a trigger that may resize the container silently.
pub const VIEWPORT_RETRY_DELAYS_MS: [u32; 3] = [0, 50, 150];

// ── Style ───────────────────────────────────────────────────────

/// Default stroke color for new elements.
pub const DEFAULT_STROKE_COLOR: &str = "#ffffff";

/// Default stroke width in virtual units.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Smallest stroke width the toolbar allows.
pub const MIN_STROKE_WIDTH: f64 = 1.0;

/// Largest stroke width the toolbar allows.
pub const MAX_STROKE_WIDTH: f64 = 20.0;

/// Opacity of the tint used to fill closed shapes (0x33 / 0xff).
pub const FILL_TINT_ALPHA: f64 = 0.2;

/// Text size is derived from stroke width, never smaller than this.
pub const MIN_FONT_SIZE: f64 = 12.0;

/// Text size per unit of stroke width.
pub const FONT_SIZE_PER_STROKE: f64 = 8.0;

/// Rough glyph advance as a fraction of font size, used for text hit boxes.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;

// ── Scene colors ────────────────────────────────────────────────

/// Letterbox bars around the virtual canvas.
pub const BACKGROUND_COLOR: &str = "#2a2a2a";

/// The virtual canvas itself.
pub const VIEWPORT_FILL_COLOR: &str = "#1a1a1a";

/// Outline of the virtual canvas.
pub const VIEWPORT_BORDER_COLOR: &str = "#444";

/// Background of exported images.
pub const EXPORT_BACKGROUND_COLOR: &str = "#ffffff";

// ── Overlays ────────────────────────────────────────────────────

/// Remote cursor dot radius in screen pixels.
pub const CURSOR_RADIUS_PX: f64 = 6.0;

/// Glow around a remote cursor dot in screen pixels.
pub const CURSOR_GLOW_PX: f64 = 8.0;

/// Cursor label font size at scale 1.
pub const CURSOR_LABEL_FONT_PX: f64 = 12.0;

/// Eraser indicator outline color.
pub const ERASER_INDICATOR_COLOR: &str = "#ff6b6b";

/// Eraser indicator dash length in screen pixels.
pub const ERASER_DASH_PX: f64 = 4.0;
