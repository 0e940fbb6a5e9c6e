//! Letterboxed mapping between device pixels and the fixed virtual canvas.
//!
//! The board is drawn on a 1920×1080 virtual surface. Each viewer fits that
//! surface into whatever container the host gives it, preserving aspect ratio
//! and centering it, so one axis usually ends up with empty bars. Everything
//! that is stored or sent over the wire is in virtual space; screen space only
//! exists between the pointer event and the mapper, and between the mapper and
//! the surface.
//!
//! Containers are not always measurable. Layout may not have settled yet, or
//! the host view may be hidden (a backgrounded mobile app reports zero size).
//! [`Mapper`] therefore never divides by a degenerate size: the measurement is
//! deferred and the previous viewport, if any, stays in use.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::consts::{VIEWPORT_DEFER_MS, VIEWPORT_RETRY_DELAYS_MS, VIRTUAL_HEIGHT, VIRTUAL_WIDTH};

/// A point. In virtual space unless a function says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Clamp into `[0, VIRTUAL_WIDTH] × [0, VIRTUAL_HEIGHT]`.
    #[must_use]
    pub fn clamp_to_canvas(self) -> Self {
        Self { x: self.x.clamp(0.0, VIRTUAL_WIDTH), y: self.y.clamp(0.0, VIRTUAL_HEIGHT) }
    }

    /// Whether both coordinates are finite and inside the virtual canvas.
    #[must_use]
    pub fn is_on_canvas(self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=VIRTUAL_WIDTH).contains(&self.x)
            && (0.0..=VIRTUAL_HEIGHT).contains(&self.y)
    }
}

/// The host container's bounding rectangle in client (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// A container that can be fitted: positive, finite size.
    #[must_use]
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A fitted viewport: where the virtual canvas sits inside the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Container the fit was computed for.
    pub container: ContainerRect,
    /// Device pixels per CSS pixel; sizes the backing store only.
    pub dpr: f64,
    /// CSS pixels per virtual unit, identical on both axes.
    pub scale: f64,
    /// Horizontal letterbox bar width in CSS pixels.
    pub offset_x: f64,
    /// Vertical letterbox bar height in CSS pixels.
    pub offset_y: f64,
}

impl Viewport {
    /// Fit the virtual canvas into `container`. Returns `None` when the
    /// container has no usable size.
    #[must_use]
    pub fn fit(container: ContainerRect, dpr: f64) -> Option<Self> {
        if !container.is_measurable() {
            return None;
        }
        let container_aspect = container.width / container.height;
        let virtual_aspect = VIRTUAL_WIDTH / VIRTUAL_HEIGHT;

        let (scale, offset_x, offset_y) = if container_aspect > virtual_aspect {
            // Height-constrained: bars left and right.
            let scale = container.height / VIRTUAL_HEIGHT;
            (scale, (container.width - VIRTUAL_WIDTH * scale) / 2.0, 0.0)
        } else {
            // Width-constrained: bars top and bottom.
            let scale = container.width / VIRTUAL_WIDTH;
            (scale, 0.0, (container.height - VIRTUAL_HEIGHT * scale) / 2.0)
        };

        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        Some(Self { container, dpr, scale, offset_x, offset_y })
    }

    /// Convert a client-space pointer position to virtual space.
    ///
    /// Out-of-bounds input is clamped onto the canvas edge, never rejected, so
    /// fast strokes that overshoot the canvas keep their last points.
    #[must_use]
    pub fn screen_to_virtual(&self, client_x: f64, client_y: f64) -> Point {
        let local_x = client_x - self.container.left;
        let local_y = client_y - self.container.top;
        Point::new((local_x - self.offset_x) / self.scale, (local_y - self.offset_y) / self.scale).clamp_to_canvas()
    }

    /// Convert a virtual point to client space. Not clamped.
    #[must_use]
    pub fn virtual_to_screen(&self, point: Point) -> Point {
        let local = self.virtual_to_canvas(point);
        Point::new(local.x + self.container.left, local.y + self.container.top)
    }

    /// Convert a virtual point to container-local CSS pixels, the space the
    /// renderer draws in. Not clamped.
    #[must_use]
    pub fn virtual_to_canvas(&self, point: Point) -> Point {
        Point::new(point.x * self.scale + self.offset_x, point.y * self.scale + self.offset_y)
    }

    /// Scale a virtual length (stroke width, radius) to CSS pixels.
    #[must_use]
    pub fn virtual_len_to_canvas(&self, len: f64) -> f64 {
        len * self.scale
    }

    /// The virtual canvas rectangle in container-local CSS pixels:
    /// `(x, y, width, height)`.
    #[must_use]
    pub fn canvas_rect(&self) -> (f64, f64, f64, f64) {
        (self.offset_x, self.offset_y, VIRTUAL_WIDTH * self.scale, VIRTUAL_HEIGHT * self.scale)
    }

    /// Backing-store size in device pixels, rounded.
    #[must_use]
    pub fn backing_size(&self) -> (u32, u32) {
        (to_device_px(self.container.width * self.dpr), to_device_px(self.container.height * self.dpr))
    }

    /// Identity fit used for export: the container *is* the virtual canvas.
    #[must_use]
    pub fn native() -> Self {
        Self {
            container: ContainerRect::new(0.0, 0.0, VIRTUAL_WIDTH, VIRTUAL_HEIGHT),
            dpr: 1.0,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_device_px(css: f64) -> u32 {
    css.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Host events after which the container may have changed size without a
/// resize notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportTrigger {
    /// First attach of the canvas.
    Mount,
    /// Window or container resize.
    Resize,
    /// Device orientation change.
    OrientationChange,
    /// Page became visible again.
    VisibilityRestored,
    /// Window regained focus.
    FocusReturned,
    /// Page restored from the back/forward cache.
    PageShow,
    /// A touch gesture started; mobile browsers resize silently around these.
    TouchStart,
}

impl ViewportTrigger {
    /// Delays (ms) at which the host should re-measure after this trigger.
    #[must_use]
    pub fn retry_delays_ms(self) -> &'static [u32] {
        match self {
            Self::Mount | Self::TouchStart => &[0],
            Self::Resize | Self::OrientationChange | Self::FocusReturned => &VIEWPORT_RETRY_DELAYS_MS,
            Self::VisibilityRestored => &[100, 300, 600],
            Self::PageShow => &[200],
        }
    }
}

/// Outcome of feeding a container measurement to the [`Mapper`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// The viewport was (re)fitted.
    Applied(Viewport),
    /// The container was degenerate; measure again after `retry_in_ms`.
    Deferred { retry_in_ms: u32 },
}

/// Owns the current viewport and whether it needs re-measuring.
#[derive(Debug, Clone)]
pub struct Mapper {
    viewport: Option<Viewport>,
    stale: bool,
}

impl Mapper {
    #[must_use]
    pub fn new() -> Self {
        Self { viewport: None, stale: true }
    }

    /// The last good viewport, if the container was ever measurable.
    #[must_use]
    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    /// Whether the host should measure the container again.
    #[must_use]
    pub fn needs_measure(&self) -> bool {
        self.stale || self.viewport.is_none()
    }

    /// Mark the viewport stale and return the host's re-measure schedule.
    pub fn invalidate(&mut self, trigger: ViewportTrigger) -> &'static [u32] {
        self.stale = true;
        trigger.retry_delays_ms()
    }

    /// Feed a fresh container measurement.
    pub fn measure(&mut self, container: ContainerRect, dpr: f64) -> Measurement {
        match Viewport::fit(container, dpr) {
            Some(viewport) => {
                self.viewport = Some(viewport);
                self.stale = false;
                Measurement::Applied(viewport)
            }
            None => {
                self.stale = true;
                log::debug!("container not measurable ({}x{}); deferring", container.width, container.height);
                Measurement::Deferred { retry_in_ms: VIEWPORT_DEFER_MS }
            }
        }
    }

    /// Map a client-space pointer position, if a viewport exists.
    /// `None` before the first good measurement, or when the client
    /// coordinates are not numbers.
    #[must_use]
    pub fn screen_to_virtual(&self, client_x: f64, client_y: f64) -> Option<Point> {
        self.viewport.map(|v| v.screen_to_virtual(client_x, client_y)).filter(|p| p.is_on_canvas())
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}
