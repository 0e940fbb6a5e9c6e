//! Browser binding: paints [`EngineCore`] frames onto a real `<canvas>`.
//!
//! Compiled only with the `web` feature. [`Engine`] owns the canvas element
//! and its 2D context, re-measures the container whenever the viewport is
//! stale, and renders into the context through the [`Surface`] impl below.
//! [`RenderLoop`] drives `Engine::render` from `requestAnimationFrame` and
//! cancels the pending frame when dropped.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::consts::{VIRTUAL_HEIGHT, VIRTUAL_WIDTH};
use crate::engine::EngineCore;
use crate::surface::{Surface, SurfaceError};
use crate::viewport::{ContainerRect, Measurement};

fn js_err(e: JsValue) -> SurfaceError {
    SurfaceError(format!("{e:?}"))
}

impl Surface for CanvasRenderingContext2d {
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), SurfaceError> {
        CanvasRenderingContext2d::set_transform(self, a, b, c, d, e, f).map_err(js_err)
    }

    fn save(&mut self) {
        CanvasRenderingContext2d::save(self);
    }

    fn restore(&mut self) {
        CanvasRenderingContext2d::restore(self);
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::clear_rect(self, x, y, w, h);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::fill_rect(self, x, y, w, h);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::stroke_rect(self, x, y, w, h);
    }

    fn set_fill_style(&mut self, color: &str) {
        self.set_fill_style_str(color);
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.set_stroke_style_str(color);
    }

    fn set_line_width(&mut self, width: f64) {
        CanvasRenderingContext2d::set_line_width(self, width);
    }

    fn set_line_cap(&mut self, cap: &str) {
        CanvasRenderingContext2d::set_line_cap(self, cap);
    }

    fn set_line_join(&mut self, join: &str) {
        CanvasRenderingContext2d::set_line_join(self, join);
    }

    fn set_line_dash(&mut self, segments: &[f64]) -> Result<(), SurfaceError> {
        let array: js_sys::Array = segments.iter().map(|s| JsValue::from_f64(*s)).collect();
        CanvasRenderingContext2d::set_line_dash(self, &array).map_err(js_err)
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        CanvasRenderingContext2d::set_global_alpha(self, alpha);
    }

    fn set_shadow(&mut self, color: &str, blur: f64) {
        self.set_shadow_color(color);
        self.set_shadow_blur(blur);
    }

    fn begin_path(&mut self) {
        CanvasRenderingContext2d::begin_path(self);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        CanvasRenderingContext2d::move_to(self, x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        CanvasRenderingContext2d::line_to(self, x, y);
    }

    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), SurfaceError> {
        CanvasRenderingContext2d::arc(self, x, y, radius, start, end).map_err(js_err)
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::rect(self, x, y, w, h);
    }

    fn close_path(&mut self) {
        CanvasRenderingContext2d::close_path(self);
    }

    fn fill(&mut self) {
        CanvasRenderingContext2d::fill(self);
    }

    fn stroke(&mut self) {
        CanvasRenderingContext2d::stroke(self);
    }

    fn clip(&mut self) {
        CanvasRenderingContext2d::clip(self);
    }

    fn set_font(&mut self, font: &str) {
        CanvasRenderingContext2d::set_font(self, font);
    }

    fn set_text_align(&mut self, align: &str) {
        CanvasRenderingContext2d::set_text_align(self, align);
    }

    fn set_text_baseline(&mut self, baseline: &str) {
        CanvasRenderingContext2d::set_text_baseline(self, baseline);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), SurfaceError> {
        CanvasRenderingContext2d::fill_text(self, text, x, y).map_err(js_err)
    }

    fn measure_text(&mut self, text: &str) -> Result<f64, SurfaceError> {
        CanvasRenderingContext2d::measure_text(self, text).map(|m| m.width()).map_err(js_err)
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| JsValue::from_str("2d context has unexpected type"))
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    pub core: EngineCore,
}

impl Engine {
    /// Bind an engine for `local_user_id` to `canvas`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement, local_user_id: &str) -> Result<Self, JsValue> {
        let ctx = context_2d(&canvas)?;
        Ok(Self { canvas, ctx, core: EngineCore::new(local_user_id) })
    }

    /// Measure the canvas's parent container and resize the backing store.
    pub fn measure(&mut self) -> Measurement {
        let target = self.canvas.parent_element().unwrap_or_else(|| self.canvas.clone().into());
        let rect = target.get_bounding_client_rect();
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let container = ContainerRect::new(rect.left(), rect.top(), rect.width(), rect.height());

        let measurement = self.core.measure(container, dpr);
        if let Measurement::Applied(viewport) = measurement {
            let (w, h) = viewport.backing_size();
            self.canvas.set_width(w);
            self.canvas.set_height(h);
        }
        measurement
    }

    /// Paint a frame if one is due, re-measuring first when the viewport is stale.
    pub fn render(&mut self, now_ms: f64) -> bool {
        if self.core.mapper.needs_measure() {
            self.measure();
        }
        self.core.render(&mut self.ctx, now_ms)
    }

    /// Render the board to an offscreen 1920x1080 canvas and return it as a
    /// PNG data URL.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offscreen canvas cannot be created or drawn.
    pub fn export_png(&self) -> Result<String, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")?
            .dyn_into()
            .map_err(|_| JsValue::from_str("created element is not a canvas"))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            canvas.set_width(VIRTUAL_WIDTH as u32);
            canvas.set_height(VIRTUAL_HEIGHT as u32);
        }
        let mut ctx = context_2d(&canvas)?;
        self.core.export(&mut ctx).map_err(|e| JsValue::from_str(&e.to_string()))?;
        canvas.to_data_url_with_type("image/png")
    }
}

/// Drives [`Engine::render`] once per animation frame until dropped.
pub struct RenderLoop {
    frame_id: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
}

impl RenderLoop {
    /// Start rendering `engine` on every animation frame.
    ///
    /// # Errors
    ///
    /// Returns `Err` if there is no window or the first frame cannot be requested.
    pub fn start(engine: Rc<RefCell<Engine>>) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let frame_id = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));

        let callback_for_cb = Rc::clone(&callback);
        let frame_id_for_cb = Rc::clone(&frame_id);
        let window_for_cb = window.clone();
        let cb = Closure::wrap(Box::new(move |ts: f64| {
            // Skip the frame rather than panic if an input handler holds the engine.
            if let Ok(mut engine) = engine.try_borrow_mut() {
                engine.render(ts);
            }
            frame_id_for_cb.set(None);
            if let Some(cb) = callback_for_cb.borrow().as_ref() {
                match window_for_cb.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(id) => frame_id_for_cb.set(Some(id)),
                    Err(e) => log::error!("requestAnimationFrame failed: {e:?}"),
                }
            }
        }) as Box<dyn FnMut(f64)>);

        let id = window.request_animation_frame(cb.as_ref().unchecked_ref())?;
        frame_id.set(Some(id));
        *callback.borrow_mut() = Some(cb);
        Ok(Self { frame_id, callback })
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let (Some(id), Some(window)) = (self.frame_id.take(), web_sys::window()) {
            if let Err(e) = window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame failed: {e:?}");
            }
        }
        // Breaks the closure's reference to itself.
        self.callback.borrow_mut().take();
    }
}
