//! Engine core: everything the whiteboard canvas does that does not need a
//! browser.
//!
//! `EngineCore` folds store snapshots (elements, presence, cursors) into local
//! state, turns pointer events into [`Action`]s for the host to persist, and
//! paints frames onto any [`Surface`]. The host owns I/O: it writes committed
//! elements and deletes to the store, publishes cursor positions, and opens
//! the text prompt. Nothing here is optimistic; committed elements appear only
//! when they come back in the next element snapshot.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::doc::{
    DrawingElement, ElementDraft, ElementId, ElementStore, Peer, PeerStore, Shape, UserId, font_size_for_stroke,
};
use crate::erase::EraseEngine;
use crate::input::{Button, InputState, Tool, UiState, drag_shape};
use crate::render::{self, EraserIndicator, FrameClock, Scene};
use crate::surface::{Surface, SurfaceError};
use crate::viewport::{ContainerRect, Mapper, Measurement, Point, ViewportTrigger};

/// File name for a PNG export taken at `now_ms` (Unix milliseconds).
#[must_use]
pub fn export_file_name(now_ms: i64) -> String {
    format!("whiteboard-{now_ms}.png")
}

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Persist a new element authored by the local user.
    CommitElement(ElementDraft),
    /// Delete a persisted element (eraser hit).
    DeleteElement { id: ElementId },
    /// Publish the local cursor position, subject to the host's throttle.
    CursorMoved(Point),
    /// Ask the user for text to place at `at`, then call
    /// [`EngineCore::commit_text`].
    TextRequested { at: Point },
    /// Local state changed; schedule a frame.
    RenderNeeded,
}

/// Core engine state. Separated from the browser wrapper so it can be tested
/// without WASM.
pub struct EngineCore {
    pub elements: ElementStore,
    pub peers: PeerStore,
    pub mapper: Mapper,
    pub ui: UiState,
    pub input: InputState,
    eraser: EraseEngine,
    /// Last pointer position over the canvas, for the eraser indicator and
    /// for finishing shapes when the pointer leaves.
    hover: Option<Point>,
    local_user_id: UserId,
    can_edit: bool,
    frame: FrameClock,
}

impl EngineCore {
    /// A read-only engine for `local_user_id`. Editing is enabled once the
    /// host has resolved the user's role.
    #[must_use]
    pub fn new(local_user_id: impl Into<UserId>) -> Self {
        Self {
            elements: ElementStore::new(),
            peers: PeerStore::default(),
            mapper: Mapper::new(),
            ui: UiState::default(),
            input: InputState::Idle,
            eraser: EraseEngine::new(),
            hover: None,
            local_user_id: local_user_id.into(),
            can_edit: false,
            frame: FrameClock::new(),
        }
    }

    #[must_use]
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    // --- Data inputs ---

    /// Replace all elements with a store snapshot.
    pub fn apply_element_snapshot(&mut self, elements: Vec<DrawingElement>) {
        self.elements.load_snapshot(elements);
        self.frame.mark_dirty();
    }

    /// Replace the online-user list.
    pub fn apply_presence_snapshot(&mut self, peers: impl IntoIterator<Item = (UserId, Peer)>) {
        self.peers.load_presence(peers);
        self.frame.mark_dirty();
    }

    /// Replace remote cursor positions. The local user's own cursor is dropped.
    pub fn apply_cursor_snapshot(&mut self, cursors: impl IntoIterator<Item = (UserId, Point)>) {
        self.peers.load_cursors(cursors, &self.local_user_id);
        self.frame.mark_dirty();
    }

    /// Grant or revoke drawing rights. Revoking abandons any gesture in
    /// progress without committing it.
    pub fn set_can_edit(&mut self, can_edit: bool) {
        if self.can_edit && !can_edit {
            self.input = InputState::Idle;
            self.eraser.finish();
        }
        self.can_edit = can_edit;
        self.frame.mark_dirty();
    }

    #[must_use]
    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    // --- Toolbar ---

    /// Switch tools. A shape already being dragged keeps the tool it started with.
    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.frame.mark_dirty();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.ui.color = color.into();
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.ui.set_stroke_width(width);
        self.frame.mark_dirty();
    }

    pub fn set_fill(&mut self, fill: bool) {
        self.ui.fill = fill;
    }

    // --- Viewport ---

    /// Mark the viewport stale. Returns the delays (ms) at which the host
    /// should call [`Self::measure`].
    pub fn invalidate_viewport(&mut self, trigger: ViewportTrigger) -> &'static [u32] {
        self.mapper.invalidate(trigger)
    }

    /// Measure the container and refit the viewport.
    pub fn measure(&mut self, container: ContainerRect, dpr: f64) -> Measurement {
        let measurement = self.mapper.measure(container, dpr);
        if matches!(measurement, Measurement::Applied(_)) {
            self.frame.mark_dirty();
        }
        measurement
    }

    // --- Input events ---

    /// Pointer pressed at client coordinates.
    pub fn on_pointer_down(&mut self, client_x: f64, client_y: f64, button: Button) -> Vec<Action> {
        let Some(at) = self.mapper.screen_to_virtual(client_x, client_y) else {
            return Vec::new();
        };
        self.hover = Some(at);
        if !self.can_edit || button != Button::Primary {
            return Vec::new();
        }

        match self.ui.tool {
            Tool::Pen => {
                self.input = InputState::DrawingPen { points: vec![at] };
                self.render_needed()
            }
            tool @ (Tool::Line | Tool::Rectangle | Tool::Circle | Tool::Triangle) => {
                self.input = InputState::DrawingShape { tool, anchor: at, last: at };
                self.render_needed()
            }
            Tool::Text => {
                self.input = InputState::Idle;
                vec![Action::TextRequested { at }]
            }
            Tool::Eraser => {
                self.input = InputState::Erasing;
                self.eraser.begin();
                let mut actions = self.erase_at(at);
                actions.push(self.mark_dirty());
                actions
            }
        }
    }

    /// Pointer moved at client coordinates. Always reports the cursor.
    pub fn on_pointer_move(&mut self, client_x: f64, client_y: f64) -> Vec<Action> {
        let Some(at) = self.mapper.screen_to_virtual(client_x, client_y) else {
            return Vec::new();
        };
        self.hover = Some(at);
        let mut actions = vec![Action::CursorMoved(at)];

        let changed = match &mut self.input {
            // Only the eraser outline follows an idle pointer.
            InputState::Idle => self.ui.tool == Tool::Eraser,
            InputState::DrawingPen { points } => {
                points.push(at);
                true
            }
            InputState::DrawingShape { last, .. } => {
                *last = at;
                true
            }
            InputState::Erasing => true,
        };
        if self.input == InputState::Erasing {
            actions.extend(self.erase_at(at));
        }
        if changed {
            actions.push(self.mark_dirty());
        }
        actions
    }

    /// Pointer released at client coordinates.
    pub fn on_pointer_up(&mut self, client_x: f64, client_y: f64, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let at = self.mapper.screen_to_virtual(client_x, client_y);
        if at.is_some() {
            self.hover = at;
        }
        self.finish_gesture(at)
    }

    /// Pointer left the canvas. A pen stroke in progress is committed; a
    /// shape drag is abandoned.
    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        let mut actions = self.finish_gesture(None);
        if self.hover.take().is_some() && actions.is_empty() {
            actions.push(self.mark_dirty());
        }
        actions
    }

    /// Place text chosen in response to [`Action::TextRequested`]. Blank text
    /// commits nothing.
    pub fn commit_text(&mut self, at: Point, text: &str) -> Vec<Action> {
        if !self.can_edit || text.trim().is_empty() {
            return Vec::new();
        }
        let shape = Shape::Text {
            anchor: at.clamp_to_canvas(),
            text: text.to_owned(),
            font_size: font_size_for_stroke(self.ui.stroke_width()),
        };
        vec![Action::CommitElement(ElementDraft { shape, style: self.ui.style() })]
    }

    fn finish_gesture(&mut self, at: Option<Point>) -> Vec<Action> {
        let style = self.ui.style();
        let draft = match std::mem::take(&mut self.input) {
            InputState::Idle => return Vec::new(),
            InputState::Erasing => {
                let erased = self.eraser.finish();
                log::debug!("erase gesture finished: {erased} elements");
                None
            }
            InputState::DrawingPen { points } => Some(ElementDraft { shape: Shape::Pen { points }, style }),
            InputState::DrawingShape { tool, anchor, .. } => {
                at.and_then(|end| drag_shape(tool, anchor, end)).map(|shape| ElementDraft { shape, style })
            }
        };

        let mut actions = Vec::new();
        if let Some(draft) = draft.filter(|d| !d.shape.is_degenerate()) {
            actions.push(Action::CommitElement(draft));
        }
        actions.push(self.mark_dirty());
        actions
    }

    fn erase_at(&mut self, at: Point) -> Vec<Action> {
        let radius = self.ui.eraser_radius();
        self.eraser
            .extend(at, &self.elements, radius)
            .into_iter()
            .map(|id| Action::DeleteElement { id })
            .collect()
    }

    fn mark_dirty(&mut self) -> Action {
        self.frame.mark_dirty();
        Action::RenderNeeded
    }

    fn render_needed(&mut self) -> Vec<Action> {
        vec![self.mark_dirty()]
    }

    // --- Render ---

    /// The in-progress element, if a gesture is active.
    #[must_use]
    pub fn preview(&self) -> Option<ElementDraft> {
        let style = self.ui.style();
        match &self.input {
            InputState::DrawingPen { points } => Some(ElementDraft { shape: Shape::Pen { points: points.clone() }, style }),
            InputState::DrawingShape { tool, anchor, last } => {
                drag_shape(*tool, *anchor, *last).map(|shape| ElementDraft { shape, style })
            }
            InputState::Idle | InputState::Erasing => None,
        }
    }

    /// The eraser outline, when the eraser is the active tool and the pointer
    /// is over the canvas.
    #[must_use]
    pub fn eraser_indicator(&self) -> Option<EraserIndicator> {
        if self.ui.tool != Tool::Eraser || !self.can_edit {
            return None;
        }
        self.hover.map(|at| EraserIndicator { at, radius: self.ui.eraser_radius() })
    }

    /// Force the next eligible frame to paint.
    pub fn request_render(&mut self) {
        self.frame.mark_dirty();
    }

    /// Paint a frame if one is due at `now_ms`. Returns whether anything was
    /// painted. Surface failures are logged and leave the frame dirty.
    pub fn render(&mut self, surface: &mut dyn Surface, now_ms: f64) -> bool {
        let Some(viewport) = self.mapper.viewport().copied() else {
            return false;
        };
        if !self.frame.begin_frame(now_ms) {
            return false;
        }
        let preview = self.preview();
        let scene = Scene {
            elements: &self.elements,
            preview: preview.as_ref(),
            peers: &self.peers,
            eraser: self.eraser_indicator(),
        };
        match render::draw(surface, &viewport, &scene) {
            Ok(()) => true,
            Err(e) => {
                log::error!("render failed: {e}");
                self.frame.mark_dirty();
                false
            }
        }
    }

    /// Paint the board for PNG export.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any surface call fails.
    pub fn export(&self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        render::draw_export(surface, &self.elements)
    }
}
