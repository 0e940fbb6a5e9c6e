//! Board session: the lifecycle state machine that connects one canvas
//! engine to one board in the document store.
//!
//! DESIGN
//! ======
//! `uninitialized -> joining -> active -> left`. Joining resolves the board
//! from the launch target, writes the caller's presence record and opens four
//! live feeds (board document, elements, online presence, cursors). While
//! active, a heartbeat keeps the caller's presence lease fresh and a sweep
//! flips lapsed leases offline. Every feed and timer is owned by the
//! session's [`TaskArena`], so leaving (or dropping the session) cancels all
//! of them.
//!
//! The engine is the single piece of local board state. Feeds fold snapshots
//! into it; pointer events go through the session, which forwards them to the
//! engine and persists the resulting actions. Store writes are spawned and
//! never awaited by the pointer path, so input and rendering never wait on the
//! store.
//!
//! ERROR HANDLING
//! ==============
//! Join and admin operations return errors to the caller. Failures of
//! background writes (element commits, deletes, cursor and presence updates,
//! sweeps) are logged and dropped; the next gesture or tick writes equivalent
//! state again.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canvas::doc::DrawingElement;
use canvas::engine::{Action, EngineCore};
use canvas::input::Button;
use canvas::surface::{Surface, SurfaceError};
use canvas::viewport::Point;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::board::{self, Access, Board, BoardError, RoleLabel};
use crate::clock::unix_ms;
use crate::config::SessionConfig;
use crate::error::ErrorCode;
use crate::identity::Identity;
use crate::launch::LaunchTarget;
use crate::presence::{self, CursorRecord, PresenceRecord};
use crate::store::{DocumentStore, StoreError, Subscription, Target, paths};
use crate::tasks::TaskArena;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Joining,
    Active,
    Left,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Left => "left",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session is {actual}, expected {expected}")]
    Phase { expected: SessionPhase, actual: SessionPhase },
    #[error("session has no board")]
    NoBoard,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Board(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Phase { .. } => "E_SESSION_PHASE",
            Self::NoBoard => "E_NO_BOARD",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Board(e) => e.retryable(),
            Self::Store(e) => e.retryable(),
            Self::Phase { .. } | Self::NoBoard => false,
        }
    }
}

/// Everything a session needs from its surroundings.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Identity,
    pub config: SessionConfig,
}

/// One row of the users panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub role: RoleLabel,
    pub is_editor: bool,
}

type SharedEngine = Arc<Mutex<EngineCore>>;

fn lock(engine: &Mutex<EngineCore>) -> MutexGuard<'_, EngineCore> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SESSION
// =============================================================================

pub struct BoardSession {
    ctx: SessionContext,
    phase: SessionPhase,
    engine: SharedEngine,
    board: Arc<watch::Sender<Option<Board>>>,
    board_id: Option<String>,
    tasks: TaskArena,
    writes: JoinSet<()>,
    last_cursor_write: Option<Instant>,
    exports: broadcast::Sender<()>,
}

impl BoardSession {
    #[must_use]
    pub fn new(ctx: SessionContext) -> Self {
        let engine = Arc::new(Mutex::new(EngineCore::new(ctx.identity.user_id.clone())));
        let (board, _) = watch::channel(None);
        let (exports, _) = broadcast::channel(4);
        Self {
            ctx,
            phase: SessionPhase::Uninitialized,
            engine,
            board: Arc::new(board),
            board_id: None,
            tasks: TaskArena::new(),
            writes: JoinSet::new(),
            last_cursor_write: None,
            exports,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.ctx.identity
    }

    /// The engine, for toolbar, viewport and render calls. Pointer events
    /// must go through the session so their actions are persisted.
    pub fn engine(&self) -> MutexGuard<'_, EngineCore> {
        lock(&self.engine)
    }

    /// The board as of the latest board-document snapshot.
    #[must_use]
    pub fn board(&self) -> Option<Board> {
        self.board.borrow().clone()
    }

    /// Watch the board document.
    #[must_use]
    pub fn watch_board(&self) -> watch::Receiver<Option<Board>> {
        self.board.subscribe()
    }

    #[must_use]
    pub fn access(&self) -> Access {
        match self.board.borrow().as_ref() {
            Some(board) => board.access(&self.ctx.identity.user_id),
            None => Access { is_admin: false, is_editor: false },
        }
    }

    #[must_use]
    pub fn share_link(&self) -> Option<String> {
        self.board
            .borrow()
            .as_ref()
            .map(|board| board::share_link(&self.ctx.config.share_base_url, &board.share_token))
    }

    fn expect_phase(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::Phase { expected, actual: self.phase })
        }
    }

    // --- Lifecycle ---

    /// Resolve the board and go live on it.
    ///
    /// # Errors
    ///
    /// Fails when the board cannot be resolved (bad token, unknown id,
    /// anonymous creation) or the presence write or subscriptions fail. The
    /// session is then back in `Uninitialized` and may try again.
    pub async fn join(&mut self, target: LaunchTarget) -> Result<Board, SessionError> {
        self.expect_phase(SessionPhase::Uninitialized)?;
        self.phase = SessionPhase::Joining;
        match self.attach(target).await {
            Ok(board) => {
                self.phase = SessionPhase::Active;
                info!(board_id = %board.id, user_id = %self.ctx.identity.user_id, "joined board");
                Ok(board)
            }
            Err(e) => {
                warn!(user_id = %self.ctx.identity.user_id, error = %e, "join failed");
                self.tasks.abort_all();
                self.board_id = None;
                self.board.send_modify(|b| *b = None);
                lock(&self.engine).set_can_edit(false);
                self.phase = SessionPhase::Uninitialized;
                Err(e)
            }
        }
    }

    async fn resolve(&self, target: LaunchTarget) -> Result<Board, BoardError> {
        let store = self.ctx.store.as_ref();
        match target {
            LaunchTarget::Share(token) => board::resolve_share_token(store, &token).await,
            LaunchTarget::Board(id) => board::get_board(store, &id).await,
            LaunchTarget::Create => board::create_board(store, &self.ctx.identity, unix_ms()).await,
        }
    }

    async fn attach(&mut self, target: LaunchTarget) -> Result<Board, SessionError> {
        let board = self.resolve(target).await?;
        let board_id = board.id.clone();
        let user_id = self.ctx.identity.user_id.clone();
        let store = Arc::clone(&self.ctx.store);

        let record = PresenceRecord::joining(&self.ctx.identity, presence::random_hue_color(), unix_ms());
        presence::join(store.as_ref(), &board_id, &user_id, &record).await?;

        lock(&self.engine).set_can_edit(board.access(&user_id).is_editor);
        self.board.send_modify(|b| *b = Some(board.clone()));
        self.board_id = Some(board_id.clone());

        let buffer = self.ctx.config.snapshot_buffer;
        let board_feed = store.subscribe(Target::Document(paths::board(&board_id)), buffer).await?;
        let element_feed = store.subscribe(Target::Collection(paths::elements(&board_id)), buffer).await?;
        let presence_feed = store
            .subscribe(
                Target::Where { collection: paths::users(&board_id), field: "isOnline".into(), value: json!(true) },
                buffer,
            )
            .await?;
        let cursor_feed = store.subscribe(Target::Collection(paths::cursors(&board_id)), buffer).await?;

        self.tasks.spawn(
            "board-feed",
            forward_board(board_feed, Arc::clone(&self.engine), Arc::clone(&self.board), user_id.clone()),
        );
        self.tasks.spawn("element-feed", forward_elements(element_feed, Arc::clone(&self.engine), board_id.clone()));
        self.tasks.spawn("presence-feed", forward_presence(presence_feed, Arc::clone(&self.engine), board_id.clone()));
        self.tasks.spawn("cursor-feed", forward_cursors(cursor_feed, Arc::clone(&self.engine)));

        self.spawn_heartbeat(&board_id, &user_id);
        self.spawn_sweep(&board_id);
        Ok(board)
    }

    fn spawn_heartbeat(&mut self, board_id: &str, user_id: &str) {
        let store = Arc::clone(&self.ctx.store);
        let board_id = board_id.to_owned();
        let user_id = user_id.to_owned();
        self.tasks.spawn_interval("heartbeat", self.ctx.config.heartbeat, move || {
            let store = Arc::clone(&store);
            let board_id = board_id.clone();
            let user_id = user_id.clone();
            async move {
                if let Err(e) = presence::heartbeat(store.as_ref(), &board_id, &user_id, unix_ms()).await {
                    error!(%board_id, %user_id, error = %e, "heartbeat failed");
                }
            }
        });
    }

    fn spawn_sweep(&mut self, board_id: &str) {
        let store = Arc::clone(&self.ctx.store);
        let board_id = board_id.to_owned();
        let threshold_ms = i64::try_from(self.ctx.config.stale_after.as_millis()).unwrap_or(i64::MAX);
        self.tasks.spawn_interval("presence-sweep", self.ctx.config.sweep, move || {
            let store = Arc::clone(&store);
            let board_id = board_id.clone();
            async move {
                if let Err(e) = presence::sweep(store.as_ref(), &board_id, unix_ms(), threshold_ms).await {
                    error!(%board_id, error = %e, "presence sweep failed");
                }
            }
        });
    }

    /// Tear the session down: cancel feeds and timers, flush pending writes,
    /// then mark the caller offline. Calling it again does nothing.
    pub async fn leave(&mut self) {
        if self.phase == SessionPhase::Left {
            return;
        }
        self.tasks.abort_all();
        self.settle().await;
        lock(&self.engine).set_can_edit(false);
        if let Some(board_id) = self.board_id.take() {
            let user_id = &self.ctx.identity.user_id;
            if let Err(e) = presence::mark_offline(self.ctx.store.as_ref(), &board_id, user_id, unix_ms()).await {
                error!(%board_id, %user_id, error = %e, "failed to mark presence offline");
            }
            info!(%board_id, %user_id, "left board");
        }
        self.phase = SessionPhase::Left;
    }

    /// Wait for every spawned store write to finish.
    pub async fn settle(&mut self) {
        while let Some(result) = self.writes.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "store write task failed");
            }
        }
    }

    // --- Input ---

    pub fn pointer_down(&mut self, client_x: f64, client_y: f64, button: Button) -> Vec<Action> {
        self.handle(|engine| engine.on_pointer_down(client_x, client_y, button))
    }

    pub fn pointer_move(&mut self, client_x: f64, client_y: f64) -> Vec<Action> {
        self.handle(|engine| engine.on_pointer_move(client_x, client_y))
    }

    pub fn pointer_up(&mut self, client_x: f64, client_y: f64, button: Button) -> Vec<Action> {
        self.handle(|engine| engine.on_pointer_up(client_x, client_y, button))
    }

    pub fn pointer_leave(&mut self) -> Vec<Action> {
        self.handle(EngineCore::on_pointer_leave)
    }

    /// Place text requested by [`Action::TextRequested`].
    pub fn commit_text(&mut self, at: Point, text: &str) -> Vec<Action> {
        self.handle(|engine| engine.commit_text(at, text))
    }

    fn handle(&mut self, event: impl FnOnce(&mut EngineCore) -> Vec<Action>) -> Vec<Action> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        let actions = event(&mut lock(&self.engine));
        self.dispatch(&actions);
        actions
    }

    fn dispatch(&mut self, actions: &[Action]) {
        let Some(board_id) = self.board_id.clone() else {
            return;
        };
        while let Some(result) = self.writes.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "store write task failed");
            }
        }

        let user_id = self.ctx.identity.user_id.clone();
        for action in actions {
            let store = Arc::clone(&self.ctx.store);
            match action {
                Action::CommitElement(draft) => {
                    let wire = draft.clone().into_wire(unix_ms(), &user_id);
                    let board_id = board_id.clone();
                    self.writes.spawn(async move {
                        let data = match serde_json::to_value(&wire) {
                            Ok(data) => data,
                            Err(e) => {
                                error!(%board_id, error = %e, "element did not serialize");
                                return;
                            }
                        };
                        match store.create_document(&paths::elements(&board_id), data).await {
                            Ok(id) => debug!(%board_id, element_id = %id, "element committed"),
                            Err(e) => error!(%board_id, error = %e, "element commit failed"),
                        }
                    });
                }
                Action::DeleteElement { id } => {
                    let path = paths::element(&board_id, id);
                    self.writes.spawn(async move {
                        if let Err(e) = store.delete_document(&path).await {
                            error!(%path, error = %e, "element delete failed");
                        }
                    });
                }
                Action::CursorMoved(at) => {
                    let now = Instant::now();
                    let interval = self.ctx.config.cursor_interval;
                    if self.last_cursor_write.is_some_and(|last| now.duration_since(last) < interval) {
                        continue;
                    }
                    self.last_cursor_write = Some(now);
                    let at = *at;
                    let board_id = board_id.clone();
                    let user_id = user_id.clone();
                    self.writes.spawn(async move {
                        if let Err(e) = presence::write_cursor(store.as_ref(), &board_id, &user_id, at).await {
                            debug!(%board_id, error = %e, "cursor write failed");
                        }
                    });
                }
                Action::TextRequested { .. } | Action::RenderNeeded => {}
            }
        }
    }

    // --- Rendering ---

    /// Paint a frame if one is due.
    pub fn render(&self, surface: &mut dyn Surface, now_ms: f64) -> bool {
        lock(&self.engine).render(surface, now_ms)
    }

    /// Paint the board at native resolution for export.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any surface call fails.
    pub fn export(&self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        lock(&self.engine).export(surface)
    }

    /// Signal the host to export the board.
    pub fn request_export(&self) {
        if self.exports.send(()).is_err() {
            debug!("export requested with no listeners");
        }
    }

    #[must_use]
    pub fn export_requests(&self) -> broadcast::Receiver<()> {
        self.exports.subscribe()
    }

    // --- Users panel ---

    /// Online users with their roles, sorted by user id.
    #[must_use]
    pub fn users(&self) -> Vec<SessionUser> {
        let Some(board) = self.board() else {
            return Vec::new();
        };
        let engine = lock(&self.engine);
        engine
            .peers
            .online()
            .into_iter()
            .map(|(user_id, peer)| SessionUser {
                user_id: user_id.to_owned(),
                name: peer.name.clone(),
                color: peer.color.clone(),
                role: board::role_label(&board, user_id),
                is_editor: board.access(user_id).is_editor,
            })
            .collect()
    }

    // --- Administration ---

    fn active_board(&self) -> Result<Board, SessionError> {
        self.expect_phase(SessionPhase::Active)?;
        self.board().ok_or(SessionError::NoBoard)
    }

    /// Delete every element (admin only). Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Fails outside the active phase, for non-admins, or if the element
    /// list cannot be read.
    pub async fn clear_board(&self) -> Result<usize, SessionError> {
        let board = self.active_board()?;
        Ok(board::clear_board(self.ctx.store.as_ref(), &board, &self.ctx.identity.user_id).await?)
    }

    /// Grant or revoke edit rights (admin only).
    ///
    /// # Errors
    ///
    /// See [`board::set_editor`].
    pub async fn set_editor(&self, user_id: &str, grant: bool) -> Result<Vec<String>, SessionError> {
        let board = self.active_board()?;
        Ok(board::set_editor(self.ctx.store.as_ref(), &board, &self.ctx.identity.user_id, user_id, grant).await?)
    }

    /// Flip a user's edit rights (admin only).
    ///
    /// # Errors
    ///
    /// See [`board::toggle_editor`].
    pub async fn toggle_editor(&self, user_id: &str) -> Result<bool, SessionError> {
        let board = self.active_board()?;
        Ok(board::toggle_editor(self.ctx.store.as_ref(), &board, &self.ctx.identity.user_id, user_id).await?)
    }

    /// Rename the board (admin only).
    ///
    /// # Errors
    ///
    /// See [`board::rename_board`].
    pub async fn rename(&self, name: &str) -> Result<(), SessionError> {
        let board = self.active_board()?;
        Ok(board::rename_board(self.ctx.store.as_ref(), &board, &self.ctx.identity.user_id, name).await?)
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }
        let Some(board_id) = self.board_id.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%board_id, "session dropped outside a runtime; presence left to the sweep");
            return;
        };
        let store = Arc::clone(&self.ctx.store);
        let user_id = self.ctx.identity.user_id.clone();
        drop(runtime.spawn(async move {
            if let Err(e) = presence::mark_offline(store.as_ref(), &board_id, &user_id, unix_ms()).await {
                debug!(%board_id, %user_id, error = %e, "offline write on drop failed");
            }
        }));
    }
}

// =============================================================================
// FEEDS
// =============================================================================

async fn forward_board(
    mut feed: Subscription,
    engine: SharedEngine,
    board: Arc<watch::Sender<Option<Board>>>,
    user_id: String,
) {
    while let Some(docs) = feed.recv().await {
        match docs.first().map(Board::from_document) {
            Some(Ok(next)) => {
                lock(&engine).set_can_edit(next.access(&user_id).is_editor);
                board.send_modify(|b| *b = Some(next));
            }
            Some(Err(e)) => warn!(error = %e, "ignoring malformed board document"),
            None => {
                warn!(%user_id, "board document deleted");
                lock(&engine).set_can_edit(false);
                board.send_modify(|b| *b = None);
            }
        }
    }
}

async fn forward_elements(mut feed: Subscription, engine: SharedEngine, board_id: String) {
    while let Some(docs) = feed.recv().await {
        let elements: Vec<DrawingElement> = docs
            .iter()
            .filter_map(|doc| match DrawingElement::from_document(&doc.id, &doc.data) {
                Ok(element) => Some(element),
                Err(e) => {
                    warn!(%board_id, element_id = %doc.id, error = %e, "skipping malformed element");
                    None
                }
            })
            .collect();
        lock(&engine).apply_element_snapshot(elements);
    }
}

async fn forward_presence(mut feed: Subscription, engine: SharedEngine, board_id: String) {
    while let Some(docs) = feed.recv().await {
        let peers: Vec<_> = docs
            .iter()
            .filter_map(|doc| match PresenceRecord::from_document(&board_id, doc) {
                Ok(record) => Some((doc.id.clone(), record.peer())),
                Err(e) => {
                    warn!(%board_id, user_id = %doc.id, error = %e, "skipping malformed presence record");
                    None
                }
            })
            .collect();
        lock(&engine).apply_presence_snapshot(peers);
    }
}

async fn forward_cursors(mut feed: Subscription, engine: SharedEngine) {
    while let Some(docs) = feed.recv().await {
        let cursors: Vec<_> = docs
            .iter()
            .filter_map(|doc| match serde_json::from_value::<CursorRecord>(doc.data.clone()) {
                Ok(cursor) => Some((doc.id.clone(), Point::from(cursor))),
                Err(e) => {
                    debug!(user_id = %doc.id, error = %e, "skipping malformed cursor");
                    None
                }
            })
            .collect();
        lock(&engine).apply_cursor_snapshot(cursors);
    }
}
