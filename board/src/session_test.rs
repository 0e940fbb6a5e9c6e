use std::time::Duration;

use canvas::input::Tool;
use canvas::viewport::ContainerRect;

use super::*;
use crate::memory::MemoryStore;

// =============================================================================
// Helpers
// =============================================================================

fn ada() -> Identity {
    Identity::authenticated("ada@example.com", Some("Ada"))
}

fn bob() -> Identity {
    Identity::authenticated("bob@example.com", Some("Bob"))
}

fn anonymous() -> Identity {
    Identity { user_id: "anonymous_k3x9q2m1z_1700000000000".into(), display_name: "Quick Fox".into(), is_anonymous: true }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

fn session(store: &MemoryStore, identity: Identity) -> BoardSession {
    init_tracing();
    let session = BoardSession::new(SessionContext {
        store: Arc::new(store.clone()),
        identity,
        config: SessionConfig::default(),
    });
    session.engine().measure(ContainerRect::new(0.0, 0.0, 1920.0, 1080.0), 1.0);
    session
}

/// Admin session on a freshly created board.
async fn admin_session(store: &MemoryStore) -> (BoardSession, Board) {
    let mut admin = session(store, ada());
    let board = admin.join(LaunchTarget::Create).await.unwrap();
    (admin, board)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never held");
}

fn draw_stroke(session: &mut BoardSession, from: (f64, f64), to: (f64, f64)) {
    session.pointer_down(from.0, from.1, Button::Primary);
    session.pointer_move(to.0, to.1);
    session.pointer_up(to.0, to.1, Button::Primary);
}

fn presence_of(store: &MemoryStore, board_id: &str, user_id: &str) -> serde_json::Value {
    store.document(&paths::user(board_id, user_id)).unwrap().data
}

// =============================================================================
// Joining
// =============================================================================

#[tokio::test]
async fn create_joins_as_admin() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;

    assert_eq!(admin.phase(), SessionPhase::Active);
    assert_eq!(board.admin_id, "ada@example.com");
    assert_eq!(admin.access(), Access { is_admin: true, is_editor: true });
    assert!(admin.engine().can_edit());
    assert_eq!(store.subscriber_count(), 4);

    let record = presence_of(&store, &board.id, "ada@example.com");
    assert_eq!(record["name"], "Ada");
    assert_eq!(record["isOnline"], true);
    assert!(record["color"].as_str().unwrap().starts_with("hsl("));
}

#[tokio::test]
async fn share_token_joins_as_viewer() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;

    let mut viewer = session(&store, bob());
    let joined = viewer.join(LaunchTarget::Share(board.share_token.clone())).await.unwrap();
    assert_eq!(joined.id, board.id);
    assert_eq!(viewer.access(), Access { is_admin: false, is_editor: false });
    assert!(!viewer.engine().can_edit());
}

#[tokio::test]
async fn board_id_joins_directly() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;
    let mut other = session(&store, bob());
    assert_eq!(other.join(LaunchTarget::Board(board.id.clone())).await.unwrap().id, board.id);
}

#[tokio::test]
async fn anonymous_create_is_blocked_and_retryable_by_link() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;

    let mut guest = session(&store, anonymous());
    let err = guest.join(LaunchTarget::Create).await.unwrap_err();
    assert!(matches!(err, SessionError::Board(BoardError::AnonymousCreate)));
    assert_eq!(err.error_code(), "E_ANONYMOUS_CREATE");
    assert_eq!(guest.phase(), SessionPhase::Uninitialized);

    guest.join(LaunchTarget::Share(board.share_token.clone())).await.unwrap();
    assert_eq!(guest.phase(), SessionPhase::Active);
    assert_eq!(presence_of(&store, &board.id, &guest.identity().user_id)["isAnonymous"], true);
}

#[tokio::test]
async fn bad_share_token_leaves_session_uninitialized() {
    let store = MemoryStore::new();
    let mut s = session(&store, bob());
    let err = s.join(LaunchTarget::Share("nope".into())).await.unwrap_err();
    assert!(matches!(err, SessionError::Board(BoardError::InvalidShareToken)));
    assert_eq!(s.phase(), SessionPhase::Uninitialized);
    assert!(s.board().is_none());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn joining_twice_is_a_phase_error() {
    let store = MemoryStore::new();
    let (mut admin, _board) = admin_session(&store).await;
    let err = admin.join(LaunchTarget::Create).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Phase { expected: SessionPhase::Uninitialized, actual: SessionPhase::Active }
    ));
    assert_eq!(err.error_code(), "E_SESSION_PHASE");
}

#[tokio::test]
async fn share_link_uses_configured_base() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    let link = admin.share_link().unwrap();
    assert!(link.ends_with(&format!("?share={}", board.share_token)));
}

// =============================================================================
// Drawing
// =============================================================================

#[tokio::test]
async fn admin_draws_then_clears() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    admin.engine().set_color("#ff0000");
    admin.engine().set_stroke_width(2.0);

    draw_stroke(&mut admin, (10.0, 10.0), (50.0, 50.0));
    admin.settle().await;

    let elements = store.documents(&paths::elements(&board.id));
    assert_eq!(elements.len(), 1);
    let data = &elements[0].data;
    assert_eq!(data["type"], "pen");
    assert_eq!(data["points"], json!([{"x": 10.0, "y": 10.0}, {"x": 50.0, "y": 50.0}]));
    assert_eq!(data["color"], "#ff0000");
    assert_eq!(data["strokeWidth"], 2.0);
    assert_eq!(data["userId"], "ada@example.com");

    assert_eq!(admin.clear_board().await.unwrap(), 1);
    assert!(store.documents(&paths::elements(&board.id)).is_empty());
}

#[tokio::test]
async fn committed_elements_reach_every_session() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    let mut viewer = session(&store, bob());
    viewer.join(LaunchTarget::Board(board.id.clone())).await.unwrap();

    draw_stroke(&mut admin, (100.0, 100.0), (200.0, 200.0));
    admin.settle().await;

    eventually(|| admin.engine().elements.len() == 1).await;
    eventually(|| viewer.engine().elements.len() == 1).await;
}

#[tokio::test]
async fn viewer_pointer_down_does_nothing() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;
    let mut viewer = session(&store, bob());
    viewer.join(LaunchTarget::Share(board.share_token.clone())).await.unwrap();

    assert!(viewer.pointer_down(300.0, 300.0, Button::Primary).is_empty());
    assert!(viewer.engine().preview().is_none());
    viewer.pointer_up(300.0, 300.0, Button::Primary);
    viewer.settle().await;
    assert!(store.documents(&paths::elements(&board.id)).is_empty());
}

#[tokio::test]
async fn eraser_deletes_hit_elements() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    draw_stroke(&mut admin, (10.0, 10.0), (50.0, 50.0));
    admin.settle().await;
    eventually(|| admin.engine().elements.len() == 1).await;

    admin.engine().set_tool(Tool::Eraser);
    let actions = admin.pointer_down(11.0, 11.0, Button::Primary);
    assert!(actions.iter().any(|a| matches!(a, Action::DeleteElement { .. })));
    admin.pointer_up(11.0, 11.0, Button::Primary);
    admin.settle().await;

    assert!(store.documents(&paths::elements(&board.id)).is_empty());
    eventually(|| admin.engine().elements.is_empty()).await;
}

#[tokio::test]
async fn text_commits_through_session() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    admin.engine().set_tool(Tool::Text);

    let actions = admin.pointer_down(400.0, 300.0, Button::Primary);
    assert_eq!(actions, vec![Action::TextRequested { at: Point::new(400.0, 300.0) }]);
    admin.commit_text(Point::new(400.0, 300.0), "hello");
    admin.settle().await;

    let elements = store.documents(&paths::elements(&board.id));
    assert_eq!(elements[0].data["type"], "text");
    assert_eq!(elements[0].data["text"], "hello");
}

#[tokio::test]
async fn failed_commit_is_dropped() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    store.set_unavailable(true);
    draw_stroke(&mut admin, (10.0, 10.0), (50.0, 50.0));
    admin.settle().await;
    store.set_unavailable(false);
    assert!(store.documents(&paths::elements(&board.id)).is_empty());
    assert_eq!(admin.phase(), SessionPhase::Active);
}

#[tokio::test]
async fn malformed_elements_are_skipped() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    store.create_document(&paths::elements(&board.id), json!({"type": "eraser"})).await.unwrap();
    draw_stroke(&mut admin, (10.0, 10.0), (50.0, 50.0));
    admin.settle().await;

    eventually(|| admin.engine().elements.len() == 1).await;
    assert_eq!(store.documents(&paths::elements(&board.id)).len(), 2);
}

// =============================================================================
// Cursors
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cursor_writes_are_throttled() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    let cursor_path = paths::cursor(&board.id, "ada@example.com");

    admin.pointer_move(10.0, 10.0);
    admin.pointer_move(20.0, 20.0);
    admin.settle().await;
    assert_eq!(store.document(&cursor_path).unwrap().data, json!({"x": 10.0, "y": 10.0}));

    tokio::time::sleep(Duration::from_millis(50)).await;
    admin.pointer_move(30.0, 30.0);
    admin.settle().await;
    assert_eq!(store.document(&cursor_path).unwrap().data, json!({"x": 30.0, "y": 30.0}));
}

#[tokio::test]
async fn remote_cursors_exclude_self() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    let mut viewer = session(&store, bob());
    viewer.join(LaunchTarget::Board(board.id.clone())).await.unwrap();

    admin.pointer_move(100.0, 100.0);
    viewer.pointer_move(200.0, 200.0);
    admin.settle().await;
    viewer.settle().await;

    eventually(|| {
        let engine = admin.engine();
        let cursors = engine.peers.visible_cursors();
        cursors.len() == 1 && cursors[0].0 == "bob@example.com"
    })
    .await;
}

// =============================================================================
// Permissions and users
// =============================================================================

#[tokio::test]
async fn granted_editor_can_draw_live() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    let mut editor = session(&store, bob());
    editor.join(LaunchTarget::Share(board.share_token.clone())).await.unwrap();
    assert!(!editor.engine().can_edit());

    admin.set_editor("bob@example.com", true).await.unwrap();
    eventually(|| editor.engine().can_edit()).await;
    assert!(editor.access().is_editor);

    draw_stroke(&mut editor, (10.0, 10.0), (50.0, 50.0));
    editor.settle().await;
    assert_eq!(store.documents(&paths::elements(&board.id)).len(), 1);
}

#[tokio::test]
async fn revoking_editor_stops_drawing() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    admin.set_editor("bob@example.com", true).await.unwrap();
    let mut editor = session(&store, bob());
    editor.join(LaunchTarget::Board(board.id.clone())).await.unwrap();
    assert!(editor.engine().can_edit());

    editor.pointer_down(10.0, 10.0, Button::Primary);
    assert!(editor.engine().preview().is_some());

    eventually(|| admin.board().is_some_and(|b| b.permissions.editors.len() == 2)).await;
    assert!(!admin.toggle_editor("bob@example.com").await.unwrap());
    eventually(|| !editor.engine().can_edit()).await;
    assert!(editor.engine().preview().is_none());
}

#[tokio::test]
async fn non_admin_cannot_clear() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;
    let mut viewer = session(&store, bob());
    viewer.join(LaunchTarget::Board(board.id.clone())).await.unwrap();
    assert!(matches!(viewer.clear_board().await, Err(SessionError::Board(BoardError::NotAdmin))));
    assert!(matches!(viewer.rename("x").await, Err(SessionError::Board(BoardError::NotAdmin))));
}

#[tokio::test]
async fn rename_reaches_board_watchers() {
    let store = MemoryStore::new();
    let (admin, _board) = admin_session(&store).await;
    let mut watcher = admin.watch_board();
    admin.rename("Roadmap").await.unwrap();
    eventually(|| watcher.borrow_and_update().as_ref().is_some_and(|b| b.name == "Roadmap")).await;
}

#[tokio::test]
async fn users_panel_lists_roles() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    let mut viewer = session(&store, bob());
    viewer.join(LaunchTarget::Board(board.id.clone())).await.unwrap();
    let mut guest = session(&store, anonymous());
    guest.join(LaunchTarget::Board(board.id.clone())).await.unwrap();

    eventually(|| admin.users().len() == 3).await;
    let users = admin.users();
    let roles: Vec<(&str, RoleLabel, bool)> =
        users.iter().map(|u| (u.user_id.as_str(), u.role, u.is_editor)).collect();
    assert_eq!(
        roles,
        vec![
            ("ada@example.com", RoleLabel::Admin, true),
            ("anonymous_k3x9q2m1z_1700000000000", RoleLabel::Anonymous, false),
            ("bob@example.com", RoleLabel::Member, false),
        ]
    );
    assert_eq!(users[0].name, "Ada");
}

#[tokio::test]
async fn deleted_board_disables_editing() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    board::delete_board(&store, &board, "ada@example.com").await.unwrap();
    eventually(|| admin.board().is_none()).await;
    assert!(!admin.engine().can_edit());
    assert!(matches!(admin.clear_board().await, Err(SessionError::NoBoard)));
}

// =============================================================================
// Presence timers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sweep_flips_stale_peers_offline() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;
    let ghost = PresenceRecord {
        name: "Ghost".into(),
        color: "red".into(),
        is_online: true,
        is_anonymous: false,
        joined_at: 0,
        last_seen: unix_ms() - 130_000,
    };
    presence::join(&store, &board.id, "ghost", &ghost).await.unwrap();

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(presence_of(&store, &board.id, "ghost")["isOnline"], false);
    assert_eq!(presence_of(&store, &board.id, "ada@example.com")["isOnline"], true);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_restores_own_presence() {
    let store = MemoryStore::new();
    let (_admin, board) = admin_session(&store).await;
    presence::mark_offline(&store, &board.id, "ada@example.com", 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    let record = presence_of(&store, &board.id, "ada@example.com");
    assert_eq!(record["isOnline"], true);
    assert!(record["lastSeen"].as_i64().unwrap() > 0);
    assert_eq!(record["name"], "Ada");
}

// =============================================================================
// Leaving
// =============================================================================

#[tokio::test]
async fn leave_cancels_feeds_and_marks_offline() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    admin.leave().await;

    assert_eq!(admin.phase(), SessionPhase::Left);
    assert_eq!(presence_of(&store, &board.id, "ada@example.com")["isOnline"], false);
    eventually(|| store.subscriber_count() == 0).await;
    assert!(admin.pointer_down(10.0, 10.0, Button::Primary).is_empty());

    admin.leave().await;
    assert_eq!(admin.phase(), SessionPhase::Left);
}

#[tokio::test(start_paused = true)]
async fn no_timer_outlives_leave() {
    let store = MemoryStore::new();
    let (mut admin, board) = admin_session(&store).await;
    admin.leave().await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(presence_of(&store, &board.id, "ada@example.com")["isOnline"], false);
}

#[tokio::test]
async fn dropping_active_session_marks_offline() {
    let store = MemoryStore::new();
    let (admin, board) = admin_session(&store).await;
    drop(admin);
    eventually(|| presence_of(&store, &board.id, "ada@example.com")["isOnline"] == false).await;
    eventually(|| store.subscriber_count() == 0).await;
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn export_signal_reaches_listeners() {
    let store = MemoryStore::new();
    let (admin, _board) = admin_session(&store).await;
    let mut requests = admin.export_requests();
    admin.request_export();
    assert!(requests.try_recv().is_ok());
    admin.request_export();
    admin.request_export();
    assert!(requests.try_recv().is_ok());
}

#[tokio::test]
async fn export_without_listeners_is_harmless() {
    let store = MemoryStore::new();
    let (admin, _board) = admin_session(&store).await;
    admin.request_export();
}
