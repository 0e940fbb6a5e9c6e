use serde_json::json;

use super::*;
use crate::memory::MemoryStore;

fn admin() -> Identity {
    Identity::authenticated("ada@example.com", Some("Ada"))
}

fn board_with(admin_id: &str, editors: &[&str]) -> Board {
    Board {
        id: "b1".into(),
        name: DEFAULT_BOARD_NAME.into(),
        admin_id: admin_id.into(),
        share_token: "tok".into(),
        created_at: 1,
        permissions: Permissions { editors: editors.iter().map(|e| (*e).to_owned()).collect() },
    }
}

// =============================================================================
// Access
// =============================================================================

#[test]
fn admin_is_editor() {
    let board = board_with("ada", &[]);
    assert_eq!(Access::derive(&board, "ada"), Access { is_admin: true, is_editor: true });
}

#[test]
fn listed_editor_is_not_admin() {
    let board = board_with("ada", &["bob"]);
    assert_eq!(board.access("bob"), Access { is_admin: false, is_editor: true });
}

#[test]
fn everyone_else_is_viewer() {
    let board = board_with("ada", &["bob"]);
    assert_eq!(board.access("eve"), Access { is_admin: false, is_editor: false });
}

#[test]
fn role_labels() {
    let board = board_with("ada", &[]);
    assert_eq!(role_label(&board, "ada"), RoleLabel::Admin);
    assert_eq!(role_label(&board, "anonymous_abc_1"), RoleLabel::Anonymous);
    assert_eq!(role_label(&board, "bob@example.com").to_string(), "Member");
}

#[test]
fn share_token_is_32_hex_chars() {
    let token = generate_share_token();
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(token, generate_share_token());
}

#[test]
fn share_link_appends_query() {
    assert_eq!(share_link("https://x.test/board", "abc"), "https://x.test/board?share=abc");
}

#[test]
fn board_decodes_without_permissions() {
    let doc = Document {
        id: "b9".into(),
        data: json!({"name": "N", "adminId": "a", "shareToken": "t", "createdAt": 5}),
    };
    let board = Board::from_document(&doc).unwrap();
    assert_eq!(board.id, "b9");
    assert!(board.permissions.editors.is_empty());
}

#[test]
fn error_codes() {
    assert_eq!(BoardError::NotAdmin.error_code(), "E_NOT_ADMIN");
    assert!(!BoardError::AnonymousCreate.retryable());
    assert!(BoardError::Store(StoreError::Unavailable("x".into())).retryable());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn create_board_lists_creator_as_editor() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 100).await.unwrap();
    assert_eq!(board.name, "New Whiteboard");
    assert_eq!(board.permissions.editors, vec!["ada@example.com"]);

    let stored = get_board(&store, &board.id).await.unwrap();
    assert_eq!(stored, board);
}

#[tokio::test]
async fn anonymous_cannot_create() {
    let store = MemoryStore::new();
    let anon = Identity { user_id: "anonymous_x_1".into(), display_name: "Quick Fox".into(), is_anonymous: true };
    let err = create_board(&store, &anon, 1).await.unwrap_err();
    assert!(matches!(err, BoardError::AnonymousCreate));
    assert!(store.documents("boards").is_empty());
}

#[tokio::test]
async fn resolve_share_token_finds_board() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    let found = resolve_share_token(&store, &board.share_token).await.unwrap();
    assert_eq!(found.id, board.id);
}

#[tokio::test]
async fn unknown_share_token_is_rejected() {
    let store = MemoryStore::new();
    create_board(&store, &admin(), 1).await.unwrap();
    assert!(matches!(resolve_share_token(&store, "nope").await, Err(BoardError::InvalidShareToken)));
    assert!(matches!(resolve_share_token(&store, "").await, Err(BoardError::InvalidShareToken)));
}

#[tokio::test]
async fn missing_board_is_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(get_board(&store, "ghost").await, Err(BoardError::NotFound(id)) if id == "ghost"));
}

#[tokio::test]
async fn list_boards_newest_first() {
    let store = MemoryStore::new();
    let first = create_board(&store, &admin(), 10).await.unwrap();
    let second = create_board(&store, &admin(), 20).await.unwrap();
    let other = Identity::authenticated("bob@example.com", None);
    create_board(&store, &other, 30).await.unwrap();

    let ids: Vec<String> = list_boards_for_admin(&store, "ada@example.com").await.unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn rename_requires_admin_and_name() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    assert!(matches!(rename_board(&store, &board, "bob", "X").await, Err(BoardError::NotAdmin)));
    assert!(matches!(rename_board(&store, &board, "ada@example.com", "  ").await, Err(BoardError::EmptyName)));

    rename_board(&store, &board, "ada@example.com", " Plans ").await.unwrap();
    assert_eq!(get_board(&store, &board.id).await.unwrap().name, "Plans");
}

#[tokio::test]
async fn delete_board_leaves_elements() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    store.create_document(&paths::elements(&board.id), json!({"type": "pen"})).await.unwrap();

    assert!(matches!(delete_board(&store, &board, "bob").await, Err(BoardError::NotAdmin)));
    delete_board(&store, &board, "ada@example.com").await.unwrap();
    assert!(store.document(&paths::board(&board.id)).is_none());
    assert_eq!(store.documents(&paths::elements(&board.id)).len(), 1);
}

// =============================================================================
// Permissions
// =============================================================================

#[tokio::test]
async fn grant_and_revoke_editor() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();

    let editors = set_editor(&store, &board, "ada@example.com", "bob", true).await.unwrap();
    assert_eq!(editors, vec!["ada@example.com", "bob"]);
    let board = get_board(&store, &board.id).await.unwrap();
    assert!(board.access("bob").is_editor);

    let editors = set_editor(&store, &board, "ada@example.com", "bob", false).await.unwrap();
    assert_eq!(editors, vec!["ada@example.com"]);
    let board = get_board(&store, &board.id).await.unwrap();
    assert!(!board.access("bob").is_editor);
}

#[tokio::test]
async fn granting_twice_is_idempotent() {
    let store = MemoryStore::new();
    let board = board_with("ada", &["ada", "bob"]);
    let editors = set_editor(&store, &board, "ada", "bob", true).await.unwrap();
    assert_eq!(editors, vec!["ada", "bob"]);
    assert!(store.document("boards/b1").is_none());
}

#[tokio::test]
async fn only_admin_changes_permissions() {
    let store = MemoryStore::new();
    let board = board_with("ada", &["ada", "bob"]);
    assert!(matches!(set_editor(&store, &board, "bob", "eve", true).await, Err(BoardError::NotAdmin)));
}

#[tokio::test]
async fn admin_cannot_remove_self() {
    let store = MemoryStore::new();
    let board = board_with("ada", &["ada"]);
    assert!(matches!(set_editor(&store, &board, "ada", "ada", false).await, Err(BoardError::CannotRemoveAdmin)));
    assert!(matches!(toggle_editor(&store, &board, "ada", "ada").await, Err(BoardError::CannotRemoveAdmin)));
}

#[tokio::test]
async fn toggle_flips_membership() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    assert!(toggle_editor(&store, &board, "ada@example.com", "bob").await.unwrap());
    let board = get_board(&store, &board.id).await.unwrap();
    assert!(!toggle_editor(&store, &board, "ada@example.com", "bob").await.unwrap());
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn clear_board_deletes_every_element() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    for i in 0..3 {
        store.create_document(&paths::elements(&board.id), json!({"n": i})).await.unwrap();
    }
    assert!(matches!(clear_board(&store, &board, "bob").await, Err(BoardError::NotAdmin)));
    assert_eq!(store.documents(&paths::elements(&board.id)).len(), 3);

    assert_eq!(clear_board(&store, &board, "ada@example.com").await.unwrap(), 3);
    assert!(store.documents(&paths::elements(&board.id)).is_empty());
}

#[tokio::test]
async fn clear_board_counts_failures() {
    let store = MemoryStore::new();
    let board = create_board(&store, &admin(), 1).await.unwrap();
    store.create_document(&paths::elements(&board.id), json!({"n": 1})).await.unwrap();
    store.set_unavailable(true);
    assert_eq!(clear_board(&store, &board, "ada@example.com").await.unwrap(), 0);
}
