//! Board service: creation, join-by-token, permissions and administration.
//!
//! DESIGN
//! ======
//! A board is one document in the `boards` collection. Its `adminId` is the
//! creator and never changes; `permissions.editors` lists everyone else
//! allowed to draw. Everyone else who opens the board is a viewer. Access
//! is a pure function of the board document and the caller id, recomputed
//! whenever the board document changes.
//!
//! ERROR HANDLING
//! ==============
//! Admin-only operations check access before touching the store and fail
//! with [`BoardError::NotAdmin`]. Board deletion removes only the board
//! document; its element, user and cursor sub-collections are left behind.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use std::fmt;

use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::error::ErrorCode;
use crate::identity::{Identity, is_anonymous_id};
use crate::store::{Document, DocumentStore, StoreError, paths};

/// Name given to freshly created boards.
pub const DEFAULT_BOARD_NAME: &str = "New Whiteboard";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("board not found: {0}")]
    NotFound(String),
    #[error("no board for share token")]
    InvalidShareToken,
    #[error("only the board admin may do this")]
    NotAdmin,
    #[error("anonymous users cannot create boards; join via a share link")]
    AnonymousCreate,
    #[error("the admin cannot be removed from the editors")]
    CannotRemoveAdmin,
    #[error("board name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for BoardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::InvalidShareToken => "E_INVALID_SHARE_TOKEN",
            Self::NotAdmin => "E_NOT_ADMIN",
            Self::AnonymousCreate => "E_ANONYMOUS_CREATE",
            Self::CannotRemoveAdmin => "E_CANNOT_REMOVE_ADMIN",
            Self::EmptyName => "E_EMPTY_NAME",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub editors: Vec<String>,
}

/// A board document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    /// Document id; not stored inside the document.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub admin_id: String,
    pub share_token: String,
    pub created_at: i64,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Board {
    /// Decode a store document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] when required fields are missing.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let mut board: Board = serde_json::from_value(doc.data.clone()).map_err(|e| StoreError::InvalidDocument {
            path: paths::board(&doc.id),
            reason: e.to_string(),
        })?;
        board.id.clone_from(&doc.id);
        Ok(board)
    }

    #[must_use]
    pub fn access(&self, caller_id: &str) -> Access {
        Access::derive(self, caller_id)
    }
}

/// What a caller may do on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub is_admin: bool,
    pub is_editor: bool,
}

impl Access {
    #[must_use]
    pub fn derive(board: &Board, caller_id: &str) -> Self {
        let is_admin = board.admin_id == caller_id;
        let is_editor = is_admin || board.permissions.editors.iter().any(|e| e == caller_id);
        Self { is_admin, is_editor }
    }
}

/// Label shown next to a user in the users panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLabel {
    Admin,
    Anonymous,
    Member,
}

impl fmt::Display for RoleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "Admin",
            Self::Anonymous => "Anonymous",
            Self::Member => "Member",
        })
    }
}

#[must_use]
pub fn role_label(board: &Board, user_id: &str) -> RoleLabel {
    if board.admin_id == user_id {
        RoleLabel::Admin
    } else if is_anonymous_id(user_id) {
        RoleLabel::Anonymous
    } else {
        RoleLabel::Member
    }
}

/// Random 16-byte hex share token.
#[must_use]
pub fn generate_share_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Join-by-link URL for a board.
#[must_use]
pub fn share_link(base_url: &str, share_token: &str) -> String {
    format!("{}?share={share_token}", base_url.trim_end_matches('?'))
}

fn require_admin(board: &Board, caller_id: &str) -> Result<(), BoardError> {
    if board.access(caller_id).is_admin { Ok(()) } else { Err(BoardError::NotAdmin) }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a board administered by `caller`.
///
/// # Errors
///
/// Fails for anonymous callers, or if the store rejects the write.
pub async fn create_board(store: &dyn DocumentStore, caller: &Identity, now_ms: i64) -> Result<Board, BoardError> {
    if caller.is_anonymous {
        return Err(BoardError::AnonymousCreate);
    }
    let mut board = Board {
        id: String::new(),
        name: DEFAULT_BOARD_NAME.to_owned(),
        admin_id: caller.user_id.clone(),
        share_token: generate_share_token(),
        created_at: now_ms,
        permissions: Permissions { editors: vec![caller.user_id.clone()] },
    };
    let data = serde_json::to_value(&board).map_err(|e| StoreError::InvalidDocument {
        path: paths::BOARDS.to_owned(),
        reason: e.to_string(),
    })?;
    board.id = store.create_document(paths::BOARDS, data).await?;
    info!(board_id = %board.id, admin = %board.admin_id, "board created");
    Ok(board)
}

/// Load a board by id.
///
/// # Errors
///
/// Returns [`BoardError::NotFound`] if no such board exists.
pub async fn get_board(store: &dyn DocumentStore, board_id: &str) -> Result<Board, BoardError> {
    let doc = store
        .get_document(&paths::board(board_id))
        .await?
        .ok_or_else(|| BoardError::NotFound(board_id.to_owned()))?;
    Ok(Board::from_document(&doc)?)
}

/// Find the board a share token belongs to.
///
/// # Errors
///
/// Returns [`BoardError::InvalidShareToken`] if no board carries the token.
pub async fn resolve_share_token(store: &dyn DocumentStore, token: &str) -> Result<Board, BoardError> {
    if token.is_empty() {
        return Err(BoardError::InvalidShareToken);
    }
    let docs = store.query_by_field(paths::BOARDS, "shareToken", &json!(token)).await?;
    let doc = docs.first().ok_or(BoardError::InvalidShareToken)?;
    Ok(Board::from_document(doc)?)
}

/// Boards administered by `admin_id`, newest first.
///
/// # Errors
///
/// Fails if the store query fails. Undecodable board documents are skipped.
pub async fn list_boards_for_admin(store: &dyn DocumentStore, admin_id: &str) -> Result<Vec<Board>, BoardError> {
    let docs = store.query_by_field(paths::BOARDS, "adminId", &json!(admin_id)).await?;
    let mut boards: Vec<Board> = docs
        .iter()
        .filter_map(|doc| match Board::from_document(doc) {
            Ok(board) => Some(board),
            Err(e) => {
                error!(board_id = %doc.id, error = %e, "skipping malformed board");
                None
            }
        })
        .collect();
    boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(boards)
}

/// Rename a board (admin only).
///
/// # Errors
///
/// Fails for non-admins, empty names, or store failures.
pub async fn rename_board(
    store: &dyn DocumentStore,
    board: &Board,
    caller_id: &str,
    name: &str,
) -> Result<(), BoardError> {
    require_admin(board, caller_id)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(BoardError::EmptyName);
    }
    store.set_document(&paths::board(&board.id), json!({ "name": name }), true).await?;
    Ok(())
}

/// Delete the board document (admin only). Sub-collections are not removed.
///
/// # Errors
///
/// Fails for non-admins or store failures.
pub async fn delete_board(store: &dyn DocumentStore, board: &Board, caller_id: &str) -> Result<(), BoardError> {
    require_admin(board, caller_id)?;
    store.delete_document(&paths::board(&board.id)).await?;
    info!(board_id = %board.id, "board deleted");
    Ok(())
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Grant or revoke edit rights (admin only). Returns the new editor list.
///
/// # Errors
///
/// Fails for non-admins, when revoking the admin, or on store failures.
pub async fn set_editor(
    store: &dyn DocumentStore,
    board: &Board,
    caller_id: &str,
    user_id: &str,
    grant: bool,
) -> Result<Vec<String>, BoardError> {
    require_admin(board, caller_id)?;
    if !grant && user_id == board.admin_id {
        return Err(BoardError::CannotRemoveAdmin);
    }
    let mut editors = board.permissions.editors.clone();
    let present = editors.iter().any(|e| e == user_id);
    match (grant, present) {
        (true, false) => editors.push(user_id.to_owned()),
        (false, true) => editors.retain(|e| e != user_id),
        _ => return Ok(editors),
    }
    store
        .set_document(&paths::board(&board.id), json!({ "permissions": { "editors": editors } }), true)
        .await?;
    info!(board_id = %board.id, user_id, grant, "editor permissions changed");
    Ok(editors)
}

/// Flip `user_id`'s edit rights. Returns whether they can edit afterwards.
///
/// # Errors
///
/// See [`set_editor`].
pub async fn toggle_editor(
    store: &dyn DocumentStore,
    board: &Board,
    caller_id: &str,
    user_id: &str,
) -> Result<bool, BoardError> {
    let grant = !board.permissions.editors.iter().any(|e| e == user_id);
    set_editor(store, board, caller_id, user_id, grant).await?;
    Ok(grant)
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// Delete every element on the board (admin only). Returns how many deletes
/// succeeded; individual failures are logged.
///
/// # Errors
///
/// Fails for non-admins or if the element list cannot be read.
pub async fn clear_board(store: &dyn DocumentStore, board: &Board, caller_id: &str) -> Result<usize, BoardError> {
    require_admin(board, caller_id)?;
    let docs = store.list_documents(&paths::elements(&board.id)).await?;
    let element_paths: Vec<String> = docs.iter().map(|doc| paths::element(&board.id, &doc.id)).collect();
    let results = join_all(element_paths.iter().map(|path| store.delete_document(path))).await;

    let mut deleted = 0;
    for (path, result) in element_paths.iter().zip(results) {
        match result {
            Ok(()) => deleted += 1,
            Err(e) => error!(path = %path, error = %e, "element delete failed during clear"),
        }
    }
    info!(board_id = %board.id, deleted, total = docs.len(), "board cleared");
    Ok(deleted)
}
