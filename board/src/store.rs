//! Document store interface: the real-time document collection the board
//! lives in.
//!
//! DESIGN
//! ======
//! The store is an external collaborator. The board core needs five
//! operations from it (create, set with optional merge, delete, field query,
//! live subscription) plus plain reads for administration screens. Paths are
//! slash-separated: a collection path has an odd number of segments
//! (`boards/b1/elements`), a document path an even number
//! (`boards/b1/elements/e1`).
//!
//! Subscriptions deliver whole snapshots, never diffs: each message is the
//! complete current result set in arrival order. Delivery is best effort; a
//! slow consumer may miss intermediate snapshots but always sees a later one.
//! Dropping a [`Subscription`] unsubscribes.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid document at {path}: {reason}")]
    InvalidDocument { path: String, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::InvalidPath(_) => "E_INVALID_PATH",
            Self::InvalidDocument { .. } => "E_INVALID_DOCUMENT",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment.
    pub id: String,
    pub data: Value,
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A single document; snapshots hold zero or one entries.
    Document(String),
    /// Every document in a collection.
    Collection(String),
    /// Documents in a collection whose top-level `field` equals `value`.
    Where { collection: String, field: String, value: Value },
}

impl Target {
    /// The collection whose changes can affect this target.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Document(path) => path.rsplit_once('/').map_or("", |(collection, _)| collection),
            Self::Collection(collection) | Self::Where { collection, .. } => collection,
        }
    }
}

/// A live snapshot feed. Unsubscribes when dropped.
pub struct Subscription {
    rx: mpsc::Receiver<Vec<Document>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Vec<Document>>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { rx, cancel: Some(Box::new(cancel)) }
    }

    /// Next snapshot, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

// =============================================================================
// INTERFACE
// =============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document to `collection` under a store-assigned id.
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Write the document at `path`. With `merge`, top-level fields are
    /// merged into any existing document; otherwise it is replaced.
    async fn set_document(&self, path: &str, data: Value, merge: bool) -> Result<(), StoreError>;

    /// Delete the document at `path`. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &str) -> Result<(), StoreError>;

    async fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// All documents in `collection`, in arrival order.
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Documents in `collection` whose top-level `field` equals `value`.
    async fn query_by_field(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>, StoreError>;

    /// Watch `target`. The current snapshot is delivered immediately, then
    /// one per change. `buffer` bounds the undelivered snapshot queue.
    async fn subscribe(&self, target: Target, buffer: usize) -> Result<Subscription, StoreError>;
}

// =============================================================================
// PATHS
// =============================================================================

pub mod paths {
    pub const BOARDS: &str = "boards";

    #[must_use]
    pub fn board(board_id: &str) -> String {
        format!("{BOARDS}/{board_id}")
    }

    #[must_use]
    pub fn elements(board_id: &str) -> String {
        format!("{BOARDS}/{board_id}/elements")
    }

    #[must_use]
    pub fn element(board_id: &str, element_id: &str) -> String {
        format!("{BOARDS}/{board_id}/elements/{element_id}")
    }

    #[must_use]
    pub fn users(board_id: &str) -> String {
        format!("{BOARDS}/{board_id}/users")
    }

    #[must_use]
    pub fn user(board_id: &str, user_id: &str) -> String {
        format!("{BOARDS}/{board_id}/users/{user_id}")
    }

    #[must_use]
    pub fn cursors(board_id: &str) -> String {
        format!("{BOARDS}/{board_id}/cursors")
    }

    #[must_use]
    pub fn cursor(board_id: &str, user_id: &str) -> String {
        format!("{BOARDS}/{board_id}/cursors/{user_id}")
    }
}
