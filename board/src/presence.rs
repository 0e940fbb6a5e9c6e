//! Presence and cursor records.
//!
//! The store has no disconnect notification, so liveness is a lease: each
//! session refreshes its own `lastSeen` on a heartbeat, and every active
//! session sweeps the board's presence records, flipping any whose lease has
//! lapsed to offline. Records are never deleted.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use canvas::doc::Peer;
use canvas::viewport::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::identity::Identity;
use crate::store::{Document, DocumentStore, StoreError, paths};

/// One user's presence on one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub name: String,
    pub color: String,
    pub is_online: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    pub joined_at: i64,
    pub last_seen: i64,
}

impl PresenceRecord {
    #[must_use]
    pub fn joining(identity: &Identity, color: String, now_ms: i64) -> Self {
        Self {
            name: identity.display_name.clone(),
            color,
            is_online: true,
            is_anonymous: identity.is_anonymous,
            joined_at: now_ms,
            last_seen: now_ms,
        }
    }

    /// Decode a store document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] when required fields are missing.
    pub fn from_document(board_id: &str, doc: &Document) -> Result<Self, StoreError> {
        serde_json::from_value(doc.data.clone()).map_err(|e| StoreError::InvalidDocument {
            path: paths::user(board_id, &doc.id),
            reason: e.to_string(),
        })
    }

    #[must_use]
    pub fn is_stale(&self, now_ms: i64, threshold_ms: i64) -> bool {
        self.is_online && now_ms - self.last_seen > threshold_ms
    }

    #[must_use]
    pub fn peer(&self) -> Peer {
        Peer { name: self.name.clone(), color: self.color.clone() }
    }
}

/// A live cursor position in virtual canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub x: f64,
    pub y: f64,
}

impl From<Point> for CursorRecord {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<CursorRecord> for Point {
    fn from(c: CursorRecord) -> Self {
        Point::new(c.x, c.y)
    }
}

/// `hsl(<hue>, 70%, 55%)` with a random hue.
#[must_use]
pub fn random_hue_color() -> String {
    let hue: u16 = rand::rng().random_range(0..360);
    format!("hsl({hue}, 70%, 55%)")
}

// =============================================================================
// WRITES
// =============================================================================

/// Overwrite the caller's presence record.
///
/// # Errors
///
/// Fails if the store rejects the write.
pub async fn join(
    store: &dyn DocumentStore,
    board_id: &str,
    user_id: &str,
    record: &PresenceRecord,
) -> Result<(), StoreError> {
    let data = serde_json::to_value(record).map_err(|e| StoreError::InvalidDocument {
        path: paths::user(board_id, user_id),
        reason: e.to_string(),
    })?;
    store.set_document(&paths::user(board_id, user_id), data, false).await
}

/// Refresh the caller's lease.
///
/// # Errors
///
/// Fails if the store rejects the write.
pub async fn heartbeat(store: &dyn DocumentStore, board_id: &str, user_id: &str, now_ms: i64) -> Result<(), StoreError> {
    store
        .set_document(&paths::user(board_id, user_id), json!({ "isOnline": true, "lastSeen": now_ms }), true)
        .await
}

/// Mark a user offline.
///
/// # Errors
///
/// Fails if the store rejects the write.
pub async fn mark_offline(
    store: &dyn DocumentStore,
    board_id: &str,
    user_id: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    store
        .set_document(&paths::user(board_id, user_id), json!({ "isOnline": false, "lastSeen": now_ms }), true)
        .await
}

/// Overwrite the caller's cursor record.
///
/// # Errors
///
/// Fails if the store rejects the write.
pub async fn write_cursor(store: &dyn DocumentStore, board_id: &str, user_id: &str, at: Point) -> Result<(), StoreError> {
    let cursor = CursorRecord::from(at);
    store
        .set_document(&paths::cursor(board_id, user_id), json!({ "x": cursor.x, "y": cursor.y }), false)
        .await
}

// =============================================================================
// STALENESS
// =============================================================================

/// Ids of online records whose `lastSeen` is older than `threshold_ms`.
#[must_use]
pub fn stale_user_ids<'a>(
    records: impl IntoIterator<Item = (&'a str, &'a PresenceRecord)>,
    now_ms: i64,
    threshold_ms: i64,
) -> Vec<&'a str> {
    records
        .into_iter()
        .filter(|(_, record)| record.is_stale(now_ms, threshold_ms))
        .map(|(id, _)| id)
        .collect()
}

/// Flip every stale presence record on the board offline. Returns how many
/// were flipped; individual write failures are logged and skipped.
///
/// # Errors
///
/// Fails only if the presence collection cannot be read.
pub async fn sweep(store: &dyn DocumentStore, board_id: &str, now_ms: i64, threshold_ms: i64) -> Result<usize, StoreError> {
    let docs = store.list_documents(&paths::users(board_id)).await?;
    let records: Vec<(String, PresenceRecord)> = docs
        .iter()
        .filter_map(|doc| match PresenceRecord::from_document(board_id, doc) {
            Ok(record) => Some((doc.id.clone(), record)),
            Err(e) => {
                warn!(%board_id, user_id = %doc.id, error = %e, "skipping malformed presence record");
                None
            }
        })
        .collect();

    let stale = stale_user_ids(records.iter().map(|(id, r)| (id.as_str(), r)), now_ms, threshold_ms);
    let mut flipped = 0;
    for user_id in stale {
        let path = paths::user(board_id, user_id);
        match store.set_document(&path, json!({ "isOnline": false }), true).await {
            Ok(()) => flipped += 1,
            Err(e) => error!(%board_id, user_id, error = %e, "failed to mark stale user offline"),
        }
    }
    if flipped > 0 {
        debug!(%board_id, flipped, "presence sweep");
    }
    Ok(flipped)
}
