//! In-process [`DocumentStore`]: the reference implementation used by tests
//! and local demos.
//!
//! DESIGN
//! ======
//! Documents live in one map keyed by collection path, each collection
//! remembering arrival order through a sequence number. Every mutation
//! recomputes the snapshot of each affected subscription and pushes it with
//! `try_send`; a full queue drops that snapshot with a warning (the next
//! change delivers a complete one again) and a closed queue removes the
//! subscriber.
//!
//! ERROR HANDLING
//! ==============
//! `set_unavailable(true)` makes every write fail with
//! [`StoreError::Unavailable`], so callers' failure paths can be exercised.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{Document, DocumentStore, StoreError, Subscription, Target};

struct Entry {
    seq: u64,
    data: Value,
}

struct Subscriber {
    target: Target,
    tx: mpsc::Sender<Vec<Document>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Entry>>,
    subscribers: HashMap<u64, Subscriber>,
    next_seq: u64,
    next_subscriber: u64,
    unavailable: bool,
}

impl Inner {
    fn snapshot(&self, target: &Target) -> Vec<Document> {
        let Some(collection) = self.collections.get(target.collection()) else {
            return Vec::new();
        };
        let mut entries: Vec<(&String, &Entry)> = match target {
            Target::Document(path) => {
                let id = path.rsplit_once('/').map_or("", |(_, id)| id);
                collection.get_key_value(id).into_iter().collect()
            }
            Target::Collection(_) => collection.iter().collect(),
            Target::Where { field, value, .. } => {
                collection.iter().filter(|(_, e)| e.data.get(field) == Some(value)).collect()
            }
        };
        entries.sort_by_key(|(_, e)| e.seq);
        entries.into_iter().map(|(id, e)| Document { id: id.clone(), data: e.data.clone() }).collect()
    }

    fn notify(&mut self, collection: &str) {
        let mut closed = Vec::new();
        for (id, sub) in &self.subscribers {
            if sub.target.collection() != collection {
                continue;
            }
            match sub.tx.try_send(self.snapshot(&sub.target)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = id, collection, "snapshot queue full; dropping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("store marked unavailable".into()));
        }
        Ok(())
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Shared, cloneable in-memory document store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Synchronous read of a collection, in arrival order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock().snapshot(&Target::Collection(collection.to_owned()))
    }

    /// Synchronous read of one document.
    #[must_use]
    pub fn document(&self, path: &str) -> Option<Document> {
        self.lock().snapshot(&Target::Document(path.to_owned())).into_iter().next()
    }
}

fn split_document_path(path: &str) -> Result<(&str, &str), StoreError> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() && segments(path) % 2 == 0 => {
            Ok((collection, id))
        }
        _ => Err(StoreError::InvalidPath(path.to_owned())),
    }
}

fn check_collection_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() || segments(path) % 2 == 0 || path.split('/').any(str::is_empty) {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(())
}

fn segments(path: &str) -> usize {
    path.split('/').count()
}

/// Shallow merge: top-level fields of `patch` overwrite those of `base`.
fn merge_into(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (k, v) in patch {
                base.insert(k, v);
            }
        }
        (base, patch) => *base = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        check_collection_path(collection)?;
        let mut inner = self.lock();
        inner.check_writable()?;
        let id = Uuid::new_v4().simple().to_string();
        let seq = inner.next_seq();
        inner.collections.entry(collection.to_owned()).or_default().insert(id.clone(), Entry { seq, data });
        inner.notify(collection);
        Ok(id)
    }

    async fn set_document(&self, path: &str, data: Value, merge: bool) -> Result<(), StoreError> {
        let (collection, id) = split_document_path(path)?;
        let mut inner = self.lock();
        inner.check_writable()?;
        let seq = inner.next_seq();
        let docs = inner.collections.entry(collection.to_owned()).or_default();
        match docs.get_mut(id) {
            Some(existing) if merge => merge_into(&mut existing.data, data),
            Some(existing) => existing.data = data,
            None => {
                docs.insert(id.to_owned(), Entry { seq, data });
            }
        }
        inner.notify(collection);
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> Result<(), StoreError> {
        let (collection, id) = split_document_path(path)?;
        let mut inner = self.lock();
        inner.check_writable()?;
        let removed = inner.collections.get_mut(collection).and_then(|docs| docs.remove(id)).is_some();
        if removed {
            inner.notify(collection);
        } else {
            debug!(path, "delete of missing document");
        }
        Ok(())
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        split_document_path(path)?;
        Ok(self.document(path))
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        check_collection_path(collection)?;
        Ok(self.documents(collection))
    }

    async fn query_by_field(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>, StoreError> {
        check_collection_path(collection)?;
        let target = Target::Where { collection: collection.to_owned(), field: field.to_owned(), value: value.clone() };
        Ok(self.lock().snapshot(&target))
    }

    async fn subscribe(&self, target: Target, buffer: usize) -> Result<Subscription, StoreError> {
        match &target {
            Target::Document(path) => {
                split_document_path(path)?;
            }
            Target::Collection(collection) | Target::Where { collection, .. } => check_collection_path(collection)?,
        }

        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut inner = self.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        if tx.try_send(inner.snapshot(&target)).is_err() {
            warn!(subscriber = id, "initial snapshot not delivered");
        }
        inner.subscribers.insert(id, Subscriber { target, tx });
        drop(inner);

        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(rx, move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().unwrap_or_else(PoisonError::into_inner).subscribers.remove(&id);
            }
        }))
    }
}
