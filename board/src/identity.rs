//! Caller identity: who is drawing, and the context a board session runs in.
//!
//! Authenticated callers are identified by email. Everyone else gets a
//! pseudonymous id and a friendly generated name, both persisted in the
//! browser's local storage so a returning visitor keeps the same identity.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Local-storage key for the pseudonymous id.
pub const ANONYMOUS_ID_KEY: &str = "anonymousUserId";
/// Local-storage key for the generated display name.
pub const ANONYMOUS_NAME_KEY: &str = "anonymousUserName";

const ANONYMOUS_PREFIX: &str = "anonymous_";
const ADJECTIVES: &[&str] = &["Quick", "Bright", "Cool", "Swift", "Smart", "Bold", "Calm", "Kind"];
const ANIMALS: &[&str] = &["Fox", "Wolf", "Bear", "Lion", "Eagle", "Tiger", "Shark", "Hawk"];
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Key-value persistence that survives page reloads.
pub trait LocalStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// [`LocalStorage`] backed by a map.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }
}

/// A stable caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Email, or an `anonymous_…` id.
    pub user_id: String,
    pub display_name: String,
    pub is_anonymous: bool,
}

impl Identity {
    /// An identity issued by the sign-in provider. Falls back to the email's
    /// local part when the profile has no name.
    #[must_use]
    pub fn authenticated(email: &str, name: Option<&str>) -> Self {
        let display_name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => email.split('@').next().unwrap_or(email).to_owned(),
        };
        Self { user_id: email.to_owned(), display_name, is_anonymous: false }
    }

    /// The persisted anonymous identity, creating and storing one on first use.
    pub fn anonymous(storage: &mut dyn LocalStorage, now_ms: i64) -> Self {
        let user_id = storage.get(ANONYMOUS_ID_KEY).filter(|id| is_anonymous_id(id)).unwrap_or_else(|| {
            let id = generate_anonymous_id(now_ms);
            storage.set(ANONYMOUS_ID_KEY, &id);
            id
        });
        let display_name = storage.get(ANONYMOUS_NAME_KEY).filter(|n| !n.is_empty()).unwrap_or_else(|| {
            let name = generate_anonymous_name();
            storage.set(ANONYMOUS_NAME_KEY, &name);
            name
        });
        Self { user_id, display_name, is_anonymous: true }
    }
}

/// `anonymous_<9 base-36 chars>_<unix ms>`.
#[must_use]
pub fn generate_anonymous_id(now_ms: i64) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9).map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())])).collect();
    format!("{ANONYMOUS_PREFIX}{suffix}_{now_ms}")
}

/// "<Adjective> <Animal>".
#[must_use]
pub fn generate_anonymous_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Quick");
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Fox");
    format!("{adjective} {animal}")
}

#[must_use]
pub fn is_anonymous_id(user_id: &str) -> bool {
    user_id.starts_with(ANONYMOUS_PREFIX)
}
