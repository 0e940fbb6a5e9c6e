//! Session configuration, read from the environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

const DEFAULT_HEARTBEAT_SECS: u64 = 30;
const DEFAULT_SWEEP_SECS: u64 = 20;
const DEFAULT_STALE_AFTER_SECS: u64 = 120;
const DEFAULT_CURSOR_INTERVAL_MS: u64 = 40;
const DEFAULT_SNAPSHOT_BUFFER: usize = 256;
const DEFAULT_SHARE_BASE_URL: &str = "https://client.unknownvps.eu.org/board";

/// Timing and sizing knobs for a board session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often the local presence record is refreshed.
    pub heartbeat: Duration,
    /// How often presence records are scanned for staleness.
    pub sweep: Duration,
    /// A presence record older than this is flipped offline.
    pub stale_after: Duration,
    /// Minimum spacing between cursor writes; zero writes on every move.
    pub cursor_interval: Duration,
    /// Base URL share links are built on.
    pub share_base_url: String,
    /// Per-subscription snapshot queue capacity.
    pub snapshot_buffer: usize,
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            heartbeat: Duration::from_secs(env_parse("WHITEBOARD_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS).max(1)),
            sweep: Duration::from_secs(env_parse("WHITEBOARD_SWEEP_SECS", DEFAULT_SWEEP_SECS).max(1)),
            stale_after: Duration::from_secs(env_parse("WHITEBOARD_STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS)),
            cursor_interval: Duration::from_millis(env_parse(
                "WHITEBOARD_CURSOR_INTERVAL_MS",
                DEFAULT_CURSOR_INTERVAL_MS,
            )),
            share_base_url: std::env::var("WHITEBOARD_SHARE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SHARE_BASE_URL.to_owned()),
            snapshot_buffer: env_parse("WHITEBOARD_SNAPSHOT_BUFFER", DEFAULT_SNAPSHOT_BUFFER).max(1),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            sweep: Duration::from_secs(DEFAULT_SWEEP_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            cursor_interval: Duration::from_millis(DEFAULT_CURSOR_INTERVAL_MS),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_owned(),
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when unset or
/// unparsable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
