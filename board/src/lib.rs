//! Board sessions for the collaborative whiteboard.
//!
//! A [`session::BoardSession`] ties one [`canvas`] engine to one board in an
//! external real-time document store: it resolves the board from the page's
//! launch URL, keeps the caller's presence alive, folds live snapshots of
//! elements, presence and cursors into the engine, and persists what the
//! engine's input handlers produce.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Lifecycle state machine (`uninitialized -> joining -> active -> left`) |
//! | [`board`] | Board model, access derivation, creation and administration |
//! | [`presence`] | Presence and cursor records, heartbeat, staleness sweep |
//! | [`store`] | Document store interface and path layout |
//! | [`memory`] | In-process document store |
//! | [`identity`] | Authenticated and persisted anonymous identities |
//! | [`launch`] | Launch URL parsing |
//! | [`tasks`] | Cancellable task arena for feeds and timers |
//! | [`config`] | Environment-driven session settings |
//! | [`error`] | Machine-readable error codes |
//! | [`clock`] | Wall-clock time in Unix milliseconds |

pub mod board;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod launch;
pub mod memory;
pub mod presence;
pub mod session;
pub mod store;
pub mod tasks;
