//! Canvas rendering and input engine for the collaborative whiteboard.
//!
//! This crate owns everything that happens on the board's drawing surface:
//! fitting the fixed 1920x1080 virtual canvas into whatever container the
//! page gives it, translating pointer input into element drafts, deletes and
//! cursor updates, and painting elements, previews and remote cursors. The
//! host (see the `board` crate) is responsible only for wiring store
//! subscriptions into the engine and persisting the resulting
//! [`engine::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Testable [`engine::EngineCore`] and the `Action` it emits |
//! | [`doc`] | Element model, wire format, and the local element/peer stores |
//! | [`viewport`] | Letterbox fit and screen/virtual coordinate mapping |
//! | [`input`] | Tools, toolbar state, and the gesture state machine |
//! | [`erase`] | Spatial hit-testing for the eraser |
//! | [`render`] | Scene rendering and frame pacing |
//! | [`surface`] | Drawing surface trait and a recording implementation |
//! | [`consts`] | Shared constants (canvas size, colors, limits) |
//! | `web` | `<canvas>` binding and animation-frame loop (`web` feature) |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod erase;
pub mod input;
pub mod render;
pub mod surface;
pub mod viewport;
#[cfg(feature = "web")]
pub mod web;
