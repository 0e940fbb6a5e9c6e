//! Stable error codes shared by every fallible board operation.

/// Machine-readable classification of an error, for hosts that map failures
/// to user-visible states.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same operation later may succeed.
    fn retryable(&self) -> bool {
        false
    }
}
