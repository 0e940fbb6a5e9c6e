//! Launch target: what the board page was opened to do, read from its URL.

#[cfg(test)]
#[path = "launch_test.rs"]
mod launch_test;

use std::borrow::Cow;

use url::{Url, form_urlencoded};

/// How a session should find its board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Join by share link (`?share=<token>`).
    Share(String),
    /// Open a known board (`?board=<id>`).
    Board(String),
    /// No board named: create one (authenticated callers only).
    Create,
}

impl LaunchTarget {
    /// Parse a full URL, a path with a query, or a bare query string. Keys and
    /// values are form-decoded. A share token wins over a board id; empty
    /// values count as absent.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) => Self::from_pairs(parsed.query_pairs()),
            Err(_) => Self::from_pairs(form_urlencoded::parse(relative_query(url).as_bytes())),
        }
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut share = None;
        let mut board = None;
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "share" if share.is_none() => share = Some(value.into_owned()),
                "board" if board.is_none() => board = Some(value.into_owned()),
                _ => {}
            }
        }

        match (share, board) {
            (Some(token), _) => Self::Share(token),
            (None, Some(id)) => Self::Board(id),
            (None, None) => Self::Create,
        }
    }
}

/// Query part of a URL that has no scheme (`/board?share=x`, `share=x`).
fn relative_query(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None if without_fragment.contains('=') => without_fragment,
        None => "",
    }
}
