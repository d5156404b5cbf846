//! Correlation tokens carried through the OAuth `state` parameter.
//!
//! The token is the decimal session id. It is not secret: a token only
//! resolves if a pending session with that id exists in the store.

use crate::{domain::SessionId, errors::Error, Result};

// u64::MAX has 20 digits.
const MAX_TOKEN_LEN: usize = 20;

pub fn mint(id: SessionId) -> String {
    id.0.to_string()
}

/// Strict inverse of [`mint`]: ASCII digits only, no sign, no whitespace,
/// non-zero.
pub fn parse(token: &str) -> Result<SessionId> {
    if token.is_empty() {
        return Err(Error::InvalidToken("empty".to_string()));
    }
    if token.len() > MAX_TOKEN_LEN || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidToken(preview(token)));
    }
    let id = token
        .parse::<u64>()
        .map_err(|_| Error::InvalidToken(preview(token)))?;
    if id == 0 {
        return Err(Error::InvalidToken("zero".to_string()));
    }
    Ok(SessionId(id))
}

// Tokens come from an untrusted query string; keep error text bounded.
fn preview(token: &str) -> String {
    let mut out: String = token.chars().take(24).collect();
    if token.chars().count() > 24 {
        out.push_str("...");
    }
    out
}
