//! Avatar identifier validation.
//!
//! Avatar IDs look like `avtr_5f2a3b4c-1d2e-3f4a-5b6c-7d8e9f0a1b2c`. The
//! prefix is matched case-insensitively and the UUID may be written with or
//! without hyphens. Every path that lets an ID into the tracked list (file
//! load, user add, refresh) goes through [`is_valid_avatar_id`].

use thiserror::Error;
use uuid::Uuid;

/// Required prefix of every avatar ID (compared case-insensitively)
pub const AVATAR_ID_PREFIX: &str = "avtr_";

/// Shortest possible ID: the prefix plus 32 hex digits
const MIN_AVATAR_ID_LEN: usize = 37;

/// Hex digits in a UUID once hyphens are removed
const UUID_HEX_DIGITS: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid avatar ID '{0}': must start with 'avtr_' followed by a UUID")]
    InvalidFormat(String),

    #[error("Avatar already in the list: {0}")]
    Duplicate(String),
}

/// Check whether `s` is a well-formed avatar ID.
///
/// The suffix after the prefix, with whitespace and hyphens removed, must be
/// exactly 32 ASCII hex digits and must also parse as a UUID. The two checks
/// overlap; both are kept so the accepted set stays exactly what it has
/// always been.
pub fn is_valid_avatar_id(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }

    let prefix_matches = s
        .get(..AVATAR_ID_PREFIX.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(AVATAR_ID_PREFIX))
        .unwrap_or(false);
    if !prefix_matches || s.chars().count() < MIN_AVATAR_ID_LEN {
        return false;
    }

    let hex: String = s[AVATAR_ID_PREFIX.len()..]
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    hex.len() == UUID_HEX_DIGITS
        && hex.chars().all(|c| c.is_ascii_hexdigit())
        && Uuid::try_parse(&hex).is_ok()
}
