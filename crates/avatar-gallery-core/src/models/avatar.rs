use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::truncate;
use crate::validation::{is_valid_avatar_id, ValidationError};

/// Public web page for an avatar
const AVATAR_WEB_BASE_URL: &str = "https://vrchat.com/home/avatar";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase", default)]
pub struct AvatarRecord {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub author_name: String,
}

impl AvatarRecord {
    /// Link to the avatar's page on the hosting site
    pub fn web_url(&self) -> String {
        format!("{}/{}", AVATAR_WEB_BASE_URL, self.id)
    }

    /// Name shortened for display on a card
    pub fn display_name(&self, max_chars: usize) -> String {
        truncate(&self.name, max_chars)
    }

    /// "by <author>" with the author shortened for display
    pub fn display_author(&self, max_chars: usize) -> String {
        format!("by {}", truncate(&self.author_name, max_chars))
    }

    /// Whether this record belongs to `id` (case-insensitive)
    pub fn has_id(&self, id: &str) -> bool {
        self.id.trim().eq_ignore_ascii_case(id.trim())
    }
}

/// A validated avatar identifier.
///
/// Holds the entered text with all whitespace removed, so the ID can go into
/// a request path as-is. Case and hyphens are kept as typed. Equality ignores
/// ASCII case, matching how duplicates are detected.
#[derive(Debug, Clone)]
pub struct AvatarId(String);

impl AvatarId {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if is_valid_avatar_id(trimmed) {
            Ok(Self(trimmed.chars().filter(|c| !c.is_whitespace()).collect()))
        } else {
            Err(ValidationError::InvalidFormat(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for AvatarId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for AvatarId {}

impl FromStr for AvatarId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for AvatarId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
