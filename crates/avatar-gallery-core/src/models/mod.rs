//! Data models for avatars and their identifiers.
//!
//! `AvatarRecord` mirrors the JSON returned by `GET /avatars/{id}` and is
//! also the element type of the on-disk cache file.

pub mod avatar;

pub use avatar::{AvatarId, AvatarRecord};
