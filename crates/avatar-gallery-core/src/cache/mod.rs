//! Local persistence of the tracked avatar list.
//!
//! This module provides the `AvatarRepository`, which owns two files in the
//! data directory:
//! - `avatars.txt`: tracked avatar IDs, one per line
//! - `avatars.json`: the last fetched records, used instead of a full
//!   refresh at startup when it is readable

pub mod repository;

pub use repository::{
    AvatarRepository, LoadOutcome, RefreshProgress, RefreshSummary, RepositoryError, CACHE_FILE,
    IDS_FILE,
};
