//! Avatar Gallery core - the non-UI half of the avatar gallery desktop client.
//!
//! The UI layer drives this crate through [`App`] (or the individual
//! components) and receives explicit outcome values back:
//! - `auth`: login, two-factor completion, silent token refresh and the
//!   user-scoped encrypted credential file
//! - `fetcher`: authenticated avatar fetch with a single retry after refresh
//! - `cache`: the tracked avatar ID list and the cached avatar records
//! - `validation`: the `avtr_<uuid>` identifier format

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod models;
pub mod utils;
pub mod validation;

pub use app::App;
pub use auth::{Credential, CredentialStore, LoginOutcome, SessionClient, SessionState};
pub use cache::{AvatarRepository, LoadOutcome, RefreshSummary, RepositoryError};
pub use config::Config;
pub use fetcher::{AvatarFetcher, AvatarSource, SessionSource};
pub use models::{AvatarId, AvatarRecord};
pub use validation::{is_valid_avatar_id, ValidationError};
