//! Authentication module for managing the session and the saved login.
//!
//! This module provides:
//! - `SessionClient`: login, 2FA completion and silent token refresh
//! - `CredentialStore`: the saved login, encrypted for the current OS user
//! - `UserCipher`: the user-scoped encryption both of the above rely on
//!
//! Tokens are never persisted on their own; they ride along inside the saved
//! login when the user asked to be remembered.

pub mod cipher;
pub mod credentials;
pub mod session;

pub use cipher::{FixedKeySource, KeySource, KeychainKeySource, UserCipher};
pub use credentials::{Credential, CredentialStore, CREDENTIAL_FILE};
pub use session::{LoginOutcome, Session, SessionClient, SessionState};
