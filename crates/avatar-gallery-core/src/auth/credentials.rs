use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cipher::UserCipher;

/// File name of the saved login inside the data directory
pub const CREDENTIAL_FILE: &str = "login.dat";

/// A remembered login. The password is only ever held sealed by the
/// user's cipher; `token` is the most recent bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    pub encrypted_password: Vec<u8>,
    #[serde(default)]
    pub two_factor_secret: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("has_two_factor_secret", &self.two_factor_secret.is_some())
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl Credential {
    pub fn new(username: &str, password: &str, cipher: &UserCipher) -> Result<Self> {
        let encrypted_password = cipher
            .seal(password.as_bytes())
            .context("Failed to encrypt password")?;
        Ok(Self {
            username: username.to_string(),
            encrypted_password,
            two_factor_secret: None,
            token: None,
        })
    }

    /// Recover the plaintext password
    pub fn password(&self, cipher: &UserCipher) -> Result<String> {
        let bytes = cipher
            .open(&self.encrypted_password)
            .context("Failed to decrypt saved password")?;
        String::from_utf8(bytes).context("Saved password is not valid UTF-8")
    }
}

/// Persists a single [`Credential`] as an encrypted blob at a fixed path.
///
/// Loading and saving never fail outward: an unreadable file is "no saved
/// login" and a failed write only costs the remembered login.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    cipher: UserCipher,
}

impl CredentialStore {
    pub fn new(path: PathBuf, cipher: UserCipher) -> Self {
        Self { path, cipher }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cipher(&self) -> &UserCipher {
        &self.cipher
    }

    /// Load the saved login, or `None` if it is missing or unreadable
    pub fn load(&self) -> Option<Credential> {
        match self.try_load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable saved login");
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No saved login");
            return Ok(None);
        }

        let blob = std::fs::read(&self.path).context("Failed to read credential file")?;
        let json = self.cipher.open(&blob)?;
        let credential: Credential =
            serde_json::from_slice(&json).context("Failed to parse credential file")?;
        Ok(Some(credential))
    }

    /// Save the login, replacing any previous one. Errors are logged only.
    pub fn save(&self, credential: &Credential) {
        if let Err(e) = self.try_save(credential) {
            warn!(path = %self.path.display(), error = %e, "Failed to save login");
        }
    }

    fn try_save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let json = serde_json::to_vec(credential)?;
        let blob = self.cipher.seal(&json)?;

        // Write beside the target and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, blob).context("Failed to write credential file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace credential file")?;
        debug!(path = %self.path.display(), "Saved login");
        Ok(())
    }

    /// Delete the saved login, if any
    pub fn clear(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to delete saved login");
            }
        }
    }
}
