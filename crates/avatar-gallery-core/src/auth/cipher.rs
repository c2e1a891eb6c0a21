//! User-scoped encryption for the saved login.
//!
//! The key is derived with Argon2 from a per-user secret. In production the
//! secret lives in the OS keychain entry of the logged-in account, so a blob
//! written by one account cannot be opened by another. Sealed blobs are
//! `MAGIC || nonce || ChaCha20-Poly1305 ciphertext`.

use anyhow::{anyhow, bail, Context, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use keyring::Entry;
use rand::RngCore;
use tracing::info;

/// Keychain service name for the key secret
const SERVICE_NAME: &str = "avatar-gallery";

/// Keychain account holding the random key secret
const KEY_ACCOUNT: &str = "credential-key";

/// Fixed KDF salt. The secret itself is random, so a per-blob salt adds nothing.
const KDF_SALT: &[u8] = b"avatar-gallery/credential-key/v1";

/// Argon2 memory cost in KiB
const KDF_MEMORY_KIB: u32 = 8 * 1024;
const KDF_ITERATIONS: u32 = 2;

/// Prefix identifying a sealed blob and its format version
const MAGIC: &[u8; 4] = b"AGC1";

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
const KEY_SIZE: usize = 32;

/// Size of a freshly generated keychain secret
const SECRET_SIZE: usize = 32;

/// Supplies the secret that scopes encryption to one user context.
pub trait KeySource: Send + Sync {
    fn user_secret(&self) -> Result<Vec<u8>>;
}

/// Secret stored in the OS keychain of the current account, created on first use.
#[derive(Debug, Clone)]
pub struct KeychainKeySource {
    service: String,
    account: String,
}

impl Default for KeychainKeySource {
    fn default() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            account: KEY_ACCOUNT.to_string(),
        }
    }
}

impl KeySource for KeychainKeySource {
    fn user_secret(&self) -> Result<Vec<u8>> {
        let entry = Entry::new(&self.service, &self.account)
            .context("Failed to create keyring entry")?;

        match entry.get_secret() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => {
                info!("Creating credential key in OS keychain");
                let mut secret = vec![0u8; SECRET_SIZE];
                rand::thread_rng().fill_bytes(&mut secret);
                entry
                    .set_secret(&secret)
                    .context("Failed to store credential key in keychain")?;
                Ok(secret)
            }
            Err(e) => Err(e).context("Failed to read credential key from keychain"),
        }
    }
}

/// A secret held in memory, e.g. supplied by an embedding application that
/// manages its own key material.
#[derive(Clone)]
pub struct FixedKeySource(Vec<u8>);

impl FixedKeySource {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

impl KeySource for FixedKeySource {
    fn user_secret(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Symmetric cipher bound to one user's secret.
#[derive(Clone)]
pub struct UserCipher {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for UserCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCipher").finish_non_exhaustive()
    }
}

impl UserCipher {
    pub fn from_source(source: &dyn KeySource) -> Result<Self> {
        let secret = source.user_secret()?;
        Self::from_secret(&secret)
    }

    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            bail!("Credential key secret is empty");
        }
        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, 1, Some(KEY_SIZE))
            .map_err(|e| anyhow!("Invalid key derivation parameters: {}", e))?;
        let mut key = [0u8; KEY_SIZE];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(secret, KDF_SALT, &mut key)
            .map_err(|e| anyhow!("Failed to derive credential key: {}", e))?;
        Ok(Self { key })
    }

    /// Encrypt `plaintext` under a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Invalid credential key: {}", e))?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut blob = Vec::with_capacity(MAGIC.len() + NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`seal`](Self::seal). Fails for blobs sealed
    /// under another user's secret.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>> {
        let header = MAGIC.len() + NONCE_SIZE;
        if blob.len() < header || !blob.starts_with(MAGIC) {
            bail!("Not a sealed credential blob");
        }

        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Invalid credential key: {}", e))?;

        cipher
            .decrypt(Nonce::from_slice(&blob[MAGIC.len()..header]), &blob[header..])
            .map_err(|_| anyhow!("Decryption failed - blob belongs to another user or is corrupt"))
    }
}
