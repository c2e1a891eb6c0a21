use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetcher::AvatarSource;
use crate::models::{AvatarId, AvatarRecord};
use crate::validation::ValidationError;

/// Tracked avatar IDs, one per line
pub const IDS_FILE: &str = "avatars.txt";

/// Last fetched avatar records, JSON array in display order
pub const CACHE_FILE: &str = "avatars.json";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not fetch avatar {0} - it may be private, deleted, or a network issue")]
    FetchFailed(String),
}

/// Result of a bulk refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub records: Vec<AvatarRecord>,
    pub ok: usize,
    pub failed: usize,
}

impl RefreshSummary {
    pub fn status_message(&self) -> String {
        format!("Refresh complete – {} OK, {} failed.", self.ok, self.failed)
    }
}

/// Reported after each ID during a bulk refresh.
#[derive(Debug, Clone, Copy)]
pub struct RefreshProgress<'a> {
    /// Zero-based position of `id` in the refresh order
    pub index: usize,
    pub total: usize,
    pub id: &'a AvatarId,
    pub succeeded: bool,
}

/// How the startup load was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Records came from the cache file
    Cached(usize),
    /// No usable cache; every tracked ID was fetched
    Refreshed(RefreshSummary),
}

/// Owns the tracked avatar list and its on-disk files.
///
/// The in-memory records are the source of truth for display order; the ID
/// file and the cache file are both rewritten from them. Not re-entrant: the
/// UI must not start a second refresh while one is running.
pub struct AvatarRepository {
    data_dir: PathBuf,
    records: Vec<AvatarRecord>,
}

impl AvatarRepository {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            data_dir,
            records: Vec::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn ids_path(&self) -> PathBuf {
        self.data_dir.join(IDS_FILE)
    }

    fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    /// Records in display order
    pub fn records(&self) -> &[AvatarRecord] {
        &self.records
    }

    pub fn contains(&self, id: &AvatarId) -> bool {
        self.records.iter().any(|r| r.has_id(id.as_str()))
    }

    /// IDs of the in-memory records, in display order
    pub fn tracked_ids(&self) -> Vec<AvatarId> {
        self.records
            .iter()
            .filter_map(|r| AvatarId::parse(&r.id).ok())
            .collect()
    }

    // ===== Tracked ID file =====

    /// Read the tracked ID file, keeping valid IDs in file order. A missing
    /// or unreadable file yields an empty list.
    pub fn load_tracked_ids(&self) -> Vec<AvatarId> {
        let path = self.ids_path();
        if !path.exists() {
            return Vec::new();
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read tracked ID file");
                return Vec::new();
            }
        };

        contents
            .lines()
            .filter_map(|line| match AvatarId::parse(line) {
                Ok(id) => Some(id),
                Err(_) => {
                    if !line.trim().is_empty() {
                        debug!(line = %line.trim(), "Dropping malformed avatar ID");
                    }
                    None
                }
            })
            .collect()
    }

    /// Overwrite the tracked ID file with `ids`, one per line
    pub fn save_tracked_ids(&self, ids: &[AvatarId]) -> Result<()> {
        let mut contents = String::new();
        for id in ids {
            contents.push_str(id.as_str());
            contents.push('\n');
        }
        std::fs::write(self.ids_path(), contents).context("Failed to write tracked ID file")?;
        Ok(())
    }

    // ===== Record cache =====

    /// Read the cache file; `None` means the caller must rebuild it
    pub fn load_cache(&self) -> Option<Vec<AvatarRecord>> {
        let path = self.cache_path();
        if !path.exists() {
            debug!("No avatar cache file");
            return None;
        }

        match Self::read_cache(&path) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable avatar cache");
                None
            }
        }
    }

    fn read_cache(path: &Path) -> Result<Vec<AvatarRecord>> {
        let contents = std::fs::read_to_string(path).context("Failed to read cache file")?;
        serde_json::from_str(&contents).context("Failed to parse cache file")
    }

    /// Overwrite the cache file with the in-memory records
    pub fn save_cache(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(self.cache_path(), contents).context("Failed to write cache file")?;
        Ok(())
    }

    /// Write both files from the in-memory records, logging failures
    fn persist(&self) {
        if let Err(e) = self.save_tracked_ids(&self.tracked_ids()) {
            warn!(error = %e, "Failed to save tracked IDs");
        }
        if let Err(e) = self.save_cache() {
            warn!(error = %e, "Failed to save avatar cache");
        }
    }

    // ===== Fetching =====

    /// Fetch every ID in order, one at a time. Failed IDs are counted and
    /// left out of the result.
    pub async fn refresh_all<S>(ids: &[AvatarId], source: &mut S) -> RefreshSummary
    where
        S: AvatarSource + ?Sized,
    {
        Self::refresh_all_with_progress(ids, source, |_| {}).await
    }

    pub async fn refresh_all_with_progress<S, F>(
        ids: &[AvatarId],
        source: &mut S,
        mut on_progress: F,
    ) -> RefreshSummary
    where
        S: AvatarSource + ?Sized,
        F: FnMut(RefreshProgress<'_>),
    {
        let mut summary = RefreshSummary::default();
        let total = ids.len();

        for (index, id) in ids.iter().enumerate() {
            let succeeded = match Self::claim(id, source.fetch_avatar(id).await) {
                Some(record) => {
                    summary.records.push(record);
                    summary.ok += 1;
                    true
                }
                None => {
                    summary.failed += 1;
                    false
                }
            };
            on_progress(RefreshProgress {
                index,
                total,
                id,
                succeeded,
            });
        }

        summary
    }

    /// Tie a fetched record to the ID it was requested for. A missing ID is
    /// filled in; a record for some other avatar is rejected.
    fn claim(id: &AvatarId, record: Option<AvatarRecord>) -> Option<AvatarRecord> {
        let mut record = record?;
        if record.id.trim().is_empty() {
            record.id = id.to_string();
        } else if !record.has_id(id.as_str()) {
            warn!(requested = %id, returned = %record.id, "Fetched record has a different ID");
            return None;
        }
        Some(record)
    }

    /// Rebuild the records from the tracked ID file and rewrite the cache.
    /// The ID file itself is left alone so failed IDs stay tracked.
    pub async fn refresh_tracked<S>(&mut self, source: &mut S) -> RefreshSummary
    where
        S: AvatarSource + ?Sized,
    {
        let ids = self.load_tracked_ids();
        info!(count = ids.len(), "Refreshing all tracked avatars");

        let summary = Self::refresh_all(&ids, source).await;
        self.records = summary.records.clone();
        if let Err(e) = self.save_cache() {
            warn!(error = %e, "Failed to save avatar cache");
        }

        info!(ok = summary.ok, failed = summary.failed, "Refresh complete");
        summary
    }

    /// Startup path: use the cache when it is readable, otherwise refresh
    pub async fn load_or_refresh<S>(&mut self, source: &mut S) -> LoadOutcome
    where
        S: AvatarSource + ?Sized,
    {
        match self.load_cache() {
            Some(records) => {
                info!(count = records.len(), "Loaded avatars from cache");
                self.records = records;
                LoadOutcome::Cached(self.records.len())
            }
            None => LoadOutcome::Refreshed(self.refresh_tracked(source).await),
        }
    }

    // ===== Editing =====

    /// Validate, de-duplicate and fetch a user-entered ID, then append it
    pub async fn add<S>(&mut self, raw: &str, source: &mut S) -> Result<AvatarRecord, RepositoryError>
    where
        S: AvatarSource + ?Sized,
    {
        let id = AvatarId::parse(raw)?;
        if self.contains(&id) {
            return Err(ValidationError::Duplicate(id.to_string()).into());
        }

        let record = Self::claim(&id, source.fetch_avatar(&id).await)
            .ok_or_else(|| RepositoryError::FetchFailed(id.to_string()))?;

        info!(id = %id, name = %record.name, "Added avatar");
        self.records.push(record.clone());
        self.persist();
        Ok(record)
    }

    /// Remove the record with this ID (case-insensitive). Returns whether
    /// anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| !r.has_id(id));
        if self.records.len() == before {
            return false;
        }

        info!(id = %id.trim(), "Removed avatar");
        self.persist();
        true
    }
}
