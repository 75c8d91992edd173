//! Durable set of forum post ids that have already been handled.
//!
//! The set lives in memory for O(1) membership checks and is written to disk
//! as a JSON array after every change. Ids are only ever added.

use starwatch_core::{CoreError, ErrorExt, LedgerError, PostId};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};


#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    processed: HashSet<PostId>,
}

impl ProcessedLedger {
    /// Load the ledger at `path`. A missing or unreadable file yields an
    /// empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let processed = match Self::load(&path) {
            Ok(processed) => {
                debug!(
                    "Loaded {} processed post ids from {}",
                    processed.len(),
                    path.display()
                );
                processed
            }
            Err(LoadFailure::Missing) => {
                info!("No ledger at {}, starting empty", path.display());
                HashSet::new()
            }
            Err(LoadFailure::Corrupt(e)) => {
                e.log_warn();
                warn!("Starting with an empty ledger");
                HashSet::new()
            }
        };

        Self { path, processed }
    }

    fn load(path: &Path) -> Result<HashSet<PostId>, LoadFailure> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(LoadFailure::Missing),
            Err(e) => return Err(LoadFailure::corrupt(path, e.to_string())),
        };

        let ids: Vec<PostId> =
            serde_json::from_str(&raw).map_err(|e| LoadFailure::corrupt(path, e.to_string()))?;
        Ok(ids.into_iter().collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn is_processed(&self, post_id: PostId) -> bool {
        self.processed.contains(&post_id)
    }

    /// Record `post_id`. Returns `Ok(false)` without touching the disk when
    /// it was already recorded.
    pub fn mark_processed(&mut self, post_id: PostId) -> Result<bool, CoreError> {
        if !self.processed.insert(post_id) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Record many ids at once and persist them with a single write.
    /// Returns how many were new.
    pub fn bulk_add<I>(&mut self, post_ids: I) -> Result<usize, CoreError>
    where
        I: IntoIterator<Item = PostId>,
    {
        let before = self.processed.len();
        self.processed.extend(post_ids);
        let added = self.processed.len() - before;

        self.persist()?;
        info!("Added {} post ids to the ledger ({} total)", added, self.len());
        Ok(added)
    }

    /// Write the whole set through a temporary file so a crash mid-write
    /// leaves the previous contents in place.
    fn persist(&self) -> Result<(), CoreError> {
        let mut ids: Vec<PostId> = self.processed.iter().copied().collect();
        ids.sort_unstable();

        let rendered = serde_json::to_string_pretty(&ids)?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, rendered)
            .and_then(|_| fs::rename(&tmp_path, &self.path))
            .map_err(|e| LedgerError::PersistFailed {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!("Persisted {} ids to {}", ids.len(), self.path.display());
        Ok(())
    }
}

enum LoadFailure {
    Missing,
    Corrupt(LedgerError),
}

impl LoadFailure {
    fn corrupt(path: &Path, reason: String) -> Self {
        LoadFailure::Corrupt(LedgerError::Corrupt {
            path: path.display().to_string(),
            reason,
        })
    }
}
