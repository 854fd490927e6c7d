use crate::error::LedgerError;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Durable set of source URLs that have reached a terminal state
///
/// Stored as a JSON array of strings, fully rewritten on every save. A URL is
/// never removed once added.
#[derive(Debug, Clone, Default)]
pub struct ProgressLedger {
    path: PathBuf,
    done: BTreeSet<String>,
}

impl ProgressLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            tracing::debug!("Ledger file not found, starting with empty ledger");
            return Ok(Self {
                path: path.to_path_buf(),
                done: BTreeSet::new(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| LedgerError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let urls: Vec<String> =
            serde_json::from_str(&content).map_err(|e| LedgerError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let ledger = Self {
            path: path.to_path_buf(),
            done: urls.into_iter().collect(),
        };
        tracing::info!("{} repositories already processed", ledger.len());
        Ok(ledger)
    }

    /// Overwrite the ledger file with the current set
    pub fn save(&self) -> Result<(), LedgerError> {
        let write_error = |reason: String| LedgerError::Write {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(&self.done)
            .map_err(|e| write_error(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| write_error(e.to_string()))?;

        tracing::debug!("Saved ledger to {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.done.contains(url)
    }

    /// Mark a URL done; returns false if it already was
    pub fn add(&mut self, url: impl Into<String>) -> bool {
        self.done.insert(url.into())
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.done.iter().map(String::as_str)
    }

    /// Candidates not yet processed, in discovery order, without duplicates
    pub fn pending(&self, candidates: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        candidates
            .iter()
            .filter(|url| !self.contains(url) && seen.insert(url.as_str()))
            .cloned()
            .collect()
    }
}
