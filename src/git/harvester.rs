//! Temporary local checkouts of remote repositories
//!
//! A [`Checkout`] owns its directory. Dropping it removes the directory, so
//! every exit path of the caller (success, `?`, panic) releases the disk.

use crate::error::PipelineError;
use std::path::Path;
use tempfile::TempDir;

/// Produces local checkouts for source identifiers
pub trait RepoHarvester {
    /// Materialise `url` into a fresh temporary directory. Never retries.
    fn acquire(&self, url: &str) -> Result<Checkout, PipelineError>;
}

/// A uniquely named temporary checkout, deleted recursively on drop
#[derive(Debug)]
pub struct Checkout {
    url: String,
    dir: TempDir,
}

impl Checkout {
    /// Allocate an empty temporary directory for `url`
    pub fn allocate(url: &str) -> Result<Self, PipelineError> {
        let dir = tempfile::Builder::new().prefix("easycommit-").tempdir()?;
        Ok(Self {
            url: url.to_string(),
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Release the directory now, logging instead of failing if removal errors
    pub fn close(self) {
        let path = self.dir.path().display().to_string();
        if let Err(e) = self.dir.close() {
            tracing::warn!("Failed to remove checkout {}: {}", path, e);
        } else {
            tracing::debug!("Removed checkout {}", path);
        }
    }
}

/// Clones remote repositories with libgit2
#[derive(Debug, Default, Clone)]
pub struct GitCloneHarvester;

impl GitCloneHarvester {
    pub fn new() -> Self {
        Self
    }
}

impl RepoHarvester for GitCloneHarvester {
    fn acquire(&self, url: &str) -> Result<Checkout, PipelineError> {
        let checkout = Checkout::allocate(url)?;
        tracing::info!("Cloning {} into {}", url, checkout.path().display());

        // On failure the checkout is dropped here and its directory removed
        git2::build::RepoBuilder::new()
            .clone(url, checkout.path())
            .map_err(|e| PipelineError::Clone {
                url: url.to_string(),
                reason: e.message().to_string(),
            })?;

        Ok(checkout)
    }
}

/// Repository name used for checkpoint directories: last URL segment without `.git`
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}
