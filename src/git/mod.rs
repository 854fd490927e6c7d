//! Git operations for building training data
//!
//! Clones source repositories into scoped temporary checkouts and walks their
//! history into (diff, message) records.

/// Commit history walking and diff rendering
pub mod extractor;
/// Temporary checkouts of remote repositories
pub mod harvester;

pub use extractor::{BranchScope, CommitExtractor, ExtractionOptions, is_merge_noise};
pub use harvester::{Checkout, GitCloneHarvester, RepoHarvester, repo_name};
