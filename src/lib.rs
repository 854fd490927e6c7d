//! # easycommit - continual fine-tuning of a commit message model
//!
//! Harvests git repositories one at a time, turns their history into
//! (diff, message) pairs, keeps the pairs that look like conventional
//! commits and fine-tunes a sequence-to-sequence model on them, forever.
//! The latest snapshot is served over a small HTTP API.
//!
//! ## Architecture
//!
//! ```text
//!  SourceDiscovery ──> ProgressLedger (skip already processed URLs)
//!         │
//!         ▼
//!  RepoHarvester ──> CommitExtractor ──> DatasetFilter ──> preprocess
//!   (temp checkout)    (git2 revwalk)     (score, cap)       │
//!                                                            ▼
//!                          SnapshotStore <── ContinualTrainer ──> MonitorLog
//!                               │               (state machine)
//!                               ▼
//!                        SuggestionService ──> POST /suggest
//! ```
//!
//! ## Modules
//!
//! - [`trainer`]: the continual-training state machine
//! - [`git`]: temporary checkouts and commit extraction
//! - [`dataset`]: quality scoring, truncation and prompt construction
//! - [`model`]: the opaque seq2seq model, snapshots and checkpoints
//! - [`ledger`]: durable set of processed repositories
//! - [`monitor`]: CSV log of trained repositories
//! - [`host`]: memory-based batch sizing and CPU throttling signals
//! - [`discovery`]: sources of candidate repository URLs
//! - [`inference`]: suggestion service and HTTP endpoint
//! - [`config`]: configuration with environment variable overrides
//! - [`error`]: error taxonomy
//! - [`paths`]: platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use easycommit::config::Config;
//! use easycommit::discovery::FileDiscovery;
//! use easycommit::git::GitCloneHarvester;
//! use easycommit::host::ProcHostProbe;
//! use easycommit::model::CommandBackend;
//! use easycommit::trainer::{ContinualTrainer, SystemClock, TrainerParts, TrainerSettings};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let parts = TrainerParts {
//!         discovery: FileDiscovery::new(&config.paths.sources_path),
//!         harvester: GitCloneHarvester::new(),
//!         probe: ProcHostProbe::from(&config.schedule),
//!         loader: CommandBackend::from_config(&config.model, &config.runtime),
//!         clock: SystemClock,
//!     };
//!     let mut trainer = ContinualTrainer::new(TrainerSettings::from(&config), parts)?;
//!     trainer.run()?;
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Quality filtering, truncation and the shared preprocessing contract
pub mod dataset;

/// Sources of candidate repository URLs
pub mod discovery;

/// Error types and utilities
pub mod error;

/// Repository checkouts and commit extraction
pub mod git;

/// Host memory and CPU readings
pub mod host;

/// Suggestion service and HTTP endpoint
pub mod inference;

/// Durable record of processed repositories
pub mod ledger;

/// Model backend, snapshots and checkpoints
pub mod model;

/// Append-only CSV training log
pub mod monitor;

/// Platform-specific default locations
pub mod paths;

/// The continual-training loop
pub mod trainer;

/// Records, training examples and HTTP request/response types
pub mod types;
