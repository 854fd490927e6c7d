use super::{ModelLoader, Seq2SeqModel};
use crate::error::PipelineError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Written last into every saved snapshot directory
pub const SNAPSHOT_MARKER: &str = "easycommit-snapshot.json";

const CHECKPOINT_TIME_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotMarker {
    saved_at: String,
    model: String,
    #[serde(default)]
    repository: Option<String>,
}

/// Where the loaded model came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOrigin {
    Current(PathBuf),
    Checkpoint(PathBuf),
    Base(String),
}

/// The fixed "current" snapshot plus a history of checkpoints
///
/// Writes are plain overwrites: a crash mid-save can leave a partial snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: PathBuf,
    checkpoints: PathBuf,
}

impl SnapshotStore {
    pub fn new(current: impl Into<PathBuf>, checkpoints: impl Into<PathBuf>) -> Self {
        Self {
            current: current.into(),
            checkpoints: checkpoints.into(),
        }
    }

    pub fn current_dir(&self) -> &Path {
        &self.current
    }

    pub fn checkpoints_dir(&self) -> &Path {
        &self.checkpoints
    }

    /// Whether a completed snapshot exists at the current location
    pub fn has_current(&self) -> bool {
        self.current.join(SNAPSHOT_MARKER).is_file()
    }

    /// Newest completed checkpoint, by directory name
    pub fn latest_checkpoint(&self) -> Option<PathBuf> {
        self.list_checkpoints().pop()
    }

    /// Completed checkpoints, oldest first
    pub fn list_checkpoints(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.checkpoints) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join(SNAPSHOT_MARKER).is_file())
            .collect();
        dirs.sort();
        dirs
    }

    /// Overwrite the current snapshot
    pub fn save_current<M: Seq2SeqModel + ?Sized>(
        &self,
        model: &M,
        at: DateTime<Local>,
    ) -> Result<(), PipelineError> {
        write_snapshot(model, &self.current, at, None)?;
        tracing::info!("Saved current model to {}", self.current.display());
        Ok(())
    }

    /// Write a new `{timestamp}_{repo_name}` checkpoint
    ///
    /// Existing checkpoints are never written into; a name already taken gets
    /// a `-2`, `-3`, ... suffix.
    pub fn save_checkpoint<M: Seq2SeqModel + ?Sized>(
        &self,
        model: &M,
        repo_name: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, PipelineError> {
        let dir = self.claim_checkpoint_dir(repo_name, at)?;
        write_snapshot(model, &dir, at, Some(repo_name))?;
        tracing::info!("Saved checkpoint {}", dir.display());
        Ok(dir)
    }

    pub fn checkpoint_path(&self, repo_name: &str, at: DateTime<Local>) -> PathBuf {
        self.checkpoints.join(format!(
            "{}_{}",
            at.format(CHECKPOINT_TIME_FORMAT),
            repo_name
        ))
    }

    /// Create a fresh, empty checkpoint directory
    fn claim_checkpoint_dir(
        &self,
        repo_name: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.checkpoints)?;
        let base = self.checkpoint_path(repo_name, at);
        let mut candidate = base.clone();
        let mut suffix = 2;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let mut name = base.as_os_str().to_os_string();
                    name.push(format!("-{}", suffix));
                    candidate = PathBuf::from(name);
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn write_snapshot<M: Seq2SeqModel + ?Sized>(
    model: &M,
    dir: &Path,
    at: DateTime<Local>,
    repository: Option<&str>,
) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)?;
    model.save(dir)?;

    let marker = SnapshotMarker {
        saved_at: at.to_rfc3339(),
        model: model.describe(),
        repository: repository.map(str::to_string),
    };
    let content = serde_json::to_string_pretty(&marker)
        .map_err(|e| PipelineError::Training(format!("failed to serialize marker: {}", e)))?;
    fs::write(dir.join(SNAPSHOT_MARKER), content)?;
    Ok(())
}

/// Load the current snapshot, else the newest checkpoint, else the base model
pub fn load_latest_or_base<L: ModelLoader>(
    loader: &L,
    store: &SnapshotStore,
    base_model: &str,
) -> Result<(L::Model, ModelOrigin), PipelineError> {
    if store.has_current() {
        tracing::info!("Resuming model from {}", store.current_dir().display());
        let model = loader.load(store.current_dir())?;
        return Ok((model, ModelOrigin::Current(store.current_dir().to_path_buf())));
    }

    if let Some(checkpoint) = store.latest_checkpoint() {
        tracing::info!("Resuming model from last checkpoint: {}", checkpoint.display());
        let model = loader.load(&checkpoint)?;
        return Ok((model, ModelOrigin::Checkpoint(checkpoint)));
    }

    tracing::info!("No snapshot found. Initializing model from base: {}", base_model);
    let model = loader.from_pretrained(base_model)?;
    Ok((model, ModelOrigin::Base(base_model.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TrainingArgs, TrainingReport};
    use crate::types::TrainingExample;
    use chrono::TimeZone;
    use tempfile::tempdir;

    struct StubModel(String);

    impl Seq2SeqModel for StubModel {
        fn describe(&self) -> String {
            self.0.clone()
        }

        fn train_epoch(
            &mut self,
            examples: &[TrainingExample],
            _args: &TrainingArgs,
        ) -> Result<TrainingReport, PipelineError> {
            Ok(TrainingReport {
                examples: examples.len(),
                ..Default::default()
            })
        }

        fn save(&self, dir: &Path) -> Result<(), PipelineError> {
            fs::write(dir.join("weights.bin"), &self.0)?;
            Ok(())
        }

        fn generate(&self, _prompt: &str, _n: usize) -> Result<Vec<String>, PipelineError> {
            Ok(vec![])
        }
    }

    struct StubLoader;

    impl ModelLoader for StubLoader {
        type Model = StubModel;

        fn load(&self, dir: &Path) -> Result<StubModel, PipelineError> {
            Ok(StubModel(fs::read_to_string(dir.join("weights.bin"))?))
        }

        fn from_pretrained(&self, name: &str) -> Result<StubModel, PipelineError> {
            Ok(StubModel(name.to_string()))
        }
    }

    fn store(root: &Path) -> SnapshotStore {
        SnapshotStore::new(root.join("model"), root.join("model/checkpoints"))
    }

    #[test]
    fn test_checkpoint_name_format() {
        let dir = tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = store(dir.path()).checkpoint_path("project", at);
        assert!(path.ends_with("20240309-070501_project"));
    }

    #[test]
    fn test_loads_base_when_empty() {
        let dir = tempdir().unwrap();
        let (model, origin) = load_latest_or_base(&StubLoader, &store(dir.path()), "t5-base").unwrap();
        assert_eq!(model.0, "t5-base");
        assert_eq!(origin, ModelOrigin::Base("t5-base".to_string()));
    }

    #[test]
    fn test_prefers_current_over_checkpoint() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        store.save_checkpoint(&StubModel("old".into()), "a", at).unwrap();
        store.save_current(&StubModel("current".into()), at).unwrap();

        let (model, origin) = load_latest_or_base(&StubLoader, &store, "t5-base").unwrap();
        assert_eq!(model.0, "current");
        assert!(matches!(origin, ModelOrigin::Current(_)));
    }

    #[test]
    fn test_falls_back_to_newest_checkpoint() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let early = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let late = Local.with_ymd_and_hms(2024, 3, 10, 7, 5, 1).unwrap();

        store.save_checkpoint(&StubModel("early".into()), "a", early).unwrap();
        store.save_checkpoint(&StubModel("late".into()), "b", late).unwrap();
        // Unfinished checkpoint without marker is ignored
        fs::create_dir_all(store.checkpoints_dir().join("20991231-000000_partial")).unwrap();

        let (model, origin) = load_latest_or_base(&StubLoader, &store, "t5-base").unwrap();
        assert_eq!(model.0, "late");
        assert!(matches!(origin, ModelOrigin::Checkpoint(_)));
        assert_eq!(store.list_checkpoints().len(), 2);
    }

    #[test]
    fn test_checkpoint_name_collision_gets_suffix() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        let first = store.save_checkpoint(&StubModel("one".into()), "alpha", at).unwrap();
        let second = store.save_checkpoint(&StubModel("two".into()), "alpha", at).unwrap();
        let third = store.save_checkpoint(&StubModel("three".into()), "alpha", at).unwrap();

        assert!(first.ends_with("20240309-070501_alpha"));
        assert!(second.ends_with("20240309-070501_alpha-2"));
        assert!(third.ends_with("20240309-070501_alpha-3"));
        assert_eq!(store.list_checkpoints().len(), 3);

        // The earlier checkpoint still holds its own weights
        let weights = fs::read_to_string(first.join("weights.bin")).unwrap();
        assert_eq!(weights, "one");
    }

    #[test]
    fn test_current_overwrite_keeps_checkpoints() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        store.save_checkpoint(&StubModel("one".into()), "a", at).unwrap();
        store.save_current(&StubModel("one".into()), at).unwrap();
        store.save_current(&StubModel("two".into()), at).unwrap();

        assert!(store.has_current());
        assert_eq!(store.list_checkpoints().len(), 1);
        let weights = fs::read_to_string(store.current_dir().join("weights.bin")).unwrap();
        assert_eq!(weights, "two");
    }
}
