//! Commit message suggestions from the current model snapshot
//!
//! Uses the same prompt construction as training, optionally followed by
//! recent subjects from the target repository so the model sees its style.

/// HTTP endpoint
pub mod server;

use crate::dataset::preprocess::build_prompt_with_context;
use crate::error::PipelineError;
use crate::model::{ModelLoader, ModelOrigin, Seq2SeqModel, SnapshotStore, load_latest_or_base};
use std::collections::HashSet;

/// Wraps a loaded model and post-processes its output
pub struct SuggestionService<M> {
    model: M,
    default_count: usize,
}

impl<M: Seq2SeqModel> SuggestionService<M> {
    pub fn new(model: M, default_count: usize) -> Self {
        Self {
            model,
            default_count,
        }
    }

    /// Load the newest snapshot (or the base model) through `loader`
    pub fn load<L>(
        loader: &L,
        store: &SnapshotStore,
        base_model: &str,
        default_count: usize,
    ) -> Result<(Self, ModelOrigin), PipelineError>
    where
        L: ModelLoader<Model = M>,
    {
        let (model, origin) = load_latest_or_base(loader, store, base_model)?;
        Ok((Self::new(model, default_count), origin))
    }

    pub fn default_count(&self) -> usize {
        self.default_count
    }

    /// Up to `count` distinct suggestions for `diff`
    pub fn suggest(
        &self,
        diff: &str,
        repo_context: &[String],
        count: Option<usize>,
    ) -> Result<Vec<String>, PipelineError> {
        let count = count.unwrap_or(self.default_count).max(1);
        let prompt = build_prompt_with_context(diff, repo_context);
        let raw = self.model.generate(&prompt, count)?;
        Ok(clean_suggestions(raw, count))
    }
}

/// Trim, drop empty and repeated outputs, keep model order
pub fn clean_suggestions(raw: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .take(limit)
        .collect()
}
