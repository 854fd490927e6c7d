//! The sequence-to-sequence model seen as an opaque collaborator
//!
//! The loop only needs to train one epoch on text pairs, persist the result
//! and, for inference, generate candidate messages. Tokenization and the
//! architecture stay behind [`Seq2SeqModel`].

/// Model backed by an external command
pub mod command;
/// Current snapshot and append-only checkpoints on disk
pub mod snapshot;

pub use command::{CommandBackend, CommandModel};
pub use snapshot::{ModelOrigin, SnapshotStore, load_latest_or_base};

use crate::config::TrainingConfig;
use crate::error::PipelineError;
use crate::types::TrainingExample;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hyperparameters for one training pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArgs {
    pub batch_size: usize,
    pub epochs: u32,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub logging_steps: u32,
    pub dataloader_workers: usize,
    pub max_source_length: usize,
    pub max_target_length: usize,
}

impl TrainingArgs {
    pub fn from_config(config: &TrainingConfig, batch_size: usize) -> Self {
        Self {
            batch_size,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            weight_decay: config.weight_decay,
            logging_steps: config.logging_steps,
            dataloader_workers: config.dataloader_workers,
            max_source_length: config.max_source_length,
            max_target_length: config.max_target_length,
        }
    }
}

/// What a training pass reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub examples: usize,
    #[serde(default)]
    pub steps: Option<usize>,
    #[serde(default)]
    pub loss: Option<f64>,
}

/// A tokenizer+model pair that can be fine-tuned, saved and queried
pub trait Seq2SeqModel {
    /// Human-readable origin, for logs
    fn describe(&self) -> String;

    /// Run `args.epochs` epochs over `examples`
    ///
    /// On error the model must be left as it was before the call.
    fn train_epoch(
        &mut self,
        examples: &[TrainingExample],
        args: &TrainingArgs,
    ) -> Result<TrainingReport, PipelineError>;

    /// Write tokenizer and weights into `dir`, overwriting existing files
    fn save(&self, dir: &Path) -> Result<(), PipelineError>;

    /// Up to `num_return_sequences` candidate outputs for `prompt`
    fn generate(
        &self,
        prompt: &str,
        num_return_sequences: usize,
    ) -> Result<Vec<String>, PipelineError>;
}

/// Creates models from saved snapshots or named pretrained weights
pub trait ModelLoader {
    type Model: Seq2SeqModel;

    fn load(&self, dir: &Path) -> Result<Self::Model, PipelineError>;

    fn from_pretrained(&self, name: &str) -> Result<Self::Model, PipelineError>;
}
