//! The text contract between datasets and the model
//!
//! Training and inference must build prompts the same way, otherwise the model
//! is asked questions in a shape it never saw.

use super::Dataset;
use crate::types::{CommitRecord, TrainingExample};

/// Instruction placed before every diff
pub const PROMPT_PREFIX: &str = "Generate a commit message for these changes:\n";

/// Header introducing recent commit subjects in inference prompts
pub const CONTEXT_HEADER: &str = "Recent commits:\n";

/// Keep only added and removed lines
pub fn clean_diff(diff: &str) -> String {
    diff.lines()
        .filter(|line| line.starts_with('+') || line.starts_with('-'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encoder input for a diff
pub fn build_prompt(diff: &str) -> String {
    format!("{}{}", PROMPT_PREFIX, clean_diff(diff))
}

/// Encoder input for a diff plus recent subjects from the target repository
pub fn build_prompt_with_context(diff: &str, recent_subjects: &[String]) -> String {
    let mut prompt = build_prompt(diff);
    let subjects: Vec<&str> = recent_subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if !subjects.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(CONTEXT_HEADER);
        for subject in subjects {
            prompt.push_str("- ");
            prompt.push_str(subject);
            prompt.push('\n');
        }
    }
    prompt
}

pub fn to_example(record: &CommitRecord) -> TrainingExample {
    TrainingExample {
        input: build_prompt(&record.diff),
        target: record.message.clone(),
    }
}

pub fn to_examples(dataset: &Dataset) -> Vec<TrainingExample> {
    dataset.records.iter().map(to_example).collect()
}
