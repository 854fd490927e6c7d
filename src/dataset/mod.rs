//! Quality filtering and dataset construction
//!
//! Records are length-capped first, then scored with a cheap
//! conventional-commit heuristic. Repositories that keep too few records are
//! rejected as a whole.

/// Prompt construction shared by training and inference
pub mod preprocess;

use crate::config::FilterConfig;
use crate::error::PipelineError;
use crate::types::CommitRecord;
use std::borrow::Cow;

/// Appended to any diff cut by [`truncate`]
pub const TRUNCATION_MARKER: &str = "\n[...truncated...]";

/// Message types recognised as conventional-commit prefixes
pub const CONVENTIONAL_PREFIXES: [&str; 7] =
    ["feat", "fix", "chore", "docs", "refactor", "style", "deps"];

/// Messages longer than this (in characters) are penalised
const LONG_MESSAGE_CHARS: usize = 100;

/// Score a commit message in `[0, 1]`
///
/// Starts at 1.0; -0.5 above 100 characters, -0.3 without a conventional
/// prefix, -0.2 without a `:`. Penalties are summed in tenths so the result is
/// exact at the boundaries.
pub fn score_message(message: &str) -> f32 {
    let mut penalty_tenths: u8 = 0;

    if message.chars().count() > LONG_MESSAGE_CHARS {
        penalty_tenths += 5;
    }
    if !CONVENTIONAL_PREFIXES
        .iter()
        .any(|prefix| message.starts_with(prefix))
    {
        penalty_tenths += 3;
    }
    if !message.contains(':') {
        penalty_tenths += 2;
    }

    f32::from(10u8.saturating_sub(penalty_tenths)) / 10.0
}

/// Whether a record's message clears `min_score`
pub fn accept(record: &CommitRecord, min_score: f32) -> bool {
    score_message(&record.message) >= min_score
}

/// Cut `text` to `limit` characters and append [`TRUNCATION_MARKER`]
///
/// Text within the limit is returned unchanged.
pub fn truncate(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            Cow::Owned(out)
        }
    }
}

/// Records extracted from one repository, after filtering
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Records before filtering
    pub total: usize,
    /// Records that passed the score threshold
    pub records: Vec<CommitRecord>,
}

impl FilterOutcome {
    pub fn accepted(&self) -> usize {
        self.records.len()
    }
}

/// The training set for one repository snapshot
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Source identifier the records came from
    pub source: String,
    pub records: Vec<CommitRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Truncation, scoring and the minimum-size gate
#[derive(Debug, Clone)]
pub struct DatasetFilter {
    pub diff_char_limit: usize,
    pub min_score: f32,
    pub min_records: usize,
}

impl Default for DatasetFilter {
    fn default() -> Self {
        Self::from(&FilterConfig::default())
    }
}

impl From<&FilterConfig> for DatasetFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            diff_char_limit: config.diff_char_limit,
            min_score: config.min_score,
            min_records: config.min_records,
        }
    }
}

impl DatasetFilter {
    /// Truncate every diff, then drop records scoring below `min_score`
    pub fn apply(&self, records: Vec<CommitRecord>) -> FilterOutcome {
        let total = records.len();
        let records = records
            .into_iter()
            .map(|mut record| {
                if let Cow::Owned(cut) = truncate(&record.diff, self.diff_char_limit) {
                    record.diff = cut;
                }
                record
            })
            .filter(|record| accept(record, self.min_score))
            .collect::<Vec<_>>();

        tracing::debug!("Filter kept {} of {} records", records.len(), total);
        FilterOutcome { total, records }
    }

    /// Turn an outcome into a dataset, rejecting it if too small
    pub fn check_sufficient(
        &self,
        source: &str,
        outcome: FilterOutcome,
    ) -> Result<Dataset, PipelineError> {
        if outcome.records.is_empty() || outcome.records.len() < self.min_records {
            return Err(PipelineError::InsufficientData {
                found: outcome.records.len(),
                required: self.min_records,
            });
        }

        Ok(Dataset {
            source: source.to_string(),
            records: outcome.records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> CommitRecord {
        CommitRecord::new("+line\n", message)
    }

    #[test]
    fn test_score_perfect_message() {
        assert_eq!(score_message("fix: correct off-by-one"), 1.0);
    }

    #[test]
    fn test_score_long_free_text_clamps_to_zero() {
        let message = "This sentence rambles on about many unrelated changes made across the code base without any kind of structure whatsoever at all ok";
        assert!(message.chars().count() > 100);
        assert_eq!(score_message(message), 0.0);
    }

    #[test]
    fn test_score_individual_penalties() {
        assert_eq!(score_message("Add new parser: json"), 0.7);
        assert_eq!(score_message("feat add parser"), 0.8);
        assert_eq!(score_message("Add parser"), 0.5);
        let long = format!("feat: {}", "x".repeat(100));
        assert_eq!(score_message(&long), 0.5);
    }

    #[test]
    fn test_score_is_bounded() {
        let long = "y".repeat(500);
        for message in ["", ":", "docs", "style:", long.as_str()] {
            let score = score_message(message);
            assert!((0.0..=1.0).contains(&score), "{message:?} -> {score}");
        }
    }

    #[test]
    fn test_accept_threshold() {
        assert!(accept(&record("Add parser"), 0.5));
        assert!(!accept(&record(&"added things ".repeat(10)), 0.5));
        assert!(accept(&record("deps: bump serde"), 0.5));
    }

    #[test]
    fn test_truncate_short_input_unchanged() {
        let text = "+short diff";
        let out = truncate(text, 100);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, text);
        assert_eq!(truncate(text, text.len()), text);
    }

    #[test]
    fn test_truncate_long_input() {
        let text = "a".repeat(50);
        let out = truncate(&text, 10);
        assert_eq!(
            out.chars().count(),
            10 + TRUNCATION_MARKER.chars().count()
        );
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.starts_with("aaaaaaaaaa\n"));
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let text = "é".repeat(20);
        let out = truncate(&text, 5);
        assert!(out.starts_with("ééééé\n"));
        assert_eq!(out.chars().count(), 5 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_filter_truncates_before_scoring() {
        let filter = DatasetFilter {
            diff_char_limit: 4,
            min_score: 0.5,
            min_records: 1,
        };
        let records = vec![
            CommitRecord::new("+abcdefgh\n", "feat: long diff"),
            CommitRecord::new("+x\n", "random words ".repeat(10)),
        ];

        let outcome = filter.apply(records);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.accepted(), 1);
        assert_eq!(
            outcome.records[0].diff,
            format!("+abc{}", TRUNCATION_MARKER)
        );
    }

    #[test]
    fn test_check_sufficient_rejects_small_sets() {
        let filter = DatasetFilter::default();
        let outcome = filter.apply((0..9).map(|i| record(&format!("fix: bug {i}"))).collect());

        let err = filter.check_sufficient("repo", outcome).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData {
                found: 9,
                required: 10
            }
        ));
    }

    #[test]
    fn test_check_sufficient_rejects_empty_even_with_zero_minimum() {
        let filter = DatasetFilter {
            min_records: 0,
            ..Default::default()
        };
        let outcome = FilterOutcome {
            total: 0,
            records: vec![],
        };
        assert!(filter.check_sufficient("repo", outcome).is_err());
    }

    #[test]
    fn test_check_sufficient_accepts_threshold() {
        let filter = DatasetFilter::default();
        let outcome = filter.apply((0..10).map(|i| record(&format!("fix: bug {i}"))).collect());

        let dataset = filter.check_sufficient("repo", outcome).unwrap();
        assert_eq!(dataset.len(), 10);
        assert_eq!(dataset.source, "repo");
    }
}
