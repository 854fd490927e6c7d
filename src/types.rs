use serde::{Deserialize, Serialize};

/// One (diff, message) training pair extracted from a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Concatenated per-file diff bodies
    pub diff: String,
    /// Trimmed commit message (subject and body)
    pub message: String,
}

impl CommitRecord {
    pub fn new(diff: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            diff: diff.into(),
            message: message.into(),
        }
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Model-ready text pair produced by the preprocessing contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Prompt fed to the encoder
    pub input: String,
    /// Expected commit message
    pub target: String,
}

/// Request body for `POST /suggest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// Staged diff to describe
    #[serde(default)]
    pub diff: String,
    /// Local repository whose recent subjects are used as style context
    #[serde(default)]
    pub repo_path: Option<String>,
    /// Explicit style context (recent commit subjects)
    #[serde(default)]
    pub repo_context: Vec<String>,
    /// Number of suggestions to return
    #[serde(default)]
    pub num_return_sequences: Option<usize>,
}

/// Successful response from `POST /suggest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

/// Error body returned by the HTTP layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
