/// Centralized error types for easycommit using thiserror
///
/// Per-repository failures (`PipelineError`) are caught at the repository
/// boundary of the training loop and never stop it. Ledger failures are fatal
/// because the loop can no longer tell what it has already trained on.
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum EasyCommitError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while processing a single source repository
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to clone '{url}': {reason}")]
    Clone { url: String, reason: String },

    #[error("No usable branch in repository: {0}")]
    NoBranch(String),

    #[error("Not enough quality commits: found {found}, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    #[error("Failed to extract commits: {0}")]
    Extraction(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading or writing the progress ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("Ledger '{path}' is not a JSON array of strings: {reason}")]
    Parse { path: String, reason: String },

    #[error("Failed to write ledger '{path}': {reason}")]
    Write { path: String, reason: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<anyhow::Error> for EasyCommitError {
    fn from(err: anyhow::Error) -> Self {
        EasyCommitError::Other(format!("{:#}", err))
    }
}

impl EasyCommitError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        EasyCommitError::Other(msg.into())
    }

    /// Convert to a user-facing error string
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Whether the continual loop must stop on this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EasyCommitError::Pipeline(_))
    }
}

impl PipelineError {
    /// Short machine-friendly label used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Clone { .. } => "clone",
            PipelineError::NoBranch(_) => "no-branch",
            PipelineError::InsufficientData { .. } => "insufficient-data",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Training(_) => "training",
            PipelineError::Generation(_) => "generation",
            PipelineError::Io(_) => "io",
        }
    }

    /// Whether this outcome is an expected skip rather than a failure
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PipelineError::NoBranch(_) | PipelineError::InsufficientData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EasyCommitError::Pipeline(PipelineError::NoBranch("/tmp/x".to_string()));
        assert_eq!(
            err.to_string(),
            "Pipeline error: No usable branch in repository: /tmp/x"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EasyCommitError = io_err.into();
        assert!(matches!(err, EasyCommitError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: EasyCommitError = anyhow::anyhow!("test error").into();
        assert!(matches!(err, EasyCommitError::Other(_)));
        assert_eq!(err.to_user_string(), "test error");
    }

    #[test]
    fn test_is_fatal() {
        let pipeline = EasyCommitError::Pipeline(PipelineError::Training("oom".to_string()));
        assert!(!pipeline.is_fatal());

        let ledger = EasyCommitError::Ledger(LedgerError::Write {
            path: "urls.json".to_string(),
            reason: "read-only filesystem".to_string(),
        });
        assert!(ledger.is_fatal());
    }

    #[test]
    fn test_insufficient_data_display() {
        let err = PipelineError::InsufficientData {
            found: 3,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "Not enough quality commits: found 3, need at least 10"
        );
        assert!(err.is_skip());
        assert_eq!(err.kind(), "insufficient-data");
    }

    #[test]
    fn test_clone_error_is_not_skip() {
        let err = PipelineError::Clone {
            url: "https://example.com/r.git".to_string(),
            reason: "unreachable".to_string(),
        };
        assert!(!err.is_skip());
        assert_eq!(
            err.to_string(),
            "Failed to clone 'https://example.com/r.git': unreachable"
        );
    }

    #[test]
    fn test_ledger_error_parse() {
        let err = LedgerError::Parse {
            path: "urls.json".to_string(),
            reason: "expected array".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Ledger 'urls.json' is not a JSON array of strings: expected array"
        );
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::InvalidValue {
            key: "filter.min_score".to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'filter.min_score': must be between 0.0 and 1.0"
        );
    }
}
