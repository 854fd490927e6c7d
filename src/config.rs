/// Configuration system for easycommit
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, EasyCommitError};
use crate::paths::PlatformPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// On-disk locations for the model, ledger and logs
    #[serde(default)]
    pub paths: PathsConfig,

    /// Commit extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Dataset quality filter settings
    #[serde(default)]
    pub filter: FilterConfig,

    /// Training hyperparameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Loop timing and CPU throttling
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Thread and device settings handed to the model backend
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// External model command
    #[serde(default)]
    pub model: ModelConfig,

    /// Suggestion endpoint
    #[serde(default)]
    pub server: ServerConfig,
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Fixed location of the current model snapshot (overwritten)
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Root for timestamped checkpoints (append-only)
    #[serde(default = "default_checkpoints_dir")]
    pub checkpoints_dir: PathBuf,

    /// JSON array of already processed clone URLs
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// CSV row per successfully trained repository
    #[serde(default = "default_monitor_path")]
    pub monitor_path: PathBuf,

    /// Newline-delimited list of candidate clone URLs
    #[serde(default = "default_sources_path")]
    pub sources_path: PathBuf,
}

/// Commit extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum number of records extracted per repository
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,

    /// Walk every local branch instead of only the active one
    #[serde(default)]
    pub all_branches: bool,

    /// Keep only added/removed lines in diffs
    #[serde(default = "default_true")]
    pub changes_only: bool,
}

/// Dataset filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Diffs longer than this (in characters) are truncated
    #[serde(default = "default_diff_char_limit")]
    pub diff_char_limit: usize,

    /// Minimum message score for a record to be kept (0.0 to 1.0)
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Repositories with fewer accepted records are skipped
    #[serde(default = "default_min_records")]
    pub min_records: usize,
}

/// When the current snapshot is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveStrategy {
    /// Overwrite the current snapshot after every trained repository
    #[default]
    PerRepository,
    /// Overwrite the current snapshot once per discovery batch
    PerBatch,
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Pretrained model used when no snapshot or checkpoint exists
    #[serde(default = "default_base_model")]
    pub base_model: String,

    #[serde(default = "default_epochs")]
    pub epochs: u32,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,

    #[serde(default = "default_logging_steps")]
    pub logging_steps: u32,

    #[serde(default = "default_dataloader_workers")]
    pub dataloader_workers: usize,

    /// Token limit for the diff prompt
    #[serde(default = "default_max_length")]
    pub max_source_length: usize,

    /// Token limit for the commit message label
    #[serde(default = "default_max_length")]
    pub max_target_length: usize,

    #[serde(default)]
    pub save_strategy: SaveStrategy,
}

/// Loop timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Pause before each repository while host CPU is above the ceiling
    #[serde(default = "default_true")]
    pub throttle: bool,

    /// CPU utilisation ceiling in percent
    #[serde(default = "default_cpu_ceiling")]
    pub cpu_ceiling_percent: f32,

    /// Seconds between CPU utilisation checks while throttled
    #[serde(default = "default_cpu_poll_interval")]
    pub cpu_poll_interval_secs: u64,

    /// Seconds between the two `/proc/stat` samples of one CPU reading
    #[serde(default = "default_cpu_sample_window")]
    pub cpu_sample_window_secs: u64,

    /// Sleep after a full discovery batch
    #[serde(default = "default_batch_sleep")]
    pub batch_sleep_secs: u64,

    /// Sleep when discovery yields nothing new
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_secs: u64,
}

/// Execution settings for the model backend
///
/// Applied to backend child processes only; the host process environment
/// is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Intra-op thread count for the model runtime
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Hide accelerators from the model runtime
    #[serde(default = "default_true")]
    pub cpu_only: bool,
}

/// External model command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Program implementing the `init`, `train` and `generate` subcommands
    #[serde(default = "default_model_command")]
    pub command: String,

    /// Extra arguments placed before the subcommand
    #[serde(default)]
    pub args: Vec<String>,
}

/// Suggestion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Suggestions returned when the request does not say
    #[serde(default = "default_num_suggestions")]
    pub num_suggestions: usize,

    /// Recent commit subjects read from `repo_path` as style context
    #[serde(default = "default_context_commits")]
    pub context_commits: usize,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_model_dir() -> PathBuf {
    PlatformPaths::default_model_dir()
}

fn default_checkpoints_dir() -> PathBuf {
    PlatformPaths::default_checkpoints_dir()
}

fn default_ledger_path() -> PathBuf {
    PlatformPaths::default_ledger_path()
}

fn default_monitor_path() -> PathBuf {
    PlatformPaths::default_monitor_path()
}

fn default_sources_path() -> PathBuf {
    PlatformPaths::default_sources_path()
}

fn default_max_commits() -> usize {
    10_000
}

fn default_diff_char_limit() -> usize {
    2000
}

fn default_min_score() -> f32 {
    0.5
}

fn default_min_records() -> usize {
    10
}

fn default_base_model() -> String {
    "t5-base".to_string()
}

fn default_epochs() -> u32 {
    1
}

fn default_learning_rate() -> f64 {
    5e-5
}

fn default_weight_decay() -> f64 {
    0.01
}

fn default_logging_steps() -> u32 {
    10
}

fn default_dataloader_workers() -> usize {
    6
}

fn default_max_length() -> usize {
    128
}

fn default_cpu_ceiling() -> f32 {
    80.0
}

fn default_cpu_poll_interval() -> u64 {
    5
}

fn default_cpu_sample_window() -> u64 {
    1
}

fn default_batch_sleep() -> u64 {
    600
}

fn default_idle_sleep() -> u64 {
    3600
}

fn default_threads() -> usize {
    6
}

fn default_model_command() -> String {
    "easycommit-model".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_num_suggestions() -> usize {
    4
}

fn default_context_commits() -> usize {
    10
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            checkpoints_dir: default_checkpoints_dir(),
            ledger_path: default_ledger_path(),
            monitor_path: default_monitor_path(),
            sources_path: default_sources_path(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_commits: default_max_commits(),
            all_branches: false,
            changes_only: true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            diff_char_limit: default_diff_char_limit(),
            min_score: default_min_score(),
            min_records: default_min_records(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            base_model: default_base_model(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            logging_steps: default_logging_steps(),
            dataloader_workers: default_dataloader_workers(),
            max_source_length: default_max_length(),
            max_target_length: default_max_length(),
            save_strategy: SaveStrategy::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            throttle: true,
            cpu_ceiling_percent: default_cpu_ceiling(),
            cpu_poll_interval_secs: default_cpu_poll_interval(),
            cpu_sample_window_secs: default_cpu_sample_window(),
            batch_sleep_secs: default_batch_sleep(),
            idle_sleep_secs: default_idle_sleep(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            cpu_only: true,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: default_model_command(),
            args: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            num_suggestions: default_num_suggestions(),
            context_commits: default_context_commits(),
        }
    }
}

impl RuntimeConfig {
    /// Environment variables applied to model backend child processes
    pub fn child_env(&self) -> Vec<(&'static str, String)> {
        let threads = self.threads.to_string();
        let mut env = vec![
            ("OMP_NUM_THREADS", threads.clone()),
            ("MKL_NUM_THREADS", threads),
        ];
        if self.cpu_only {
            env.push(("CUDA_VISIBLE_DEVICES", "-1".to_string()));
            env.push(("PYTORCH_ENABLE_MPS_FALLBACK", "0".to_string()));
        }
        env
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> EasyCommitError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, EasyCommitError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, EasyCommitError> {
        let config_path = PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), EasyCommitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), EasyCommitError> {
        if self.extraction.max_commits == 0 {
            return Err(invalid("extraction.max_commits", "must be greater than 0"));
        }

        if self.filter.diff_char_limit == 0 {
            return Err(invalid("filter.diff_char_limit", "must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.filter.min_score) {
            return Err(invalid(
                "filter.min_score",
                format!("must be between 0.0 and 1.0, got {}", self.filter.min_score),
            ));
        }

        if self.training.epochs == 0 {
            return Err(invalid("training.epochs", "must be greater than 0"));
        }

        if self.training.base_model.trim().is_empty() {
            return Err(invalid("training.base_model", "must not be empty"));
        }

        let ceiling = self.schedule.cpu_ceiling_percent;
        if !(ceiling > 0.0 && ceiling <= 100.0) {
            return Err(invalid(
                "schedule.cpu_ceiling_percent",
                format!("must be in (0, 100], got {}", ceiling),
            ));
        }

        if self.schedule.cpu_sample_window_secs == 0 {
            return Err(invalid(
                "schedule.cpu_sample_window_secs",
                "must be greater than 0",
            ));
        }

        if self.runtime.threads == 0 {
            return Err(invalid("runtime.threads", "must be greater than 0"));
        }

        if self.model.command.trim().is_empty() {
            return Err(invalid("model.command", "must not be empty"));
        }

        if self.server.num_suggestions == 0 {
            return Err(invalid("server.num_suggestions", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("EASYCOMMIT_MODEL_DIR") {
            self.paths.model_dir = PathBuf::from(&path);
            self.paths.checkpoints_dir = PathBuf::from(path).join("checkpoints");
        }

        if let Ok(path) = std::env::var("EASYCOMMIT_LEDGER") {
            self.paths.ledger_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("EASYCOMMIT_MONITOR") {
            self.paths.monitor_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("EASYCOMMIT_SOURCES") {
            self.paths.sources_path = PathBuf::from(path);
        }

        if let Ok(model) = std::env::var("EASYCOMMIT_BASE_MODEL") {
            self.training.base_model = model;
        }

        if let Ok(command) = std::env::var("EASYCOMMIT_MODEL_COMMAND") {
            self.model.command = command;
        }

        if let Ok(threads) = std::env::var("EASYCOMMIT_THREADS")
            && let Ok(threads) = threads.parse()
        {
            self.runtime.threads = threads;
        }

        if let Ok(max) = std::env::var("EASYCOMMIT_MAX_COMMITS")
            && let Ok(max) = max.parse()
        {
            self.extraction.max_commits = max;
        }

        if let Ok(port) = std::env::var("EASYCOMMIT_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
    }

    /// Load from `path` (or the default location) with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, EasyCommitError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
