//! The continual-training loop
//!
//! The trainer loads a model once, then cycles forever:
//!
//! ```text
//! LoadingModel -> { FetchingSources -> ProcessingRepo* -> SavingModel } -> Sleeping -> FetchingSources ...
//! ```
//!
//! Repositories are processed one at a time. Any per-repository failure is
//! logged and the URL is still marked done in the ledger; only ledger I/O
//! (and failing to obtain a model at all) stops the loop.
//!
//! Every collaborator is injected so a cycle can be driven without network,
//! real host readings or wall-clock sleeps.

use crate::config::{Config, PathsConfig, SaveStrategy, ScheduleConfig, TrainingConfig};
use crate::dataset::DatasetFilter;
use crate::dataset::preprocess::to_examples;
use crate::discovery::SourceDiscovery;
use crate::error::{EasyCommitError, PipelineError};
use crate::git::extractor;
use crate::git::{ExtractionOptions, RepoHarvester, repo_name};
use crate::host::{HostProbe, ResourcePlan};
use crate::ledger::ProgressLedger;
use crate::model::{
    ModelLoader, ModelOrigin, Seq2SeqModel, SnapshotStore, TrainingArgs, load_latest_or_base,
};
use crate::monitor::{MonitorLog, MonitorRow};
use chrono::{DateTime, Local};
use std::time::Duration;

/// Where the loop currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerState {
    LoadingModel,
    FetchingSources,
    ProcessingRepo(String),
    SavingModel,
    Sleeping(Duration),
}

/// Time source and sleeper
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
    fn sleep(&self, duration: Duration);
}

/// Wall clock; sleeps block the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of one repository attempt
#[derive(Debug)]
pub enum RepoOutcome {
    Trained { total: usize, valid: usize },
    Skipped(PipelineError),
    Failed(PipelineError),
}

impl RepoOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, RepoOutcome::Trained { .. })
    }
}

/// Summary of one FETCHING -> PROCESSING* -> SAVING pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// URLs returned by discovery
    pub discovered: usize,
    /// URLs attempted this cycle
    pub processed: usize,
    pub trained: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Backoff to apply before the next cycle
    pub backoff: Duration,
}

/// Static settings of the loop, taken from [`Config`]
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub paths: PathsConfig,
    pub extraction: ExtractionOptions,
    pub filter: DatasetFilter,
    pub training: TrainingConfig,
    pub schedule: ScheduleConfig,
}

impl From<&Config> for TrainerSettings {
    fn from(config: &Config) -> Self {
        Self {
            paths: config.paths.clone(),
            extraction: ExtractionOptions::from(&config.extraction),
            filter: DatasetFilter::from(&config.filter),
            training: config.training.clone(),
            schedule: config.schedule.clone(),
        }
    }
}

/// The injected collaborators
pub struct TrainerParts<D, H, P, L, C> {
    pub discovery: D,
    pub harvester: H,
    pub probe: P,
    pub loader: L,
    pub clock: C,
}

/// Repository-by-repository fine-tuning loop
pub struct ContinualTrainer<D, H, P, L: ModelLoader, C> {
    settings: TrainerSettings,
    discovery: D,
    harvester: H,
    probe: P,
    loader: L,
    clock: C,
    store: SnapshotStore,
    ledger: ProgressLedger,
    monitor: MonitorLog,
    model: Option<L::Model>,
    origin: Option<ModelOrigin>,
    state: TrainerState,
}

impl<D, H, P, L, C> ContinualTrainer<D, H, P, L, C>
where
    D: SourceDiscovery,
    H: RepoHarvester,
    P: HostProbe,
    L: ModelLoader,
    C: Clock,
{
    /// Load the ledger and open the monitor log
    pub fn new(
        settings: TrainerSettings,
        parts: TrainerParts<D, H, P, L, C>,
    ) -> Result<Self, EasyCommitError> {
        let ledger = ProgressLedger::load(&settings.paths.ledger_path)?;
        let monitor = MonitorLog::open(&settings.paths.monitor_path)?;
        let store = SnapshotStore::new(
            settings.paths.model_dir.clone(),
            settings.paths.checkpoints_dir.clone(),
        );

        Ok(Self {
            settings,
            discovery: parts.discovery,
            harvester: parts.harvester,
            probe: parts.probe,
            loader: parts.loader,
            clock: parts.clock,
            store,
            ledger,
            monitor,
            model: None,
            origin: None,
            state: TrainerState::LoadingModel,
        })
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Where the in-memory model was loaded from, once loaded
    pub fn origin(&self) -> Option<&ModelOrigin> {
        self.origin.as_ref()
    }

    /// Run cycles forever; returns only on a fatal error
    pub fn run(&mut self) -> Result<(), EasyCommitError> {
        loop {
            self.step()?;
        }
    }

    /// One cycle followed by its backoff sleep
    pub fn step(&mut self) -> Result<CycleReport, EasyCommitError> {
        let report = self.run_cycle()?;
        self.state = TrainerState::Sleeping(report.backoff);
        tracing::info!("Sleeping for {} seconds", report.backoff.as_secs());
        self.clock.sleep(report.backoff);
        Ok(report)
    }

    /// Fetch sources, process every pending one and save; no sleeping
    pub fn run_cycle(&mut self) -> Result<CycleReport, EasyCommitError> {
        self.ensure_model()?;

        self.state = TrainerState::FetchingSources;
        let candidates = match self.discovery.discover() {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Source discovery failed: {:#}", e);
                Vec::new()
            }
        };
        let pending = self.ledger.pending(&candidates);

        let mut report = CycleReport {
            discovered: candidates.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            tracing::info!("No new repositories found");
            report.backoff = Duration::from_secs(self.settings.schedule.idle_sleep_secs);
            return Ok(report);
        }

        tracing::info!(
            "{} new repositories to process ({} discovered)",
            pending.len(),
            candidates.len()
        );

        for url in &pending {
            match self.process_repository(url)? {
                RepoOutcome::Trained { .. } => report.trained += 1,
                RepoOutcome::Skipped(_) => report.skipped += 1,
                RepoOutcome::Failed(_) => report.failed += 1,
            }
            report.processed += 1;
        }

        if self.settings.training.save_strategy == SaveStrategy::PerBatch && report.trained > 0 {
            self.state = TrainerState::SavingModel;
            if let Err(e) = self.save_current() {
                tracing::error!("Failed to save model after batch: {}", e);
            }
        }

        tracing::info!(
            "Batch complete: {} trained, {} skipped, {} failed",
            report.trained,
            report.skipped,
            report.failed
        );
        report.backoff = Duration::from_secs(self.settings.schedule.batch_sleep_secs);
        Ok(report)
    }

    /// Attempt one repository and record it in the ledger whatever happens
    pub fn process_repository(&mut self, url: &str) -> Result<RepoOutcome, EasyCommitError> {
        self.ensure_model()?;
        self.throttle();

        self.state = TrainerState::ProcessingRepo(url.to_string());
        tracing::info!("Processing {}", url);

        let outcome = match self.train_on(url) {
            Ok((total, valid)) => {
                tracing::info!("Trained on {} ({} of {} commits kept)", url, valid, total);
                RepoOutcome::Trained { total, valid }
            }
            Err(e) if e.is_skip() => {
                tracing::info!("Skipping {}: {}", url, e);
                RepoOutcome::Skipped(e)
            }
            Err(e) => {
                tracing::error!("Error processing {} ({}): {}", url, e.kind(), e);
                RepoOutcome::Failed(e)
            }
        };

        self.ledger.add(url);
        self.ledger.save()?;
        Ok(outcome)
    }

    /// LOADING_MODEL, entered once
    fn ensure_model(&mut self) -> Result<(), EasyCommitError> {
        if self.model.is_some() {
            return Ok(());
        }
        self.state = TrainerState::LoadingModel;
        let (model, origin) =
            load_latest_or_base(&self.loader, &self.store, &self.settings.training.base_model)
                .map_err(|e| EasyCommitError::other(format!("Failed to load model: {}", e)))?;
        self.model = Some(model);
        self.origin = Some(origin);
        Ok(())
    }

    /// Block while the host is busier than the configured ceiling
    fn throttle(&self) {
        let schedule = &self.settings.schedule;
        if !schedule.throttle {
            return;
        }
        while self.probe.utilization_exceeds(schedule.cpu_ceiling_percent) {
            tracing::warn!(
                "CPU usage above {}%, waiting {} seconds",
                schedule.cpu_ceiling_percent,
                schedule.cpu_poll_interval_secs
            );
            self.clock
                .sleep(Duration::from_secs(schedule.cpu_poll_interval_secs));
        }
    }

    /// Harvest, extract, filter, train and save; returns (extracted, kept)
    fn train_on(&mut self, url: &str) -> Result<(usize, usize), PipelineError> {
        let plan = ResourcePlan::detect(&self.probe, self.settings.extraction.max_commits);

        let checkout = self.harvester.acquire(url)?;
        let options = ExtractionOptions {
            max_commits: plan.max_commits,
            ..self.settings.extraction.clone()
        };
        let records = extractor::extract(checkout.path(), &options)?;
        checkout.close();

        let outcome = self.settings.filter.apply(records);
        let total = outcome.total;
        let dataset = self.settings.filter.check_sufficient(url, outcome)?;
        let valid = dataset.len();
        let examples = to_examples(&dataset);

        let args = TrainingArgs::from_config(&self.settings.training, plan.batch_size);
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| PipelineError::Training("no model loaded".to_string()))?;
        let report = model.train_epoch(&examples, &args)?;
        tracing::debug!(
            "Training pass on {} examples finished (loss: {:?})",
            report.examples,
            report.loss
        );

        self.state = TrainerState::SavingModel;
        let now = self.clock.now();
        if self.settings.training.save_strategy == SaveStrategy::PerRepository {
            self.store.save_current(&*model, now)?;
        }
        self.store.save_checkpoint(&*model, &repo_name(url), now)?;

        if let Err(e) = self
            .monitor
            .append(&MonitorRow::new(now, url, total, valid))
        {
            tracing::warn!("Failed to write monitor log: {:#}", e);
        }

        Ok((total, valid))
    }

    fn save_current(&self) -> Result<(), PipelineError> {
        match &self.model {
            Some(model) => self.store.save_current(model, self.clock.now()),
            None => Ok(()),
        }
    }
}
