use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use easycommit::config::Config;
use easycommit::dataset::DatasetFilter;
use easycommit::discovery::FileDiscovery;
use easycommit::git::extractor::{self, recent_subjects};
use easycommit::git::{BranchScope, CommitExtractor, ExtractionOptions, GitCloneHarvester};
use easycommit::host::ProcHostProbe;
use easycommit::inference::SuggestionService;
use easycommit::inference::server::{self, ServerState};
use easycommit::ledger::ProgressLedger;
use easycommit::model::{CommandBackend, CommandModel, SnapshotStore};
use easycommit::monitor::MonitorLog;
use easycommit::trainer::{ContinualTrainer, SystemClock, TrainerParts, TrainerSettings};
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "EASYCOMMIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the continual-training loop
    Train {
        /// Newline-delimited list of repository URLs
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Run a single cycle and exit without sleeping
        #[arg(long)]
        once: bool,
    },

    /// Extract filtered (diff, message) records from a local repository as JSONL
    Extract {
        /// Path to the repository
        path: PathBuf,

        /// Maximum number of records to extract
        #[arg(long)]
        max_commits: Option<usize>,

        /// Walk every local branch instead of the active one
        #[arg(long)]
        all_branches: bool,

        /// Keep full patches instead of only added/removed lines
        #[arg(long)]
        full_diff: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print suggestions for the staged changes of a repository
    Suggest {
        /// Path to the repository
        repo: PathBuf,

        /// Number of suggestions
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Serve suggestions over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show training progress
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Train { sources, once } => train(config, sources, once).await,
        Command::Extract {
            path,
            max_commits,
            all_branches,
            full_diff,
            output,
        } => {
            let mut options = ExtractionOptions::from(&config.extraction);
            if let Some(max) = max_commits {
                options.max_commits = max;
            }
            if all_branches {
                options.branches = BranchScope::AllLocal;
            }
            if full_diff {
                options.changes_only = false;
            }
            extract(&config, &path, &options, output)
        }
        Command::Suggest { repo, count } => suggest(&config, &repo, count),
        Command::Serve { port } => serve(config, port).await,
        Command::Status => status(&config),
    }
}

async fn train(mut config: Config, sources: Option<PathBuf>, once: bool) -> Result<()> {
    if let Some(sources) = sources {
        config.paths.sources_path = sources;
    }
    tracing::info!("Reading sources from {}", config.paths.sources_path.display());

    tokio::task::spawn_blocking(move || -> Result<()> {
        let parts = TrainerParts {
            discovery: FileDiscovery::new(&config.paths.sources_path),
            harvester: GitCloneHarvester::new(),
            probe: ProcHostProbe::from(&config.schedule),
            loader: CommandBackend::from_config(&config.model, &config.runtime),
            clock: SystemClock,
        };
        let mut trainer = ContinualTrainer::new(TrainerSettings::from(&config), parts)?;

        if once {
            let report = trainer.run_cycle()?;
            tracing::info!(
                "Cycle finished: {} processed, {} trained, {} skipped, {} failed",
                report.processed,
                report.trained,
                report.skipped,
                report.failed
            );
        } else {
            trainer.run()?;
        }
        Ok(())
    })
    .await
    .context("Training task panicked")?
}

fn extract(
    config: &Config,
    path: &Path,
    options: &ExtractionOptions,
    output: Option<PathBuf>,
) -> Result<()> {
    let records = extractor::extract(path, options)?;
    let outcome = DatasetFilter::from(&config.filter).apply(records);
    tracing::info!(
        "Kept {} of {} commits from {}",
        outcome.accepted(),
        outcome.total,
        path.display()
    );

    let writer: Box<dyn Write> = match &output {
        Some(file) => Box::new(
            std::fs::File::create(file)
                .with_context(|| format!("Failed to create {}", file.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);
    for record in &outcome.records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    if let Some(file) = output {
        println!("Wrote {} records to {}", outcome.accepted(), file.display());
    }
    Ok(())
}

fn load_service(config: &Config) -> Result<SuggestionService<CommandModel>> {
    let backend = CommandBackend::from_config(&config.model, &config.runtime);
    let store = SnapshotStore::new(&config.paths.model_dir, &config.paths.checkpoints_dir);
    let (service, origin) = SuggestionService::load(
        &backend,
        &store,
        &config.training.base_model,
        config.server.num_suggestions,
    )?;
    tracing::info!("Loaded model: {:?}", origin);
    Ok(service)
}

fn suggest(config: &Config, repo: &Path, count: Option<usize>) -> Result<()> {
    let diff = CommitExtractor::open(repo)?.staged_diff(config.extraction.changes_only)?;
    if diff.trim().is_empty() {
        bail!("No staged changes in {}", repo.display());
    }

    let context = recent_subjects(repo, config.server.context_commits);
    let service = load_service(config)?;
    let suggestions = service.suggest(&diff, &context, count)?;

    if suggestions.is_empty() {
        println!("No suggestions produced");
    }
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("{}. {}", i + 1, suggestion);
    }
    Ok(())
}

async fn serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?;

    let context_commits = config.server.context_commits;
    let service = tokio::task::spawn_blocking(move || load_service(&config))
        .await
        .context("Model loading task panicked")??;

    let state = Arc::new(ServerState {
        service,
        context_commits,
    });
    server::serve(state, addr).await;
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let ledger = ProgressLedger::load(&config.paths.ledger_path)?;
    println!("Processed repositories: {}", ledger.len());

    let store = SnapshotStore::new(&config.paths.model_dir, &config.paths.checkpoints_dir);
    println!(
        "Current snapshot: {}",
        if store.has_current() {
            store.current_dir().display().to_string()
        } else {
            "none".to_string()
        }
    );
    println!("Checkpoints: {}", store.list_checkpoints().len());

    if config.paths.monitor_path.exists() {
        let rows = MonitorLog::open(&config.paths.monitor_path)?.read_all()?;
        let samples: usize = rows.iter().map(|row| row.valid_samples).sum();
        println!("Trained repositories: {}", rows.len());
        println!("Training samples used: {}", samples);
        if let Some(last) = rows.last() {
            println!("Last trained: {} at {}", last.repo_url, last.timestamp);
        }
    } else {
        println!("Trained repositories: 0");
    }
    Ok(())
}
