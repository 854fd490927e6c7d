//! Seq2seq model driven through an external command
//!
//! The command is invoked as `<program> [args..] <subcommand> ...` with one of:
//!
//! - `init --base <name> --output <dir>`
//! - `train --model <dir> --data <jsonl> --output <dir> --args <json>`
//! - `generate --model <dir> --num-return-sequences <n>` (prompt on stdin,
//!   JSON array of strings on stdout)
//!
//! Training writes into a staging directory which replaces the working
//! weights only when the command succeeds.

use super::snapshot::SNAPSHOT_MARKER;
use super::{ModelLoader, Seq2SeqModel, TrainingArgs, TrainingReport};
use crate::config::{ModelConfig, RuntimeConfig};
use crate::error::PipelineError;
use crate::types::TrainingExample;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;

/// How to launch the model backend
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
        }
    }

    pub fn from_config(model: &ModelConfig, runtime: &RuntimeConfig) -> Self {
        Self {
            program: model.command.clone(),
            args: model.args.clone(),
            env: runtime.child_env(),
        }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(subcommand);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn run(
        &self,
        mut cmd: Command,
        stdin: Option<&str>,
        on_error: fn(String) -> PipelineError,
    ) -> Result<Output, PipelineError> {
        tracing::debug!("Running model backend: {:?}", cmd);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| on_error(format!("failed to start '{}': {}", self.program, e)))?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())
                .map_err(|e| on_error(format!("failed to write prompt: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| on_error(format!("failed to wait for '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(on_error(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

/// A model whose weights live in a private working directory
#[derive(Debug)]
pub struct CommandModel {
    backend: CommandBackend,
    weights: TempDir,
    origin: String,
}

impl CommandModel {
    pub fn weights_dir(&self) -> &Path {
        self.weights.path()
    }
}

impl ModelLoader for CommandBackend {
    type Model = CommandModel;

    fn load(&self, dir: &Path) -> Result<CommandModel, PipelineError> {
        let weights = working_dir()?;
        copy_tree(dir, weights.path())?;
        Ok(CommandModel {
            backend: self.clone(),
            weights,
            origin: dir.display().to_string(),
        })
    }

    fn from_pretrained(&self, name: &str) -> Result<CommandModel, PipelineError> {
        let weights = working_dir()?;
        let mut cmd = self.command("init");
        cmd.arg("--base").arg(name).arg("--output").arg(weights.path());
        self.run(cmd, None, PipelineError::Training)?;
        Ok(CommandModel {
            backend: self.clone(),
            weights,
            origin: name.to_string(),
        })
    }
}

impl Seq2SeqModel for CommandModel {
    fn describe(&self) -> String {
        format!("{} (via {})", self.origin, self.backend.program)
    }

    fn train_epoch(
        &mut self,
        examples: &[TrainingExample],
        args: &TrainingArgs,
    ) -> Result<TrainingReport, PipelineError> {
        let data = write_examples(examples)?;
        let staging = working_dir()?;
        let args_json = serde_json::to_string(args)
            .map_err(|e| PipelineError::Training(format!("failed to encode arguments: {}", e)))?;

        let mut cmd = self.backend.command("train");
        cmd.arg("--model")
            .arg(self.weights.path())
            .arg("--data")
            .arg(data.path())
            .arg("--output")
            .arg(staging.path())
            .arg("--args")
            .arg(args_json);
        let output = self.backend.run(cmd, None, PipelineError::Training)?;

        self.weights = staging;
        Ok(parse_report(&output.stdout, examples.len()))
    }

    fn save(&self, dir: &Path) -> Result<(), PipelineError> {
        copy_tree(self.weights.path(), dir)
    }

    fn generate(
        &self,
        prompt: &str,
        num_return_sequences: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let mut cmd = self.backend.command("generate");
        cmd.arg("--model")
            .arg(self.weights.path())
            .arg("--num-return-sequences")
            .arg(num_return_sequences.to_string());
        let output = self.backend.run(cmd, Some(prompt), PipelineError::Generation)?;

        serde_json::from_slice(&output.stdout).map_err(|e| {
            PipelineError::Generation(format!("backend returned malformed output: {}", e))
        })
    }
}

fn working_dir() -> Result<TempDir, PipelineError> {
    Ok(tempfile::Builder::new()
        .prefix("easycommit-model-")
        .tempdir()?)
}

fn write_examples(examples: &[TrainingExample]) -> Result<NamedTempFile, PipelineError> {
    let file = tempfile::Builder::new()
        .prefix("easycommit-train-")
        .suffix(".jsonl")
        .tempfile()?;
    let mut writer = BufWriter::new(file.as_file());
    for example in examples {
        serde_json::to_writer(&mut writer, example)
            .map_err(|e| PipelineError::Training(format!("failed to write example: {}", e)))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    drop(writer);
    Ok(file)
}

/// The backend may print a report; anything else counts only the examples
fn parse_report(stdout: &[u8], examples: usize) -> TrainingReport {
    let text = String::from_utf8_lossy(stdout);
    text.lines()
        .rev()
        .find_map(|line| serde_json::from_str::<TrainingReport>(line.trim()).ok())
        .unwrap_or(TrainingReport {
            examples,
            ..Default::default()
        })
}

/// Copy every file under `from` into `to`, overwriting existing files
///
/// Nested snapshots (checkpoints kept below the current model) are skipped.
fn copy_tree(from: &Path, to: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(to)?;
    let walker = WalkDir::new(from)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.path().join(SNAPSHOT_MARKER).is_file()));
    for entry in walker {
        let entry = entry.map_err(|e| {
            PipelineError::Io(std::io::Error::other(format!(
                "failed to walk {}: {}",
                from.display(),
                e
            )))
        })?;
        let relative: PathBuf = match entry.path().strip_prefix(from) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
