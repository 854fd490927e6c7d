use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::types::CommitRecord;
use git2::{BranchType, Diff, DiffOptions, Oid, Patch, Repository, Sort};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Branch prefixes never walked in all-branches mode
const IGNORED_BRANCH_PREFIXES: [&str; 2] = ["dependabot", "gh-pages"];

/// Which branches to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchScope {
    /// Only the branch HEAD points at
    Active,
    /// Every local branch, de-duplicated by commit id
    AllLocal,
}

/// Options controlling commit extraction
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Maximum number of records to emit
    pub max_commits: usize,
    pub branches: BranchScope,
    /// Keep only `+`/`-` content lines in the diff
    pub changes_only: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_commits: 10_000,
            branches: BranchScope::Active,
            changes_only: true,
        }
    }
}

impl From<&ExtractionConfig> for ExtractionOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            max_commits: config.max_commits,
            branches: if config.all_branches {
                BranchScope::AllLocal
            } else {
                BranchScope::Active
            },
            changes_only: config.changes_only,
        }
    }
}

/// Whether a commit subject is merge bookkeeping rather than an authored change
pub fn is_merge_noise(message: &str) -> bool {
    let subject = message.trim_start().lines().next().unwrap_or("");
    subject.starts_with("Merge pull request")
        || subject.starts_with("Merge branch")
        || subject.to_lowercase().contains("pull request")
}

/// Decode bytes as UTF-8, dropping invalid sequences instead of failing
pub(crate) fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Walks a local checkout and produces (diff, message) records
pub struct CommitExtractor {
    repo: Repository,
    repo_path: PathBuf,
}

impl CommitExtractor {
    /// Open the repository at `path` (no upward discovery)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let repo_path = path.as_ref().to_path_buf();
        let repo = Repository::open(&repo_path).map_err(|e| {
            PipelineError::Extraction(format!(
                "failed to open repository at {}: {}",
                repo_path.display(),
                e.message()
            ))
        })?;

        tracing::debug!("Opened git repository at: {}", repo_path.display());
        Ok(Self { repo, repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Name of the branch HEAD points at, or None if HEAD is unborn or detached
    pub fn active_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(|s| s.to_string())
    }

    /// Extract up to `options.max_commits` records, newest first per branch
    pub fn extract(&self, options: &ExtractionOptions) -> Result<Vec<CommitRecord>, PipelineError> {
        let tips = self.branch_tips(options.branches)?;

        let mut seen: HashSet<Oid> = HashSet::new();
        let mut records = Vec::new();
        let mut walked = 0usize;
        let mut merge_noise = 0usize;

        for (branch, tip) in tips {
            tracing::debug!("Walking branch '{}'", branch);

            let mut revwalk = self.repo.revwalk().map_err(extraction_error)?;
            revwalk
                .set_sorting(Sort::TIME | Sort::TOPOLOGICAL)
                .map_err(extraction_error)?;
            revwalk.push(tip).map_err(extraction_error)?;

            for oid in revwalk {
                if records.len() >= options.max_commits {
                    tracing::info!(
                        "Reached limit of {} commits, stopping extraction",
                        options.max_commits
                    );
                    return Ok(records);
                }

                let oid = oid.map_err(extraction_error)?;
                if !seen.insert(oid) {
                    continue;
                }
                walked += 1;

                let commit = self.repo.find_commit(oid).map_err(extraction_error)?;
                let message = decode_dropping_invalid(commit.message_bytes())
                    .trim()
                    .to_string();

                if is_merge_noise(&message) {
                    merge_noise += 1;
                    continue;
                }

                let diff = self.commit_diff(&commit, options.changes_only)?;
                records.push(CommitRecord { diff, message });

                if walked % 100 == 0 {
                    tracing::debug!("Processed {} commits", walked);
                }
            }
        }

        tracing::info!(
            "Extracted {} records from {} commits ({} merge commits skipped)",
            records.len(),
            walked,
            merge_noise
        );
        Ok(records)
    }

    /// Resolve the starting points of the walk
    fn branch_tips(&self, scope: BranchScope) -> Result<Vec<(String, Oid)>, PipelineError> {
        match scope {
            BranchScope::Active => {
                let head = self.repo.head().map_err(|e| {
                    PipelineError::NoBranch(format!(
                        "{}: {}",
                        self.repo_path.display(),
                        e.message()
                    ))
                })?;
                if !head.is_branch() {
                    return Err(PipelineError::NoBranch(format!(
                        "{}: HEAD is detached",
                        self.repo_path.display()
                    )));
                }
                let tip = head.target().ok_or_else(|| {
                    PipelineError::NoBranch(format!("{}: HEAD has no target", self.repo_path.display()))
                })?;
                let name = head.shorthand().unwrap_or_default().to_string();
                Ok(vec![(name, tip)])
            }
            BranchScope::AllLocal => {
                let mut tips = Vec::new();
                for branch in self
                    .repo
                    .branches(Some(BranchType::Local))
                    .map_err(extraction_error)?
                {
                    let (branch, _) = branch.map_err(extraction_error)?;
                    let Some(name) = branch.name().ok().flatten().map(|s| s.to_string()) else {
                        continue;
                    };
                    if IGNORED_BRANCH_PREFIXES
                        .iter()
                        .any(|prefix| name.starts_with(prefix))
                    {
                        continue;
                    }
                    if let Some(tip) = branch.get().target() {
                        tips.push((name, tip));
                    }
                }

                if tips.is_empty() {
                    return Err(PipelineError::NoBranch(
                        self.repo_path.display().to_string(),
                    ));
                }

                tips.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(tips)
            }
        }
    }

    /// Diff of a commit against its first parent, or the empty tree for a root commit
    fn commit_diff(
        &self,
        commit: &git2::Commit,
        changes_only: bool,
    ) -> Result<String, PipelineError> {
        let tree = commit.tree().map_err(extraction_error)?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .and_then(|parent| parent.tree())
                    .map_err(extraction_error)?,
            )
        } else {
            None
        };

        let mut opts = diff_options();
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .map_err(extraction_error)?;

        Ok(render_diff(&diff, changes_only))
    }

    /// Diff of the index against HEAD (what `git diff --cached` shows)
    pub fn staged_diff(&self, changes_only: bool) -> Result<String, PipelineError> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree().map_err(extraction_error)?),
            Err(_) => None,
        };
        let index = self.repo.index().map_err(extraction_error)?;

        let mut opts = diff_options();
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), Some(&mut opts))
            .map_err(extraction_error)?;

        Ok(render_diff(&diff, changes_only))
    }

    /// Subjects of the most recent `n` commits on HEAD
    pub fn recent_subjects(&self, n: usize) -> Result<Vec<String>, PipelineError> {
        let mut revwalk = self.repo.revwalk().map_err(extraction_error)?;
        revwalk
            .set_sorting(Sort::TIME | Sort::TOPOLOGICAL)
            .map_err(extraction_error)?;
        revwalk
            .push_head()
            .map_err(|e| PipelineError::NoBranch(e.message().to_string()))?;

        let mut subjects = Vec::with_capacity(n);
        for oid in revwalk.take(n) {
            let commit = self
                .repo
                .find_commit(oid.map_err(extraction_error)?)
                .map_err(extraction_error)?;
            let message = decode_dropping_invalid(commit.message_bytes());
            subjects.push(message.trim().lines().next().unwrap_or("").to_string());
        }
        Ok(subjects)
    }
}

/// Extract records from the checkout at `path`
pub fn extract<P: AsRef<Path>>(
    path: P,
    options: &ExtractionOptions,
) -> Result<Vec<CommitRecord>, PipelineError> {
    CommitExtractor::open(path)?.extract(options)
}

/// Recent commit subjects of a local repository, empty if it cannot be read
pub fn recent_subjects<P: AsRef<Path>>(path: P, n: usize) -> Vec<String> {
    let path = path.as_ref();
    match CommitExtractor::open(path).and_then(|extractor| extractor.recent_subjects(n)) {
        Ok(subjects) => subjects,
        Err(e) => {
            tracing::warn!(
                "Could not read recent commits from {}: {}",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

fn diff_options() -> DiffOptions {
    let mut opts = DiffOptions::new();
    opts.context_lines(3)
        .interhunk_lines(0)
        .ignore_whitespace(false);
    opts
}

/// Concatenate per-file patches; files whose patch cannot be produced are left out
fn render_diff(diff: &Diff<'_>, changes_only: bool) -> String {
    let mut out = String::new();

    for idx in 0..diff.deltas().len() {
        let patch = match Patch::from_diff(diff, idx) {
            Ok(Some(patch)) => patch,
            // Binary delta
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!("Skipping file {} in diff: {}", idx, e.message());
                continue;
            }
        };

        let rendered = if changes_only {
            changed_lines(&patch)
        } else {
            full_patch(patch)
        };

        match rendered {
            Ok(text) => out.push_str(&text),
            Err(e) => tracing::debug!("Skipping file {} in diff: {}", idx, e.message()),
        }
    }

    out
}

fn full_patch(mut patch: Patch<'_>) -> Result<String, git2::Error> {
    let buf = patch.to_buf()?;
    Ok(decode_dropping_invalid(&buf))
}

fn changed_lines(patch: &Patch<'_>) -> Result<String, git2::Error> {
    let mut out = String::new();
    for hunk in 0..patch.num_hunks() {
        for line_idx in 0..patch.num_lines_in_hunk(hunk)? {
            let line = patch.line_in_hunk(hunk, line_idx)?;
            let origin = line.origin();
            if origin != '+' && origin != '-' {
                continue;
            }
            out.push(origin);
            let content = decode_dropping_invalid(line.content());
            out.push_str(content.trim_end_matches(['\n', '\r']));
            out.push('\n');
        }
    }
    Ok(out)
}

fn extraction_error(err: git2::Error) -> PipelineError {
    PipelineError::Extraction(err.message().to_string())
}
