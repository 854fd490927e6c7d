//! Sources of candidate repository URLs
//!
//! Paging and rate limiting are the collaborator's concern. The trainer only
//! asks for a bounded batch once per cycle.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Yields a batch of candidate clone URLs
pub trait SourceDiscovery {
    fn discover(&self) -> Result<Vec<String>>;
}

/// Newline-delimited URL file, re-read on every call
///
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    path: PathBuf,
}

impl FileDiscovery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceDiscovery for FileDiscovery {
    fn discover(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read source list {}", self.path.display()))?;
        Ok(parse_source_list(&content))
    }
}

/// A fixed list of URLs
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    urls: Vec<String>,
}

impl StaticDiscovery {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

impl SourceDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<String>> {
        Ok(self.urls.clone())
    }
}

pub fn parse_source_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_source_list_skips_comments() {
        let urls = parse_source_list(
            "# seed list\nhttps://github.com/a/b.git\n\n   \n  https://github.com/c/d.git  \n#https://github.com/e/f.git\n",
        );
        assert_eq!(
            urls,
            vec!["https://github.com/a/b.git", "https://github.com/c/d.git"]
        );
    }

    #[test]
    fn test_file_discovery_rereads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sources.txt");
        std::fs::write(&path, "https://github.com/a/b.git\n").unwrap();

        let discovery = FileDiscovery::new(&path);
        assert_eq!(discovery.discover().unwrap().len(), 1);

        std::fs::write(&path, "https://github.com/a/b.git\nhttps://github.com/c/d.git\n").unwrap();
        assert_eq!(discovery.discover().unwrap().len(), 2);
    }

    #[test]
    fn test_file_discovery_missing_file() {
        let discovery = FileDiscovery::new("/nonexistent/sources.txt");
        let err = discovery.discover().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read source list"));
    }

    #[test]
    fn test_static_discovery() {
        let discovery = StaticDiscovery::new(["https://example.com/x.git"]);
        assert_eq!(discovery.discover().unwrap(), vec!["https://example.com/x.git"]);
    }
}
