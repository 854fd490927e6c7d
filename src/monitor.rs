use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Header written once when the log is created
pub const MONITOR_HEADER: [&str; 4] = ["timestamp", "repo_url", "total_samples", "valid_samples"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row per successfully trained repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRow {
    pub timestamp: String,
    pub repo_url: String,
    /// Records extracted before filtering
    pub total_samples: usize,
    /// Records that passed the quality filter
    pub valid_samples: usize,
}

impl MonitorRow {
    pub fn new(at: DateTime<Local>, repo_url: &str, total: usize, valid: usize) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            repo_url: repo_url.to_string(),
            total_samples: total,
            valid_samples: valid,
        }
    }
}

/// Append-only CSV log of training progress
#[derive(Debug, Clone)]
pub struct MonitorLog {
    path: PathBuf,
}

impl MonitorLog {
    /// Open the log, creating it with a header if missing
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).context("Failed to create monitor log directory")?;
            }
            let mut writer =
                csv::Writer::from_path(path).context("Failed to create monitor log")?;
            writer.write_record(MONITOR_HEADER)?;
            writer.flush()?;
            tracing::info!("Created monitor log at {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &MonitorRow) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .context("Failed to open monitor log")?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<MonitorRow>> {
        let mut reader =
            csv::Reader::from_path(&self.path).context("Failed to open monitor log")?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row.context("Malformed monitor log row")?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_open_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/training_log.csv");

        MonitorLog::open(&path).unwrap();
        MonitorLog::open(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "timestamp,repo_url,total_samples,valid_samples\n");
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let log = MonitorLog::open(&dir.path().join("training_log.csv")).unwrap();
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        log.append(&MonitorRow::new(at, "https://example.com/a.git", 40, 12))
            .unwrap();
        log.append(&MonitorRow::new(at, "https://example.com/b.git", 30, 15))
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("2024-05-01 12:30:00,https://example.com/a.git,40,12\n"));

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].repo_url, "https://example.com/b.git");
        assert_eq!(rows[1].valid_samples, 15);
    }
}
