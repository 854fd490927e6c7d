//! Host resource signals used by the training loop
//!
//! Memory decides the per-repository batch size; CPU utilisation drives the
//! cooperative throttle. Both are read behind [`HostProbe`] so the loop can be
//! driven by scripted values in tests.

use crate::config::ScheduleConfig;
use anyhow::{Context, Result, bail};
use std::fs;
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

/// Source of host memory and CPU readings
pub trait HostProbe {
    /// Total physical memory in bytes
    fn total_memory_bytes(&self) -> Result<u64>;

    /// CPU utilisation in percent over a short sampling window
    fn cpu_utilization(&self) -> Result<f32>;

    /// Whether CPU utilisation is above `ceiling_percent`
    ///
    /// An unreadable probe reports false so the loop is never blocked by it.
    fn utilization_exceeds(&self, ceiling_percent: f32) -> bool {
        match self.cpu_utilization() {
            Ok(percent) => percent > ceiling_percent,
            Err(e) => {
                tracing::debug!("CPU utilisation unavailable: {:#}", e);
                false
            }
        }
    }
}

/// Reads `/proc/meminfo` and `/proc/stat`
#[derive(Debug, Clone)]
pub struct ProcHostProbe {
    sample_window: Duration,
}

impl Default for ProcHostProbe {
    fn default() -> Self {
        Self {
            sample_window: Duration::from_secs(1),
        }
    }
}

impl ProcHostProbe {
    pub fn new(sample_window: Duration) -> Self {
        Self { sample_window }
    }

    pub fn sample_window(&self) -> Duration {
        self.sample_window
    }
}

impl From<&ScheduleConfig> for ProcHostProbe {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self::new(Duration::from_secs(schedule.cpu_sample_window_secs))
    }
}

impl HostProbe for ProcHostProbe {
    fn total_memory_bytes(&self) -> Result<u64> {
        let meminfo = fs::read_to_string("/proc/meminfo").context("Failed to read /proc/meminfo")?;
        parse_mem_total(&meminfo)
    }

    fn cpu_utilization(&self) -> Result<f32> {
        let first = read_cpu_times()?;
        std::thread::sleep(self.sample_window);
        let second = read_cpu_times()?;
        Ok(utilization_between(first, second))
    }
}

/// Aggregate (total, idle) jiffies from the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

fn read_cpu_times() -> Result<CpuTimes> {
    let stat = fs::read_to_string("/proc/stat").context("Failed to read /proc/stat")?;
    parse_cpu_times(&stat)
}

/// Parse the `MemTotal:` line of `/proc/meminfo` into bytes
pub fn parse_mem_total(meminfo: &str) -> Result<u64> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .context("MemTotal not found")?;
    let kib: u64 = line
        .split_whitespace()
        .nth(1)
        .context("MemTotal has no value")?
        .parse()
        .context("MemTotal is not a number")?;
    Ok(kib * 1024)
}

/// Parse the aggregate `cpu` line of `/proc/stat`
pub fn parse_cpu_times(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|line| line.starts_with("cpu "))
        .context("aggregate cpu line not found")?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|s| s.parse().ok())
        .collect();
    if fields.len() < 4 {
        bail!("cpu line has {} fields, expected at least 4", fields.len());
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        total: fields.iter().sum(),
        idle,
    })
}

/// Busy percentage between two samples
pub fn utilization_between(before: CpuTimes, after: CpuTimes) -> f32 {
    let total = after.total.saturating_sub(before.total);
    if total == 0 {
        return 0.0;
    }
    let idle = after.idle.saturating_sub(before.idle).min(total);
    100.0 * (1.0 - idle as f32 / total as f32)
}

/// Per-device batch size for a host with `total_memory` bytes
pub fn batch_size_for_memory(total_memory: u64) -> usize {
    if total_memory > 24 * GIB {
        16
    } else if total_memory > 16 * GIB {
        8
    } else {
        4
    }
}

/// Resource-dependent settings, recomputed for every repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePlan {
    pub total_memory: u64,
    pub batch_size: usize,
    /// Commit cap for extraction on this host
    pub max_commits: usize,
}

impl ResourcePlan {
    pub fn for_memory(total_memory: u64, default_max_commits: usize) -> Self {
        let max_commits = if total_memory > 24 * GIB {
            default_max_commits
        } else if total_memory > 16 * GIB {
            default_max_commits.min(5000)
        } else {
            default_max_commits.min(2000)
        };
        Self {
            total_memory,
            batch_size: batch_size_for_memory(total_memory),
            max_commits,
        }
    }

    /// Plan from a live probe; an unreadable probe yields the smallest tier
    pub fn detect<P: HostProbe + ?Sized>(probe: &P, default_max_commits: usize) -> Self {
        let total_memory = match probe.total_memory_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Could not read host memory, assuming a small host: {:#}", e);
                0
            }
        };
        let plan = Self::for_memory(total_memory, default_max_commits);
        tracing::info!(
            "Detected RAM: {:.2} GB, batch size: {}, max commits: {}",
            total_memory as f64 / GIB as f64,
            plan.batch_size,
            plan.max_commits
        );
        plan
    }
}
