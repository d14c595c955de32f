//! Host memory sampling with a short rolling history.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tokio::time::Instant;

/// Samples kept for trend computation
pub const HISTORY_CAPACITY: usize = 10;

/// Trend magnitude (percent per second) below which memory is "stable"
const TREND_EPSILON: f64 = 0.1;

/// Default percent at which a reading is flagged critical
pub const DEFAULT_CRITICAL_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryError {
    #[error("memory statistics unavailable: {0}")]
    Unavailable(String),
}

/// Raw figures reported by a [`MemorySource`], in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemory {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub free: u64,
}

/// Where memory figures come from. Implemented by the OS-backed source and
/// by scripted sources in tests.
pub trait MemorySource: Send + Sync {
    fn read(&self) -> Result<RawMemory, MemoryError>;
}

/// Memory source backed by `sysinfo`.
pub struct SystemMemorySource {
    system: Mutex<System>,
}

impl SystemMemorySource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
            )),
        }
    }
}

impl Default for SystemMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SystemMemorySource {
    fn read(&self) -> Result<RawMemory, MemoryError> {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(MemoryError::Unavailable(
                "operating system reported zero total memory".to_string(),
            ));
        }
        Ok(RawMemory {
            total,
            used: sys.used_memory(),
            available: sys.available_memory(),
            free: sys.free_memory(),
        })
    }
}

/// One memory observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub free_bytes: u64,
    /// 0-100
    pub percent_used: f64,
    pub is_critical: bool,
}

impl MemoryReading {
    /// Derive a reading from raw figures. Usage is measured against available
    /// memory, so reclaimable caches do not count as pressure.
    pub fn from_raw(raw: RawMemory, critical_threshold: f64) -> Self {
        let percent_used = if raw.total == 0 {
            0.0
        } else {
            let in_use = raw.total.saturating_sub(raw.available);
            (in_use as f64 / raw.total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            total_bytes: raw.total,
            used_bytes: raw.used,
            available_bytes: raw.available,
            free_bytes: raw.free,
            percent_used,
            is_critical: percent_used >= critical_threshold,
        }
    }

    pub fn zero() -> Self {
        Self {
            total_bytes: 0,
            used_bytes: 0,
            available_bytes: 0,
            free_bytes: 0,
            percent_used: 0.0,
            is_critical: false,
        }
    }

    /// Reading with only the percentage filled in.
    pub fn with_percent(percent_used: f64, critical_threshold: f64) -> Self {
        let percent_used = percent_used.clamp(0.0, 100.0);
        Self {
            percent_used,
            is_critical: percent_used >= critical_threshold,
            ..Self::zero()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl MemoryTrend {
    pub fn from_rate(rate: f64) -> Self {
        if rate > TREND_EPSILON {
            MemoryTrend::Increasing
        } else if rate < -TREND_EPSILON {
            MemoryTrend::Decreasing
        } else {
            MemoryTrend::Stable
        }
    }
}

impl std::fmt::Display for MemoryTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryTrend::Increasing => write!(f, "increasing"),
            MemoryTrend::Decreasing => write!(f, "decreasing"),
            MemoryTrend::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub at: Instant,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedMemoryReport {
    pub current: MemoryReading,
    /// Percent per second, newest minus oldest sample
    pub trend: f64,
    pub trend_label: MemoryTrend,
    /// Oldest first
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Default)]
struct ProbeState {
    last_known: Option<MemoryReading>,
    history: VecDeque<HistoryEntry>,
}

/// Shared memory probe. Cheap to clone.
#[derive(Clone)]
pub struct MemoryProbe {
    source: Arc<dyn MemorySource>,
    critical_threshold: f64,
    state: Arc<Mutex<ProbeState>>,
}

impl MemoryProbe {
    pub fn new(source: Arc<dyn MemorySource>, critical_threshold: f64) -> Self {
        Self {
            source,
            critical_threshold,
            state: Arc::new(Mutex::new(ProbeState::default())),
        }
    }

    /// Probe over the host's memory via `sysinfo`.
    pub fn system(critical_threshold: f64) -> Self {
        Self::new(Arc::new(SystemMemorySource::new()), critical_threshold)
    }

    pub fn critical_threshold(&self) -> f64 {
        self.critical_threshold
    }

    /// Current reading. Never fails: if the source errors, the last known
    /// reading (or an all-zero one) is returned instead.
    pub fn sample(&self) -> MemoryReading {
        match self.source.read() {
            Ok(raw) => {
                let reading = MemoryReading::from_raw(raw, self.critical_threshold);
                self.state.lock().last_known = Some(reading);
                reading
            }
            Err(e) => {
                let fallback = self.state.lock().last_known;
                tracing::warn!(
                    error = %e,
                    has_last_known = fallback.is_some(),
                    "memory sample failed, using fallback reading"
                );
                fallback.unwrap_or_else(MemoryReading::zero)
            }
        }
    }

    /// Sample, record into the history and compute the usage trend.
    pub fn detailed_sample(&self) -> DetailedMemoryReport {
        let current = self.sample();
        let now = Instant::now();

        let mut state = self.state.lock();
        state.history.push_back(HistoryEntry {
            at: now,
            percent_used: current.percent_used,
        });
        while state.history.len() > HISTORY_CAPACITY {
            state.history.pop_front();
        }

        let trend = match (state.history.front(), state.history.back()) {
            (Some(oldest), Some(newest)) if state.history.len() >= 2 => {
                let elapsed = newest.at.saturating_duration_since(oldest.at).as_secs_f64();
                if elapsed > 0.0 {
                    (newest.percent_used - oldest.percent_used) / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        DetailedMemoryReport {
            current,
            trend,
            trend_label: MemoryTrend::from_rate(trend),
            history: state.history.iter().copied().collect(),
        }
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.iter().copied().collect()
    }
}

impl std::fmt::Debug for MemoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProbe")
            .field("critical_threshold", &self.critical_threshold)
            .field("history_len", &self.state.lock().history.len())
            .finish()
    }
}
