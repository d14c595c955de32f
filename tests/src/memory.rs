use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use vigil_foundation::memory::{MemoryError, MemorySource, RawMemory};

const TOTAL_BYTES: u64 = 16 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum Step {
    Percent(f64),
    Unavailable,
}

/// A [`MemorySource`] that replays scripted usage percentages.
///
/// Steps are consumed in order; the last one repeats once the script runs
/// out. Clones share the script.
#[derive(Clone)]
pub struct ScriptedMemorySource {
    steps: Arc<Mutex<VecDeque<Step>>>,
    last: Arc<Mutex<Step>>,
}

impl ScriptedMemorySource {
    pub fn new(percents: impl IntoIterator<Item = f64>) -> Self {
        let steps: VecDeque<Step> = percents.into_iter().map(Step::Percent).collect();
        Self {
            steps: Arc::new(Mutex::new(steps)),
            last: Arc::new(Mutex::new(Step::Percent(0.0))),
        }
    }

    /// Constant usage
    pub fn fixed(percent: f64) -> Self {
        Self::new([percent])
    }

    pub fn push(&self, percent: f64) {
        self.steps.lock().push_back(Step::Percent(percent));
    }

    /// Make the next read fail, as when the OS statistics are unreadable.
    pub fn push_unavailable(&self) {
        self.steps.lock().push_back(Step::Unavailable);
    }

    /// Replace the script with a constant usage from now on.
    pub fn set(&self, percent: f64) {
        self.steps.lock().clear();
        *self.last.lock() = Step::Percent(percent);
    }
}

impl MemorySource for ScriptedMemorySource {
    fn read(&self) -> Result<RawMemory, MemoryError> {
        let step = match self.steps.lock().pop_front() {
            Some(step) => {
                *self.last.lock() = step;
                step
            }
            None => *self.last.lock(),
        };

        match step {
            Step::Unavailable => Err(MemoryError::Unavailable("scripted outage".to_string())),
            Step::Percent(percent) => {
                let used = (TOTAL_BYTES as f64 * percent.clamp(0.0, 100.0) / 100.0) as u64;
                let available = TOTAL_BYTES - used;
                Ok(RawMemory {
                    total: TOTAL_BYTES,
                    used,
                    available,
                    free: available,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent(raw: RawMemory) -> f64 {
        (raw.total - raw.available) as f64 / raw.total as f64 * 100.0
    }

    #[test]
    fn test_replays_then_repeats_last() {
        let source = ScriptedMemorySource::new([40.0, 95.0]);
        assert!((percent(source.read().unwrap()) - 40.0).abs() < 1e-6);
        assert!((percent(source.read().unwrap()) - 95.0).abs() < 1e-6);
        assert!((percent(source.read().unwrap()) - 95.0).abs() < 1e-6);
    }

    #[test]
    fn test_unavailable_step() {
        let source = ScriptedMemorySource::fixed(50.0);
        source.read().unwrap();
        source.push_unavailable();
        assert!(source.read().is_err());
        source.set(20.0);
        assert!((percent(source.read().unwrap()) - 20.0).abs() < 1e-6);
    }
}
