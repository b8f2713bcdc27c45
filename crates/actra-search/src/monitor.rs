//! Wall-clock and memory monitoring.

use crate::error::{SearchError, SearchResult};
use std::time::{Duration, Instant};

/// Tracks elapsed runtime against an optional deadline. Not serialized:
/// a resumed run gets a fresh budget.
#[derive(Debug)]
pub struct TimeMonitor {
    start: Instant,
    deadline: Option<Instant>,
    last_report: Instant,
}

impl TimeMonitor {
    pub fn new(timeout_secs: u64) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: (timeout_secs > 0).then(|| start + Duration::from_secs(timeout_secs)),
            last_report: start,
        }
    }

    pub fn runtime_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Error out when past the deadline.
    pub fn check_timeout(&self) -> SearchResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SearchError::Timeout {
                elapsed_secs: self.runtime_secs(),
            }),
            _ => Ok(()),
        }
    }

    /// True at most once every `interval_secs`; used to pace progress lines.
    pub fn should_report(&mut self, interval_secs: u64) -> bool {
        if self.last_report.elapsed() >= Duration::from_secs(interval_secs) {
            self.last_report = Instant::now();
            true
        } else {
            false
        }
    }
}

/// Current process memory in MB, when the platform reports it.
pub fn current_memory_mb() -> Option<f64> {
    memory_stats::memory_stats().map(|stats| stats.physical_mem as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_deadline_never_times_out() {
        let m = TimeMonitor::new(0);
        assert!(m.check_timeout().is_ok());
    }

    #[test]
    fn zero_elapsed_deadline_fires() {
        let m = TimeMonitor {
            start: Instant::now(),
            deadline: Some(Instant::now()),
            last_report: Instant::now(),
        };
        assert!(matches!(
            m.check_timeout(),
            Err(SearchError::Timeout { .. })
        ));
    }
}
