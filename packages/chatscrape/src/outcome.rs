//! Append-only log of strategy attempts.
//!
//! Shared between the orchestrator (writer) and the adaptive selector
//! (reader). Appends from concurrent requests must never lose entries;
//! ordering between unrelated requests is immaterial. A ring cap bounds
//! memory over a long process lifetime.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

use crate::platform::Platform;
use crate::strategies::StrategyKind;

/// Default ring capacity.
const DEFAULT_CAP: usize = 10_000;

/// The result of one strategy attempt.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub platform: Platform,
    pub strategy: StrategyKind,
    pub succeeded: bool,
    pub latency: Duration,
    pub error_class: Option<&'static str>,
}

/// Shared outcome log with ring-buffer rotation.
pub struct OutcomeLog {
    entries: RwLock<VecDeque<StrategyOutcome>>,
    cap: usize,
}

impl Default for OutcomeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(cap.min(1024))),
            cap,
        }
    }

    /// Append one outcome, rotating out the oldest entry at capacity.
    pub fn record(&self, outcome: StrategyOutcome) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() == self.cap {
            entries.pop_front();
        }
        entries.push_back(outcome);
    }

    /// Snapshot the current entries for ranking computation.
    pub fn snapshot(&self) -> Vec<StrategyOutcome> {
        self.entries.read().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}
