//! Progress display that records what the core told it.

use b2dl_core::progress::{ProgressCounter, ProgressDisplay};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingDisplay {
    labels: Mutex<Vec<String>>,
    reports: Mutex<Vec<String>>,
    advanced: Arc<AtomicU64>,
}

impl RecordingDisplay {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }

    /// Bytes advanced across all counters.
    pub fn advanced(&self) -> u64 {
        self.advanced.load(Ordering::SeqCst)
    }
}

struct Counter(Arc<AtomicU64>);

impl ProgressCounter for Counter {
    fn advance(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::SeqCst);
    }
}

impl ProgressDisplay for RecordingDisplay {
    fn register_counter(&self, label: &str, _total_hint: u64) -> Box<dyn ProgressCounter> {
        self.labels.lock().unwrap().push(label.to_string());
        Box::new(Counter(Arc::clone(&self.advanced)))
    }

    fn report(&self, line: &str) {
        self.reports.lock().unwrap().push(line.to_string());
    }
}

/// Display whose counters cannot be registered: every call panics.
pub struct PanickingDisplay;

impl ProgressDisplay for PanickingDisplay {
    fn register_counter(&self, label: &str, _total_hint: u64) -> Box<dyn ProgressCounter> {
        panic!("no counter for {}", label);
    }

    fn report(&self, _line: &str) {}
}
