//! Progress reporting for downloads.
//!
//! The core only needs a counter per object that it can advance as bytes are
//! written; rendering is up to the [`ProgressDisplay`] implementation.
//! [`BarDisplay`] draws one indicatif bar per object, [`HiddenDisplay`] draws
//! nothing.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Width of the name column on each bar.
pub const LABEL_WIDTH: usize = 50;

const BAR_TEMPLATE: &str =
    "{prefix} {total_bytes:>10} [{bar:20.cyan/blue}] {percent:>3}% {bytes_per_sec:>12}";

/// Renders progress for a batch. Shared by all running pipelines.
pub trait ProgressDisplay: Send + Sync {
    /// Register a new counter. `total_hint` only scales the display.
    fn register_counter(&self, label: &str, total_hint: u64) -> Box<dyn ProgressCounter>;

    /// Print a line (e.g. a failure) without corrupting the bars.
    fn report(&self, line: &str);
}

/// Per-object counter handed out by a [`ProgressDisplay`].
pub trait ProgressCounter: Send + Sync {
    fn advance(&self, bytes: u64);

    fn finish(&self) {}
}

/// Progress sink owned by one pipeline: forwards to its display counter and
/// keeps a monotonically increasing count of bytes transferred.
pub struct ProgressSink {
    counter: Box<dyn ProgressCounter>,
    transferred: AtomicU64,
}

impl ProgressSink {
    pub fn register(display: &dyn ProgressDisplay, label: &str, total_hint: u64) -> Self {
        Self {
            counter: display.register_counter(label, total_hint),
            transferred: AtomicU64::new(0),
        }
    }

    pub fn record(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
        self.counter.advance(bytes);
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.counter.finish();
    }
}

/// Multi-bar terminal display backed by indicatif.
pub struct BarDisplay {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl BarDisplay {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::new(),
            style,
        }
    }
}

impl Default for BarDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay for BarDisplay {
    fn register_counter(&self, label: &str, total_hint: u64) -> Box<dyn ProgressCounter> {
        let bar = self.multi.add(ProgressBar::new(total_hint));
        bar.set_style(self.style.clone());
        bar.set_prefix(fit_label(label, LABEL_WIDTH));
        Box::new(BarCounter { bar })
    }

    fn report(&self, line: &str) {
        if self.multi.println(line).is_err() {
            eprintln!("{}", line);
        }
    }
}

struct BarCounter {
    bar: ProgressBar,
}

impl ProgressCounter for BarCounter {
    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// Display that renders nothing; reports still go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct HiddenDisplay;

impl ProgressDisplay for HiddenDisplay {
    fn register_counter(&self, _label: &str, _total_hint: u64) -> Box<dyn ProgressCounter> {
        Box::new(NoopCounter)
    }

    fn report(&self, line: &str) {
        eprintln!("{}", line);
    }
}

struct NoopCounter;

impl ProgressCounter for NoopCounter {
    fn advance(&self, _bytes: u64) {}
}

/// Pad or truncate `label` to exactly `width` characters, marking truncation
/// with a trailing `~`.
pub fn fit_label(label: &str, width: usize) -> String {
    let count = label.chars().count();
    if count <= width {
        return format!("{:<width$}", label, width = width);
    }
    let mut out: String = label.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}
