// src/progress.rs
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Receives `(completed, total)` after each scanned block.
///
/// Purely observational; a sink can never influence the scan.
pub trait ProgressSink: Send + Sync {
    fn update(&self, completed: u64, total: u64);

    fn finish(&self) {}
}

/// Discards updates
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _completed: u64, _total: u64) {}
}

/// Logs every `every` blocks and at the end of the range
pub struct LogProgress {
    every: u64,
}

impl LogProgress {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressSink for LogProgress {
    fn update(&self, completed: u64, total: u64) {
        if completed % self.every == 0 || completed == total {
            info!(completed, total, "scan progress");
        }
    }
}

/// Terminal progress bar on stderr
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let template = "[scanning blocks] {wide_bar} {pos}/{len} ({eta})";
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn update(&self, completed: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(completed);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progress_never_divides_by_zero() {
        let sink = LogProgress::new(0);
        sink.update(0, 0);
        sink.update(3, 10);
    }

    #[test]
    fn bar_tracks_latest_update() {
        let sink = BarProgress::new(10);
        sink.update(4, 10);
        assert_eq!(sink.bar.position(), 4);
        sink.finish();
    }
}
