//! Weighted deployment progress and its terminal rendering.
//!
//! [`WeightedProgress`] turns per-template cost weights into the integer
//! percentage reported to a [`ProgressSink`]. The reported value:
//!
//! - starts at 1 when a run begins
//! - never decreases
//! - stays at or below 99 while any template is still outstanding
//! - reaches 100 exactly once, when every template is terminal
//!
//! [`ProgressBar`] is the sink the CLI installs. It wraps an `indicatif` bar
//! and is hidden when `SOLDEPLOY_NO_PROGRESS` is set.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};

use crate::constants::NO_PROGRESS_ENV;

/// Receives progress percentages, 0 to 100.
pub trait ProgressSink: Send {
    /// Report the current percentage.
    fn report(&mut self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: FnMut(u8) + Send,
{
    fn report(&mut self, percent: u8) {
        self(percent);
    }
}

/// A sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// Accumulates completed cost weight against a fixed total.
#[derive(Debug, Clone)]
pub struct WeightedProgress {
    total: u64,
    done: u64,
    last: u8,
}

impl WeightedProgress {
    /// Track a run whose weights sum to `total`.
    #[must_use]
    pub const fn new(total: u64) -> Self {
        Self { total, done: 0, last: 0 }
    }

    /// Start the run; always 1.
    pub fn start(&mut self) -> u8 {
        self.last = self.last.max(1);
        self.last
    }

    /// Record `weight` more as terminal; returns the new percentage if it moved.
    pub fn advance(&mut self, weight: u64) -> Option<u8> {
        self.done = self.done.saturating_add(weight);
        let percent = if self.total == 0 {
            99
        } else {
            let raw = self.done.saturating_mul(100) / self.total;
            u8::try_from(raw.min(99)).unwrap_or(99)
        };
        let percent = percent.max(1);
        (percent > self.last).then(|| {
            self.last = percent;
            percent
        })
    }

    /// Every template is terminal; always 100.
    pub fn finish(&mut self) -> u8 {
        self.last = 100;
        self.last
    }

    /// Last reported percentage.
    #[must_use]
    pub const fn current(&self) -> u8 {
        self.last
    }
}

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

fn percent_style() -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .ok()
        .map(|style| style.progress_chars("━╸━"))
}

/// Terminal progress bar measured in percent.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A percentage bar labelled `prefix`; hidden when progress is disabled.
    pub fn percent(prefix: impl Into<String>) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(100);
            if let Some(style) = percent_style() {
                bar.set_style(style);
            }
            bar
        };
        bar.set_prefix(prefix.into());
        Self { inner: bar }
    }

    /// A bar that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Set the trailing message.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Finish and leave `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finish and clear the bar.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Current position in percent.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }
}

impl ProgressSink for ProgressBar {
    fn report(&mut self, percent: u8) {
        self.inner.set_position(u64::from(percent.min(100)));
    }
}
