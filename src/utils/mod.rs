//! Shared utilities.

pub mod progress;

pub use progress::{NoProgress, ProgressBar, ProgressSink, WeightedProgress};
