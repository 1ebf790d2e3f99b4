//! # Progress Display Module
//!
//! Feedback visuale per la CLI con `indicatif`.
//!
//! ## Responsabilità:
//! - Barra percentuale alimentata dagli eventi `updateProgress` (0-100)
//! - Messaggio finale per completamento, cancellazione o errore
//! - Spinner per operazioni indeterminate (probe, thumbnail, pulizia cache)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [████████████████████>-------------------]  52% clip.mov
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Percent progress bar for one compression
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Hidden bar, for non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Move to `percent`; the bar never goes backwards
    pub fn set_percent(&self, percent: f64) {
        let position = if percent.is_finite() { percent.clamp(0.0, 100.0).round() as u64 } else { 0 };
        if position > self.bar.position() {
            self.bar.set_position(position);
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.set_position(100);
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop where the bar is, e.g. after a cancellation
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_monotonic_and_clamped() {
        let progress = ProgressManager::hidden();
        progress.set_percent(42.4);
        assert_eq!(progress.position(), 42);

        progress.set_percent(10.0);
        assert_eq!(progress.position(), 42);

        progress.set_percent(250.0);
        assert_eq!(progress.position(), 100);

        progress.set_percent(f64::NAN);
        assert_eq!(progress.position(), 100);
    }
}
