//! Terminal progress reporting using indicatif
//!
//! Provides a simple API for displaying application state:
//! - Current phase (Checking, Downloading, Importing, Exporting)
//! - Progress (current/total with optional details)
//! - Activity log printed above the bars

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Application phases shown on the status line
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Checking,
    Downloading,
    Importing,
    Exporting,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Checking => write!(f, "Checking cache"),
            Phase::Downloading => write!(f, "Downloading dump"),
            Phase::Importing => write!(f, "Importing documents"),
            Phase::Exporting => write!(f, "Exporting systems"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Trait for UI implementations - allows both terminal bars and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);

    /// A bar that worker threads can advance on their own
    fn bar(&mut self, total: u64, label: impl Into<String>) -> ProgressBar;
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Status line plus one progress bar, drawn on stderr
pub struct ProgressUi {
    multi: MultiProgress,
    status: ProgressBar,
    progress: Option<ProgressBar>,
}

impl ProgressUi {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status.enable_steady_tick(Duration::from_millis(120));
        Self {
            multi,
            status,
            progress: None,
        }
    }

    /// Stop the spinner and leave the summary on screen
    pub fn finish(mut self, summary: &str) {
        self.clear_progress();
        self.status.set_prefix(Phase::Complete.to_string());
        self.status.finish_with_message(summary.to_string());
    }
}

impl Default for ProgressUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for ProgressUi {
    fn set_phase(&mut self, phase: Phase) {
        self.status.set_prefix(phase.to_string());
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.status.set_message(info.into());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        let multi = &self.multi;
        let bar = self.progress.get_or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(total));
            bar.set_style(bar_style());
            bar
        });
        bar.set_length(total);
        bar.set_position(current);
        bar.set_message(label.into());
    }

    fn clear_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        self.multi.println(message.into()).ok();
    }

    /// A `total` of 0 means the length is unknown and draws a counter
    fn bar(&mut self, total: u64, label: impl Into<String>) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(total));
        if total == 0 {
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} {msg:30} {pos} ({per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
        } else {
            bar.set_style(bar_style());
        }
        bar.set_message(label.into());
        bar
    }
}

/// Silent UI implementation for testing and non-interactive use
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}

    fn bar(&mut self, _total: u64, _label: impl Into<String>) -> ProgressBar {
        ProgressBar::hidden()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Importing.to_string(), "Importing documents");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }

    #[test]
    fn test_silent_bar_still_counts() {
        let mut ui = SilentUi::new();
        let bar = ui.bar(10, "systems");
        bar.inc(3);
        assert_eq!(bar.position(), 3);
    }
}
