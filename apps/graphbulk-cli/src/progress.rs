//! Terminal progress bar fed by the engine's progress hook.

use graphbulk_engine::{ProgressHook, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Progress bar for one fetch run.
#[derive(Clone)]
pub struct FetchProgress {
    bar: ProgressBar,
}

impl FetchProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}]{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A bar that renders nothing, for non-interactive use.
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Hook that mirrors every snapshot onto the bar.
    pub fn hook(&self) -> ProgressHook {
        let bar = self.bar.clone();
        Arc::new(move |snapshot: &ProgressSnapshot| {
            bar.set_length(snapshot.total as u64);
            bar.set_position(snapshot.done as u64);
            bar.set_message(snapshot.to_string());
        })
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}
