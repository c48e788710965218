use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use popstats::SourceKind;
use popstats::sync::SyncProgress;

/// Per-owner spinner state.
struct ChainBar {
    bar: ProgressBar,
    written: usize,
}

/// Interactive progress reporter using indicatif.
///
/// One spinner per chain, keyed by source and normalized owner name. The
/// spinner's counter tracks merged writes across pages.
pub struct InteractiveReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<(SourceKind, String), ChainBar>>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };

        match event {
            SyncProgress::ChainStarted { source, owner } => {
                let key = (source, owner.to_lowercase());
                if bars.contains_key(&key) {
                    return;
                }
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::counter_style());
                bar.set_prefix(format!("{:16}", format!("{source}:{owner}")));
                bar.enable_steady_tick(Duration::from_millis(100));
                bar.set_message("queued");
                bars.insert(key, ChainBar { bar, written: 0 });
            }

            SyncProgress::FetchingPage {
                source,
                owner,
                page,
            } => {
                if let Some(chain) = bars.get(&(source, owner.to_lowercase())) {
                    chain.bar.set_message(format!("fetching page {page}..."));
                }
            }

            SyncProgress::Merged {
                source,
                owner,
                page,
                inserted,
                patched,
                ..
            } => {
                if let Some(chain) = bars.get_mut(&(source, owner.to_lowercase())) {
                    chain.written += inserted + patched;
                    chain.bar.set_position(chain.written as u64);
                    chain.bar.set_message(format!("written (page {page})"));
                }
            }

            SyncProgress::StepRedelivered {
                source,
                owner,
                page,
                delivery,
                ..
            } => {
                if let Some(chain) = bars.get(&(source, owner.to_lowercase())) {
                    chain
                        .bar
                        .set_message(format!("retrying page {page} (delivery {delivery})"));
                }
            }

            SyncProgress::Finalized {
                source,
                owner,
                details,
                star_count,
                download_count,
            } => {
                if let Some(chain) = bars.get(&(source, owner.to_lowercase())) {
                    let summary = match source {
                        SourceKind::GitHub => format!("✓ {details} repos, {star_count} stars"),
                        SourceKind::Npm => {
                            format!("✓ {details} packages, {download_count} downloads")
                        }
                    };
                    chain.bar.finish_with_message(summary);
                }
            }

            SyncProgress::StepFailed {
                source,
                owner,
                error,
                fatal: true,
                ..
            } => {
                if let Some(chain) = bars.get(&(source, owner.to_lowercase())) {
                    chain.bar.abandon_with_message(format!("✗ {error}"));
                }
            }

            SyncProgress::Warning { message } => {
                self.multi.println(format!("warning: {message}")).ok();
            }

            _ => {}
        }
    }

    /// Finish all spinners.
    pub fn finish(&self) {
        if let Ok(bars) = self.bars.lock() {
            for chain in bars.values() {
                if !chain.bar.is_finished() {
                    chain.bar.finish();
                }
            }
        }
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>5} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
