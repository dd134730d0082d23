//! Terminal progress display
//!
//! Consumes the executor's progress channel and renders one bar per
//! endpoint. Rendering cadence is independent of request completion.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::executor::ProgressEvent;

const TEMPLATE: &str =
    "{prefix:>16.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Per-endpoint progress bars
pub struct ProgressDisplay {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    style: ProgressStyle,
}

impl ProgressDisplay {
    /// Display drawing to stderr
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Display that tracks progress without drawing
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            style,
        }
    }

    /// Pre-create bars so every endpoint shows from the start
    pub fn with_endpoints<'a>(
        mut self,
        names: impl IntoIterator<Item = &'a str>,
        total: usize,
    ) -> Self {
        for name in names {
            self.bar(name, total);
        }
        self
    }

    fn bar(&mut self, name: &str, total: usize) -> &ProgressBar {
        let multi = &self.multi;
        let style = &self.style;
        self.bars.entry(name.to_string()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(total as u64));
            bar.set_style(style.clone());
            bar.set_prefix(name.to_string());
            bar
        })
    }

    /// Apply one event
    pub fn update(&mut self, event: &ProgressEvent) {
        let bar = self.bar(&event.endpoint, event.total);
        bar.set_position(event.completed as u64);
        if event.is_final() {
            bar.finish_with_message("done");
        }
    }

    #[cfg(test)]
    fn position(&self, name: &str) -> Option<u64> {
        self.bars.get(name).map(ProgressBar::position)
    }

    /// Render events until every sender is dropped.
    ///
    /// Bars left short of their total (cancelled runs) are abandoned in place.
    pub async fn run(mut self, mut events: UnboundedReceiver<ProgressEvent>) -> Self {
        while let Some(event) = events.recv().await {
            self.update(&event);
        }
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon_with_message("stopped");
            }
        }
        self
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}
