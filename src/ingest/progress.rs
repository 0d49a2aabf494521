use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Single owner of the terminal progress display.
///
/// Every job renders through the same `MultiProgress`, so concurrent bars
/// never interleave. Rendering is observational only: nothing in here can
/// fail an import.
pub struct Progress {
    multi: MultiProgress,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// A display that renders nothing. Used by tests and quiet runs.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Register a named job expecting `total` records.
    pub fn job(&self, title: &str, total: u64) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(
                "[{bar:40}] {percentage:>3}% | {msg} | {pos}/{len} Records",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.set_message(title.to_string());
        bar
    }

    /// Print a line above the bars without corrupting them.
    pub fn println(&self, line: &str) {
        let _ = self.multi.println(line);
    }

    /// Tear the display down, releasing the terminal.
    pub fn clear(&self) {
        let _ = self.multi.clear();
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
