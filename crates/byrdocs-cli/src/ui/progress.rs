//! Progress indicators for network-bound commands.
//!
//! Spinners are drawn only on an interactive terminal. Otherwise each
//! publish step prints a single line when it ends.

use std::time::{Duration, Instant};

use byrdocs_core::{PublishObserver, PublishStep, StepEvent};
use indicatif::{ProgressBar, ProgressStyle};

use super::style::{MessageType, Style};

/// Spinner tick characters (Braille-based).
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Animated spinners.
    Interactive,
    /// Plain lines, for pipes and CI logs.
    Quiet,
    /// Nothing at all, for `--json`.
    Silent,
}

impl ProgressMode {
    pub fn detect(json: bool) -> Self {
        if json {
            Self::Silent
        } else if atty::is(atty::Stream::Stdout) {
            Self::Interactive
        } else {
            Self::Quiet
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

fn spinner_bar(template: &str, message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .tick_chars(SPINNER_CHARS)
            .template(template)
            .expect("valid template"),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// A single spinner.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub fn spinner(message: &str, mode: ProgressMode) -> Self {
        let bar = if mode.is_interactive() {
            spinner_bar("{spinner:.cyan} {msg} ({elapsed})", message.to_string())
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub fn finish_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Numbered publish progress.
///
/// ```text
/// [1/5] Check binding done (12ms)
/// [2/5] Sync upstream done (0.8s)
/// [3/5] Create branch failed (0.3s)
/// ```
pub struct StepProgress {
    mode: ProgressMode,
    style: Style,
    current: Option<(ProgressBar, Instant)>,
    finished: usize,
}

impl StepProgress {
    pub fn new(mode: ProgressMode, style: Style) -> Self {
        Self {
            mode,
            style,
            current: None,
            finished: 0,
        }
    }

    /// Steps that completed successfully.
    pub fn finished_count(&self) -> usize {
        self.finished
    }

    fn heading(step: PublishStep) -> String {
        format!("[{}/{}] {}", step.number(), PublishStep::ALL.len(), step)
    }

    fn start(&mut self, step: PublishStep) {
        let bar = if self.mode.is_interactive() {
            spinner_bar("{spinner:.cyan} {msg}", format!("{}...", Self::heading(step)))
        } else {
            ProgressBar::hidden()
        };
        self.current = Some((bar, Instant::now()));
    }

    fn end(&mut self, step: PublishStep, outcome: &str, msg_type: MessageType) {
        let elapsed = match self.current.take() {
            Some((bar, started)) => {
                bar.finish_and_clear();
                started.elapsed()
            }
            None => Duration::ZERO,
        };
        if self.mode != ProgressMode::Silent {
            let line = format!("{} {} ({})", Self::heading(step), outcome, format_duration(elapsed));
            println!("{}", self.style.message(msg_type, &line));
        }
    }
}

impl PublishObserver for StepProgress {
    fn on_event(&mut self, event: StepEvent<'_>) {
        match event {
            StepEvent::Started(step) => self.start(step),
            StepEvent::Finished(step) => {
                self.finished += 1;
                self.end(step, "done", MessageType::Ok);
            }
            StepEvent::Failed(step, _) => self.end(step, "failed", MessageType::Err),
        }
    }
}

/// "12ms" below a tenth of a second, else "0.8s".
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.1 {
        format!("{:.0}ms", secs * 1000.0)
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ColorMode;

    #[test]
    fn test_json_is_silent() {
        assert_eq!(ProgressMode::detect(true), ProgressMode::Silent);
        assert!(ProgressMode::Interactive.is_interactive());
        assert!(!ProgressMode::Quiet.is_interactive());
    }

    #[test]
    fn test_step_progress_counts_finished_steps() {
        let mut progress = StepProgress::new(ProgressMode::Silent, Style::new(ColorMode::Never));
        progress.on_event(StepEvent::Started(PublishStep::CheckBinding));
        progress.on_event(StepEvent::Finished(PublishStep::CheckBinding));
        progress.on_event(StepEvent::Started(PublishStep::SyncUpstream));
        let err = byrdocs_core::PublishError::NothingToPublish;
        progress.on_event(StepEvent::Failed(PublishStep::SyncUpstream, &err));
        assert_eq!(progress.finished_count(), 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(12)), "12ms");
        assert_eq!(format_duration(Duration::from_millis(800)), "0.8s");
    }

    #[test]
    fn test_hidden_spinner() {
        Progress::spinner("Hashing", ProgressMode::Quiet).finish_clear();
    }
}
