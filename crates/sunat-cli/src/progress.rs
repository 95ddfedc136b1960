//! Polling progress with terminal detection.
//!
//! Shows a spinner while a ticket is being polled and falls back to plain
//! reporter lines when stderr is not a terminal.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use sunat::report::Reporter;

/// Detects whether stderr is connected to a terminal.
pub fn stderr_is_terminal() -> bool {
    !ProgressDrawTarget::stderr().is_hidden()
}

/// Spinner shown while a ticket is polled.
///
/// Implements [`Reporter`] so the resolver's progress lines update the
/// spinner message instead of scrolling the terminal.
pub struct PollProgress {
    /// Spinner (only used when stderr is a terminal)
    bar: Option<ProgressBar>,
}

impl PollProgress {
    /// Starts reporting progress for `ticket`.
    pub fn start(ticket: &str) -> Self {
        let bar = if stderr_is_terminal() {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("waiting for ticket {ticket}"));
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        Self { bar }
    }

    /// Creates a progress reporter that never draws, regardless of terminal.
    #[allow(dead_code)]
    pub fn silent() -> Self {
        Self { bar: None }
    }

    /// Clears the spinner so later output starts on a clean line.
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Reporter for PollProgress {
    fn info(&mut self, msg: &str) {
        match &self.bar {
            Some(bar) => bar.set_message(msg.to_string()),
            None => eprintln!("[info] {msg}"),
        }
    }

    fn warn(&mut self, msg: &str) {
        match &self.bar {
            Some(bar) => bar.println(format!("[warn] {msg}")),
            None => eprintln!("[warn] {msg}"),
        }
    }

    fn error(&mut self, msg: &str) {
        match &self.bar {
            Some(bar) => bar.println(format!("[error] {msg}")),
            None => eprintln!("[error] {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_is_terminal_returns_bool() {
        let result = stderr_is_terminal();
        assert!(matches!(result, true | false));
    }

    #[test]
    fn test_silent_progress_never_draws() {
        let progress = PollProgress::silent();
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_reporter_lines_work_without_a_bar() {
        let mut progress = PollProgress::silent();
        progress.info("checking ticket");
        progress.warn("still processing");
        progress.error("gave up");
    }

    #[test]
    fn test_finish_completes_without_panic() {
        let progress = PollProgress::silent();
        progress.finish();
    }
}
