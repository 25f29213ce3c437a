//! Terminal notification surface.

use console::{style, Term};
use indicatif::ProgressBar;
use steadfast_core::{Notification, Notifier, NotifierChain, NotifyError, Severity};
use std::sync::Arc;

/// Writes notifications to stderr when it is attached to a terminal.
pub struct TerminalNotifier {
    term: Term,
    progress: Option<ProgressBar>,
}

impl TerminalNotifier {
    pub fn stderr() -> Self {
        Self {
            term: Term::stderr(),
            progress: None,
        }
    }

    /// Print above `progress` instead of through it.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    fn render(notification: &Notification) -> String {
        let marker = match notification.severity {
            Severity::Info => style("i").cyan(),
            Severity::Success => style("✓").green(),
            Severity::Warning => style("!").yellow(),
            Severity::Error => style("✗").red(),
        };
        format!(
            "{} {} {}",
            marker.for_stderr(),
            style(&notification.title).bold().for_stderr(),
            style(&notification.body).dim().for_stderr()
        )
    }
}

impl Notifier for TerminalNotifier {
    fn name(&self) -> &str {
        "terminal"
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.term.is_term() {
            return Err(NotifyError::Unavailable(self.name().to_string()));
        }
        let line = Self::render(notification);
        let write = || self.term.write_line(&line);
        let result = match &self.progress {
            Some(progress) => progress.suspend(write),
            None => write(),
        };
        result.map_err(|e| NotifyError::Delivery {
            name: self.name().to_string(),
            message: e.to_string(),
        })
    }
}

/// Terminal first, in-memory buffer as fallback.
pub fn default_chain(progress: Option<ProgressBar>) -> NotifierChain {
    let mut terminal = TerminalNotifier::stderr();
    if let Some(progress) = progress {
        terminal = terminal.with_progress(progress);
    }
    NotifierChain::new().push(Arc::new(terminal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_title_and_body() {
        console::set_colors_enabled_stderr(false);
        let line = TerminalNotifier::render(&Notification::warning("Retrying", "attempt 2"));
        assert_eq!(line, "! Retrying attempt 2");
    }
}
