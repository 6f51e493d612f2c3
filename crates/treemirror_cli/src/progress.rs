//! Progress output for mirror runs.
//!
//! On a terminal, events drive indicatif bars. Anywhere else (CI, pipes,
//! redirected output) they become tracing events.

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use treemirror::sync::{ProgressCallback, SyncProgress};

use interactive::InteractiveReporter;
use logging::LoggingReporter;

pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Bars when stdout is a terminal, log lines otherwise.
    pub fn new() -> Self {
        Self::for_terminal(Term::stdout().is_term())
    }

    fn for_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(bars) => bars.handle(event),
            Self::Logging(log) => log.handle(event),
        }
    }

    /// Library-facing callback that forwards into this reporter.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| reporter.handle(event)))
    }

    /// Close any bars still drawing. Log mode has nothing to close.
    pub fn finish(&self) {
        if let Self::Interactive(bars) = self {
            bars.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
