//! Reporter that keeps everything it is given.

use crate::control::ControlFlags;
use crate::reporter::{NoticeLevel, RunReporter};

/// Collects status lines, notices, and errors for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub steps: Vec<String>,
    pub evaluations: Vec<String>,
    pub notices: Vec<(NoticeLevel, String)>,
    pub errors: Vec<String>,
    pub waits: Vec<String>,
    /// Control flags passed with the most recent step.
    pub last_flags: Option<ControlFlags>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when any notice contains `needle`.
    pub fn has_notice(&self, needle: &str) -> bool {
        self.notices.iter().any(|(_, text)| text.contains(needle))
    }

    /// Number of notices containing `needle`.
    pub fn notice_count(&self, needle: &str) -> usize {
        self.notices
            .iter()
            .filter(|(_, text)| text.contains(needle))
            .count()
    }
}

impl RunReporter for RecordingReporter {
    fn on_step(&mut self, status: &str, evaluation: &str, flags: &ControlFlags) {
        self.steps.push(status.to_string());
        self.evaluations.push(evaluation.to_string());
        self.last_flags = Some(flags.clone());
    }

    fn on_notice(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn on_wait(&mut self, message: &str) {
        self.waits.push(message.to_string());
    }
}
