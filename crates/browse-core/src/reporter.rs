//! Reporter trait for run-loop output.
//!
//! The run loop never writes to the terminal directly. It hands status lines
//! and notices to a `RunReporter`, so the console, JSON mode, and tests can
//! each decide where output goes.

use crate::control::ControlFlags;

/// Tone of a notice, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Neutral progress ("Starting agent...").
    Info,
    /// Something the user asked for took effect.
    Success,
    /// Worth the user's attention, not an error.
    Warning,
    /// A hint about a feature that may help.
    Tip,
    /// Secondary detail.
    Dim,
}

/// Receives run-loop output.
pub trait RunReporter: Send {
    /// Called once per engine step with the formatted status line.
    ///
    /// `flags` is the control state at the time of the step, for rendering
    /// the shortcut bar. `evaluation` is the engine's judgement of the
    /// previous step, shown in verbose mode.
    fn on_step(&mut self, status: &str, evaluation: &str, flags: &ControlFlags);

    /// Called for informational output.
    fn on_notice(&mut self, level: NoticeLevel, message: &str);

    /// Called with user guidance when a run fails.
    fn on_error(&mut self, message: &str);

    /// Called before a slow step with no engine output, such as the summary
    /// request.
    fn on_wait(&mut self, _message: &str) {}

    /// Called when the slow step from [`RunReporter::on_wait`] finishes.
    fn on_wait_done(&mut self) {}
}
