//! Console rendering: live step output, result screens, completion menus,
//! and the session summary.

use crate::footer::shortcut_bar;
use crate::terminal::Output;
use async_trait::async_trait;
use browse_core::{
    ControlFlags, NoticeLevel, OutcomeKind, RunOutcome, RunReporter, format_duration,
};
use browse_proto::{LanguageModel, ModelError};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use termimad::MadSkin;

/// Shown when a run failed before its first step.
pub const NOT_STARTED_MESSAGE: &str = "Task could not be started. Please check your configuration.";

/// Reason shown under a partial result.
const PARTIAL_REASON: &str = "The task was interrupted before completion.";

/// Renders finished runs as lines of text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultFormatter {
    verbose: bool,
}

impl ResultFormatter {
    /// `verbose` adds the numbered action log to results.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn render(&self, outcome: &RunOutcome) -> Vec<String> {
        match outcome.kind() {
            OutcomeKind::Success => self.success(outcome),
            OutcomeKind::Partial => self.partial(outcome),
            OutcomeKind::NotStarted => error_lines(NOT_STARTED_MESSAGE),
        }
    }

    fn success(&self, outcome: &RunOutcome) -> Vec<String> {
        let headline = format!(
            "✓ Task completed in {} steps ({})",
            outcome.steps,
            format_duration(outcome.elapsed.as_secs_f64())
        );
        let mut lines = vec![String::new(), headline.green().to_string(), String::new()];

        let data = outcome.display_data();
        if !data.is_empty() {
            lines.push("Results:".to_string());
            lines.extend(data.iter().map(|(k, v)| format!("  {k}: {v}")));
        }
        self.push_actions(&mut lines, &outcome.actions);
        lines
    }

    fn partial(&self, outcome: &RunOutcome) -> Vec<String> {
        let headline = format!(
            "⚠ Task partially completed (stopped at step {}/{})",
            outcome.steps, outcome.max_steps
        );
        let mut lines = vec![
            String::new(),
            headline.yellow().to_string(),
            String::new(),
            PARTIAL_REASON.to_string(),
            String::new(),
        ];

        let mut data = outcome.display_data();
        if let [(key, _)] = data.as_mut_slice()
            && key.as_str() == "Result"
        {
            *key = "Partial result".to_string();
        }
        lines.extend(data.iter().map(|(k, v)| format!("  {k}: {v}")));
        self.push_actions(&mut lines, &outcome.actions);
        lines
    }

    fn push_actions(&self, lines: &mut Vec<String>, actions: &[String]) {
        if !self.verbose || actions.is_empty() {
            return;
        }
        lines.push(String::new());
        lines.push("Actions taken:".to_string());
        lines.extend(
            actions
                .iter()
                .enumerate()
                .map(|(i, action)| format!("  {}. {action}", i + 1)),
        );
    }
}

/// An error message framed by blank lines, in red.
pub fn error_lines(message: &str) -> Vec<String> {
    vec![String::new(), message.red().to_string(), String::new()]
}

/// What the user picked from a completion menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Refine,
    NewTask,
    Export,
    Exit,
}

/// Completion menu after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionMenu {
    partial: bool,
}

impl CompletionMenu {
    /// The partial menu adds a refine option for unfinished runs.
    pub fn for_outcome(success: bool) -> Self {
        Self { partial: !success }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![String::new(), "What would you like to do next?".to_string()];
        let options: &[&str] = if self.partial {
            &["Refine the search", "New task", "Export session summary", "Exit"]
        } else {
            &["New task", "Export session summary", "Exit"]
        };
        lines.extend(
            options
                .iter()
                .enumerate()
                .map(|(i, option)| format!("  {}. {option}", i + 1)),
        );
        lines.push(String::new());
        lines
    }

    pub fn default_choice(&self) -> &'static str {
        if self.partial { "4" } else { "3" }
    }

    /// Maps an answer to an action. Unknown answers start a new task.
    pub fn parse(&self, answer: &str) -> NextAction {
        match (self.partial, answer.trim()) {
            (true, "1") => NextAction::Refine,
            (true, "3") | (false, "2") => NextAction::Export,
            (true, "4") | (false, "3") => NextAction::Exit,
            _ => NextAction::NewTask,
        }
    }
}

/// Renders the session export for the terminal.
pub fn render_session_summary(markdown: &str) -> String {
    let skin = MadSkin::default();
    format!("{}\n{}", "Session Summary".blue().bold(), skin.term_text(markdown))
}

/// Spinner on stderr, cleared when dropped.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Shows a spinner while the wrapped model is answering.
pub struct WaitingModel<'a> {
    inner: &'a dyn LanguageModel,
    message: String,
}

impl<'a> WaitingModel<'a> {
    pub fn new(inner: &'a dyn LanguageModel, message: impl Into<String>) -> Self {
        Self {
            inner,
            message: message.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for WaitingModel<'_> {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let _spinner = Spinner::start(&self.message);
        self.inner.complete(prompt).await
    }
}

/// [`RunReporter`] writing styled lines to the terminal.
pub struct ConsoleReporter {
    output: Output,
    spinner: Option<Spinner>,
}

impl ConsoleReporter {
    pub fn new(output: Output) -> Self {
        Self {
            output,
            spinner: None,
        }
    }
}

impl RunReporter for ConsoleReporter {
    fn on_step(&mut self, status: &str, evaluation: &str, flags: &ControlFlags) {
        self.output.line(status);
        if flags.verbose && !evaluation.is_empty() {
            self.output
                .line(&format!("  Eval: {evaluation}").dimmed().to_string());
        }
        self.output
            .line(&format!("  {}", shortcut_bar(flags)).cyan().to_string());
    }

    fn on_notice(&mut self, level: NoticeLevel, message: &str) {
        let styled = match level {
            NoticeLevel::Info => message.normal(),
            NoticeLevel::Success => message.green(),
            NoticeLevel::Warning => message.yellow(),
            NoticeLevel::Tip => message.cyan(),
            NoticeLevel::Dim => message.dimmed(),
        };
        self.output.line(&styled.to_string());
    }

    fn on_error(&mut self, message: &str) {
        for line in error_lines(message) {
            self.output.line(&line);
        }
    }

    fn on_wait(&mut self, message: &str) {
        self.spinner = Some(Spinner::start(message));
    }

    fn on_wait_done(&mut self) {
        self.spinner = None;
    }
}
