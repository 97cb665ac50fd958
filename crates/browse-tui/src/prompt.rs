//! Line-based prompts on the real terminal.

use crate::terminal::{self, Output, TerminalLock};
use async_trait::async_trait;
use browse_core::Prompter;
use colored::Colorize;

/// [`Prompter`] reading answers from stdin.
///
/// Every read takes the terminal lock, so the key listener has left raw mode
/// before a prompt starts reading.
pub struct TerminalPrompter {
    terminal: TerminalLock,
    output: Output,
}

impl TerminalPrompter {
    pub fn new(terminal: TerminalLock) -> Self {
        Self {
            terminal,
            output: Output::Stdout,
        }
    }

    /// Sends questions and messages to `output` instead of stdout.
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Shows `question` and reads one trimmed line. `None` at end of input.
    pub async fn read_answer(&self, question: &str) -> Option<String> {
        let _owner = self.terminal.lock().await;
        self.output.inline(question);
        terminal::read_line().await.map(|line| line.trim().to_string())
    }
}

/// Parses a yes/no answer. Blank input takes `default`; anything unrecognised
/// is `None`.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    fn bell(&self) {
        self.output.inline("\x07");
    }

    fn say(&self, line: &str) {
        self.output.line(line);
    }

    fn warn(&self, line: &str) {
        self.output.line(&line.yellow().to_string());
    }

    async fn ask(&self, question: &str, default: Option<&str>) -> String {
        let prompt = match default {
            Some(d) if !d.is_empty() => format!("{question} [{d}]: "),
            _ => format!("{question}: "),
        };
        match self.read_answer(&prompt).await {
            Some(answer) if !answer.is_empty() => answer,
            _ => default.unwrap_or_default().to_string(),
        }
    }

    async fn confirm(&self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.read_answer(&format!("{question} {hint} ")).await else {
                return default;
            };
            match parse_yes_no(&answer, default) {
                Some(choice) => return choice,
                None => self.output.line("Please answer y or n."),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_no_accepts_short_and_long_forms() {
        assert_eq!(parse_yes_no("y", false), Some(true));
        assert_eq!(parse_yes_no("YES", false), Some(true));
        assert_eq!(parse_yes_no(" n ", true), Some(false));
        assert_eq!(parse_yes_no("no", true), Some(false));
    }

    #[test]
    fn test_blank_answer_takes_default() {
        assert_eq!(parse_yes_no("", true), Some(true));
        assert_eq!(parse_yes_no("   ", false), Some(false));
    }

    #[test]
    fn test_other_answers_are_rejected() {
        assert_eq!(parse_yes_no("maybe", true), None);
        assert_eq!(parse_yes_no("1", false), None);
    }
}
