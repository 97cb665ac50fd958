//! Prompter answering from a script.

use crate::intervention::Prompter;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Answers `ask` and `confirm` from a queue and records everything shown.
///
/// An empty or missing answer takes the prompt's default, like pressing
/// Enter at a real terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    transcript: Mutex<Vec<String>>,
    bells: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| (*a).to_string()).collect()),
            transcript: Mutex::new(Vec::new()),
            bells: AtomicUsize::new(0),
        }
    }

    /// Number of times the bell rang.
    pub fn bells(&self) -> usize {
        self.bells.load(Ordering::SeqCst)
    }

    /// Every line shown and question asked, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn transcript_contains(&self, needle: &str) -> bool {
        self.transcript().iter().any(|line| line.contains(needle))
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, line: &str) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }

    fn next_answer(&self) -> Option<String> {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .filter(|a| !a.trim().is_empty())
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    fn bell(&self) {
        self.bells.fetch_add(1, Ordering::SeqCst);
    }

    fn say(&self, line: &str) {
        self.record(line);
    }

    fn warn(&self, line: &str) {
        self.record(line);
    }

    async fn ask(&self, question: &str, default: Option<&str>) -> String {
        self.record(question);
        self.next_answer()
            .unwrap_or_else(|| default.unwrap_or_default().to_string())
    }

    async fn confirm(&self, question: &str, default: bool) -> bool {
        self.record(question);
        match self.next_answer() {
            Some(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            None => default,
        }
    }
}
