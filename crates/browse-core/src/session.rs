//! Session history: one record per task, context for follow-up tasks, and a
//! markdown export.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of most recent tasks rendered in full in the context prompt.
const RECENT_TASKS: usize = 5;

/// Outcome of one task. Immutable once added to a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: String,
    pub summary: String,
    pub findings: BTreeMap<String, String>,
    pub steps_taken: u32,
    /// Wall time in seconds.
    pub elapsed_secs: f64,
    pub success: bool,
    pub actions: Vec<String>,
}

/// Tasks run during this process, in order.
#[derive(Debug, Clone, Default)]
pub struct Session {
    records: Vec<TaskRecord>,
    verbose: bool,
}

impl Session {
    pub fn new(verbose: bool) -> Self {
        Self {
            records: Vec::new(),
            verbose,
        }
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn add_record(&mut self, record: TaskRecord) {
        debug!(task = %record.task, success = record.success, "Recording task");
        self.records.push(record);
    }

    /// Summary of the last task, or its text when there is no summary.
    pub fn last_reference(&self) -> Option<&str> {
        self.records.last().map(|r| {
            if r.summary.is_empty() {
                r.task.as_str()
            } else {
                r.summary.as_str()
            }
        })
    }

    /// Context prompt for the next task.
    ///
    /// The five most recent tasks show their summaries; older ones collapse
    /// to one line with their status. Empty when nothing has run yet.
    pub fn build_context_prompt(&self) -> String {
        if self.records.is_empty() {
            return String::new();
        }

        let mut lines = vec!["Context from this session:".to_string()];
        let split = self.records.len().saturating_sub(RECENT_TASKS);

        for (i, record) in self.records.iter().enumerate() {
            let number = i + 1;
            if i < split {
                let status = if record.success { "completed" } else { "failed" };
                lines.push(format!("- Task {number}: {} ({status})", record.task));
            } else {
                let summary = if record.summary.is_empty() {
                    "No summary available"
                } else {
                    record.summary.as_str()
                };
                lines.push(format!("- Task {number}: {summary}"));
            }
        }

        lines.join("\n")
    }

    /// Renders the session as a self-contained markdown document.
    pub fn export_summary(&self) -> String {
        let mut parts = vec!["# Browser Session Summary\n".to_string()];

        for (i, record) in self.records.iter().enumerate() {
            let status = if record.success { "Completed" } else { "Failed" };
            parts.push(format!("## Task {}: {}\n", i + 1, record.task));
            parts.push(format!("**Status:** {status}  "));
            parts.push(format!("**Steps:** {}  ", record.steps_taken));
            parts.push(format!("**Time:** {:.1}s\n", record.elapsed_secs));

            if !record.summary.is_empty() {
                parts.push(format!("**Summary:** {}\n", record.summary));
            }

            if !record.findings.is_empty() {
                parts.push("**Findings:**\n".to_string());
                for (key, value) in &record.findings {
                    parts.push(format!("- **{key}:** {value}"));
                }
                parts.push(String::new());
            }

            if self.verbose && !record.actions.is_empty() {
                parts.push("<details>\n<summary>Actions log</summary>\n".to_string());
                for action in &record.actions {
                    parts.push(format!("1. {action}"));
                }
                parts.push("\n</details>\n".to_string());
            }
        }

        parts.push("---\n".to_string());
        parts.push("## Suggested follow-up\n".to_string());
        parts.push("Use the summaries above as context for your next step. For example:\n".to_string());
        parts.push(
            "> Based on the session above, please analyse the findings and suggest next actions.\n"
                .to_string(),
        );

        parts.join("\n")
    }

    /// Writes the export to `dir/browse-session-<timestamp>.md`.
    pub fn save_to_dir(&self, dir: &Path) -> io::Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        self.save_to_path(&dir.join(format!("browse-session-{timestamp}.md")))
    }

    /// Writes the export to `path`, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> io::Result<PathBuf> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.export_summary())?;
        debug!(path = %path.display(), "Session summary written");
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(task: &str, summary: &str, success: bool) -> TaskRecord {
        TaskRecord {
            task: task.to_string(),
            summary: summary.to_string(),
            success,
            ..TaskRecord::default()
        }
    }

    #[test]
    fn test_empty_session_has_no_context() {
        assert_eq!(Session::new(false).build_context_prompt(), "");
    }

    #[test]
    fn test_short_session_renders_every_summary() {
        let mut session = Session::new(false);
        session.add_record(record("find laptops", "Found 3 laptops", true));
        session.add_record(record("compare them", "", false));

        assert_eq!(
            session.build_context_prompt(),
            "Context from this session:\n\
             - Task 1: Found 3 laptops\n\
             - Task 2: No summary available"
        );
    }

    #[test]
    fn test_long_session_condenses_older_tasks() {
        let mut session = Session::new(false);
        for i in 1..=7 {
            session.add_record(record(&format!("task {i}"), &format!("summary {i}"), i != 2));
        }

        let context = session.build_context_prompt();
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[1], "- Task 1: task 1 (completed)");
        assert_eq!(lines[2], "- Task 2: task 2 (failed)");
        assert_eq!(lines[3], "- Task 3: summary 3");
        assert_eq!(lines[7], "- Task 7: summary 7");
    }

    #[test]
    fn test_exactly_five_tasks_are_all_full() {
        let mut session = Session::new(false);
        for i in 1..=5 {
            session.add_record(record(&format!("task {i}"), &format!("summary {i}"), true));
        }
        assert!(!session.build_context_prompt().contains("(completed)"));
    }

    #[test]
    fn test_last_reference_prefers_summary() {
        let mut session = Session::new(false);
        assert_eq!(session.last_reference(), None);
        session.add_record(record("find laptops", "", true));
        assert_eq!(session.last_reference(), Some("find laptops"));
        session.add_record(record("compare", "Picked the X1", true));
        assert_eq!(session.last_reference(), Some("Picked the X1"));
    }

    #[test]
    fn test_export_contains_records_and_trailer() {
        let mut session = Session::new(false);
        let mut first = record("find laptops", "Found 3 laptops", true);
        first.steps_taken = 5;
        first.elapsed_secs = 12.34;
        first.findings.insert("cheapest".to_string(), "$499".to_string());
        first.actions = vec!["Search for laptops".to_string()];
        session.add_record(first);

        let doc = session.export_summary();
        assert!(doc.starts_with("# Browser Session Summary\n"));
        assert!(doc.contains("## Task 1: find laptops\n"));
        assert!(doc.contains("**Status:** Completed  "));
        assert!(doc.contains("**Steps:** 5  "));
        assert!(doc.contains("**Time:** 12.3s\n"));
        assert!(doc.contains("**Summary:** Found 3 laptops\n"));
        assert!(doc.contains("- **cheapest:** $499"));
        assert!(!doc.contains("<details>"));
        assert!(doc.contains("## Suggested follow-up"));
        assert!(doc.contains("> Based on the session above"));
    }

    #[test]
    fn test_verbose_export_includes_action_log() {
        let mut session = Session::new(true);
        let mut first = record("find laptops", "", false);
        first.actions = vec!["Search".to_string(), "Scroll".to_string()];
        session.add_record(first);

        let doc = session.export_summary();
        assert!(doc.contains("**Status:** Failed  "));
        assert!(doc.contains("<details>\n<summary>Actions log</summary>\n"));
        assert!(doc.contains("1. Search\n1. Scroll"));
        assert!(!doc.contains("**Summary:**"));
    }

    #[test]
    fn test_save_creates_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let export_dir = dir.path().join("nested").join("logs");
        let mut session = Session::new(false);
        session.add_record(record("find laptops", "Found", true));

        let path = session.save_to_dir(&export_dir).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("browse-session-"));
        assert!(name.ends_with(".md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), session.export_summary());
    }
}
