//! `browse run <TASK>`: one task, no session, optional JSON report.

use crate::Setup;
use anyhow::{Context, Result};
use browse_core::{ControlState, JsonReport, RunRequest, TaskRunner};
use browse_tui::{ConsoleReporter, Output, ResultFormatter, TerminalPrompter, terminal_lock};

/// Runs `task` once. Returns whether it succeeded.
///
/// With `json`, stdout carries only the report; step output and any
/// intervention prompts go to stderr.
pub async fn run(setup: &Setup, task: &str, json: bool) -> Result<bool> {
    let output = if json { Output::Stderr } else { Output::Stdout };

    let control = ControlState::default();
    control.set_vision_enabled(setup.config.run.use_vision);
    let prompter = TerminalPrompter::new(terminal_lock()).with_output(output);
    let runner = TaskRunner::new(&setup.config.run, control, &prompter)
        .with_model(&setup.model)
        .with_deployment(setup.deployment.clone());

    let mut engine = setup.engine();
    let mut reporter = ConsoleReporter::new(output);
    let outcome = runner
        .run(&mut engine, &RunRequest::new(task, ""), &mut reporter)
        .await;

    if json {
        println!("{}", render_report(&outcome.to_json_report())?);
    } else {
        for line in ResultFormatter::new(false).render(&outcome) {
            output.line(&line);
        }
    }

    Ok(outcome.success())
}

fn render_report(report: &JsonReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_report_has_expected_keys() {
        let report = JsonReport {
            summary: "Found 3 items".to_string(),
            data: BTreeMap::from([("Cheapest".to_string(), "£12".to_string())]),
            steps: 5,
            elapsed: 12.3,
            success: true,
        };

        let value: serde_json::Value = serde_json::from_str(&render_report(&report).unwrap()).unwrap();
        assert_eq!(value["summary"], "Found 3 items");
        assert_eq!(value["data"]["Cheapest"], "£12");
        assert_eq!(value["steps"], 5);
        assert_eq!(value["elapsed"], 12.3);
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_report_is_indented() {
        let report = JsonReport {
            summary: String::new(),
            data: BTreeMap::new(),
            steps: 0,
            elapsed: 0.0,
            success: false,
        };
        assert!(render_report(&report).unwrap().contains("\n  \"summary\""));
    }
}
