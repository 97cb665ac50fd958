//! Wire format of the engine bridge.
//!
//! The supervisor and the engine process exchange newline-delimited JSON.
//! Every line is an object with a `type` field naming the message.

use browse_proto::StepOutput;
use serde::{Deserialize, Serialize};

/// Messages written to the engine's stdin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Start a task. The engine answers with `step` events and one `done`
    /// or `error`.
    RunTask {
        task: String,
        max_steps: u32,
        use_vision: bool,
        visible: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extend_system_message: Option<String>,
    },

    /// Acknowledges a step. `max_steps` is the current budget; `choice` is
    /// the 0-based option picked for a choice signal.
    Continue {
        max_steps: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choice: Option<usize>,
    },

    /// Abandon the running task.
    Cancel { reason: String },

    /// Show or hide the browser window.
    Visibility { visible: bool },

    /// Exit after the current message.
    Shutdown,
}

impl EngineCommand {
    /// Serializes the command as one protocol line, newline included.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Messages read from the engine's stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine is up and accepts `run_task`.
    Ready,

    /// One completed step. The engine waits for `continue` or `cancel`.
    Step {
        step: u32,
        #[serde(flatten)]
        output: StepOutput,
    },

    /// The task finished.
    Done {
        #[serde(default)]
        result: Option<String>,
    },

    /// The task or the engine failed.
    Error { message: String },
}

/// Parses lines from the engine's stdout.
pub struct EngineStreamParser;

impl EngineStreamParser {
    /// Parses a single protocol line.
    ///
    /// Returns `None` for blank lines and for anything that is not a
    /// protocol message (logged at debug level), so stray prints from the
    /// engine never break the bridge.
    pub fn parse_line(line: &str) -> Option<EngineEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<EngineEvent>(trimmed) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(
                    "Skipping non-protocol engine line: {} (error: {})",
                    truncate(trimmed, 100),
                    e
                );
                None
            }
        }
    }
}

/// Truncates to at most `max_len` bytes on a char boundary, adding "...".
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use browse_proto::EngineSignal;

    #[test]
    fn test_parse_ready() {
        assert_eq!(
            EngineStreamParser::parse_line(r#"{"type":"ready"}"#),
            Some(EngineEvent::Ready)
        );
    }

    #[test]
    fn test_parse_step() {
        let json = r#"{"type":"step","step":3,"next_goal":"Search for laptops","action":[{"description":"type query"}],"evaluation_previous_goal":"Success"}"#;
        let event = EngineStreamParser::parse_line(json).unwrap();

        match event {
            EngineEvent::Step { step, output } => {
                assert_eq!(step, 3);
                assert_eq!(output.description(), "Search for laptops");
                assert_eq!(output.evaluation(), "Success");
                assert_eq!(output.action.len(), 1);
                assert!(output.signal.is_none());
            }
            other => panic!("Expected Step event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_step_with_signal() {
        let json = r#"{"type":"step","step":4,"next_goal":"Log in","signal":{"kind":"auth_required","message":"Sign-in page"}}"#;
        let Some(EngineEvent::Step { output, .. }) = EngineStreamParser::parse_line(json) else {
            panic!("Expected Step event");
        };
        assert_eq!(
            output.signal,
            Some(EngineSignal::AuthRequired {
                message: Some("Sign-in page".to_string())
            })
        );
    }

    #[test]
    fn test_parse_done_without_result() {
        assert_eq!(
            EngineStreamParser::parse_line(r#"{"type":"done"}"#),
            Some(EngineEvent::Done { result: None })
        );
    }

    #[test]
    fn test_parse_error() {
        let event = EngineStreamParser::parse_line(r#"{"type":"error","message":"browser crashed"}"#);
        assert_eq!(
            event,
            Some(EngineEvent::Error {
                message: "browser crashed".to_string()
            })
        );
    }

    #[test]
    fn test_skips_noise() {
        assert!(EngineStreamParser::parse_line("").is_none());
        assert!(EngineStreamParser::parse_line("   ").is_none());
        assert!(EngineStreamParser::parse_line("INFO launching chromium").is_none());
        assert!(EngineStreamParser::parse_line(r#"{"type":"unknown"}"#).is_none());
        assert!(EngineStreamParser::parse_line(&"é".repeat(80)).is_none());
    }

    #[test]
    fn test_command_lines() {
        let line = EngineCommand::Continue {
            max_steps: 50,
            choice: None,
        }
        .to_line()
        .unwrap();
        assert_eq!(line, "{\"type\":\"continue\",\"max_steps\":50}\n");

        let line = EngineCommand::Shutdown.to_line().unwrap();
        assert_eq!(line, "{\"type\":\"shutdown\"}\n");

        let line = EngineCommand::RunTask {
            task: "find socks".to_string(),
            max_steps: 25,
            use_vision: false,
            visible: true,
            extend_system_message: None,
        }
        .to_line()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["type"], "run_task");
        assert_eq!(value["visible"], true);
        assert!(value.get("extend_system_message").is_none());
    }
}
