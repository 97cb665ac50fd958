//! Post-run summary: one model call turning the engine's result into a short
//! summary plus structured findings.
//!
//! The model answers in a two-line protocol:
//!
//! ```text
//! SUMMARY: <1-3 sentences>
//! DATA: <JSON object or {}>
//! ```

use browse_proto::LanguageModel;
use std::collections::BTreeMap;
use tracing::debug;

/// Summary and findings for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub summary: String,
    pub data: BTreeMap<String, String>,
}

/// Builds the summary prompt.
pub fn build_summary_prompt(task: &str, result: Option<&str>, actions: &[String]) -> String {
    let actions_joined = if actions.is_empty() {
        "(none)".to_string()
    } else {
        actions
            .iter()
            .map(|a| format!("- {a}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Summarise the results of this browser automation task in 1-3 sentences. \
         Also extract any structured key-value data (URLs, prices, names, dates) as a JSON object.\n\n\
         Respond in this exact format:\n\
         SUMMARY: <your summary>\n\
         DATA: <JSON object or {{}}>\n\n\
         Task: {task}\n\n\
         Result: {}\n\n\
         Actions taken:\n{actions_joined}",
        result.unwrap_or("(no result)")
    )
}

/// Parses a model response in the SUMMARY/DATA protocol.
///
/// A missing summary falls back to `result`; DATA that is not a JSON object
/// yields no findings.
pub fn parse_summary_response(text: &str, result: Option<&str>) -> TaskSummary {
    let mut summary = String::new();
    let mut data = BTreeMap::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("SUMMARY:") {
            summary = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("DATA:") {
            match serde_json::from_str::<serde_json::Value>(rest.trim()) {
                Ok(serde_json::Value::Object(map)) => {
                    data = map
                        .into_iter()
                        .map(|(k, v)| {
                            let value = match v {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            (k, value)
                        })
                        .collect();
                }
                Ok(_) => debug!("Summary DATA was not a JSON object"),
                Err(e) => debug!(error = %e, "Summary DATA was not valid JSON"),
            }
        }
    }

    if summary.is_empty() {
        summary = result.unwrap_or_default().to_string();
    }

    TaskSummary { summary, data }
}

/// Asks the model for a summary. Never fails: a model error degrades to the
/// raw result with no findings.
pub async fn summarize(
    model: &dyn LanguageModel,
    task: &str,
    result: Option<&str>,
    actions: &[String],
) -> TaskSummary {
    let prompt = build_summary_prompt(task, result, actions);
    match model.complete(&prompt).await {
        Ok(text) => parse_summary_response(&text, result),
        Err(e) => {
            debug!(error = %e, "Summary request failed, using raw result");
            TaskSummary {
                summary: result.unwrap_or_default().to_string(),
                data: BTreeMap::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use crate::testing::log_capture::CapturedLogs;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_prompt_lists_actions_and_result() {
        let actions = vec!["Search for laptops".to_string(), "Open first result".to_string()];
        let prompt = build_summary_prompt("find a laptop", Some("Found one"), &actions);
        assert!(prompt.contains("SUMMARY: <your summary>"));
        assert!(prompt.contains("DATA: <JSON object or {}>"));
        assert!(prompt.contains("Task: find a laptop"));
        assert!(prompt.contains("Result: Found one"));
        assert!(prompt.contains("- Search for laptops\n- Open first result"));
    }

    #[test]
    fn test_prompt_handles_missing_result_and_actions() {
        let prompt = build_summary_prompt("t", None, &[]);
        assert!(prompt.contains("Result: (no result)"));
        assert!(prompt.contains("Actions taken:\n(none)"));
    }

    #[test]
    fn test_parses_summary_and_data() {
        let text = "SUMMARY: Found 3 items under $50.\nDATA: {\"cheapest\": \"$19.99\", \"count\": 3}";
        let parsed = parse_summary_response(text, Some("raw"));
        assert_eq!(parsed.summary, "Found 3 items under $50.");
        assert_eq!(parsed.data.get("cheapest").map(String::as_str), Some("$19.99"));
        assert_eq!(parsed.data.get("count").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_malformed_data_yields_empty_findings() {
        let text = "SUMMARY: Done.\nDATA: {not json";
        let parsed = parse_summary_response(text, None);
        assert_eq!(parsed.summary, "Done.");
        assert!(parsed.data.is_empty());

        let parsed = parse_summary_response("SUMMARY: Done.\nDATA: [1, 2]", None);
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_missing_summary_falls_back_to_result() {
        let parsed = parse_summary_response("Here is what I found", Some("Result text"));
        assert_eq!(parsed.summary, "Result text");

        let parsed = parse_summary_response("", None);
        assert_eq!(parsed.summary, "");
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_result() {
        let model = MockModel::failing("HTTP 500");
        let summary = summarize(&model, "task", Some("raw result"), &[]).await;
        assert_eq!(summary.summary, "raw result");
        assert!(summary.data.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_not_a_warning() {
        let (logs, _guard) = CapturedLogs::install(LevelFilter::DEBUG);
        let model = MockModel::failing("HTTP 500");

        summarize(&model, "task", Some("raw result"), &[]).await;

        let text = logs.text();
        assert!(text.contains("Summary request failed"), "{text}");
        assert!(!text.contains("WARN"), "{text}");
    }

    #[tokio::test]
    async fn test_summarize_sends_prompt_to_model() {
        let model = MockModel::new(["SUMMARY: Booked.\nDATA: {}"]);
        let summary = summarize(&model, "book a table", Some("ok"), &[]).await;
        assert_eq!(summary.summary, "Booked.");
        assert!(model.prompts()[0].contains("Task: book a table"));
    }
}
