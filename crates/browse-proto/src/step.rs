//! Step output emitted by the automation engine after each step.
//!
//! The engine reports what it is about to do (`next_goal`), the actions it
//! chose, and how it judged the previous step. Engines that hit a wall they
//! cannot pass on their own (a login page, a captcha, an ambiguous choice, a
//! destructive action) attach a [`EngineSignal`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Description used when the engine gives neither a goal nor an action.
pub const FALLBACK_DESCRIPTION: &str = "Processing";

/// One engine step as seen by the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    /// What the engine intends to do next.
    #[serde(default)]
    pub next_goal: Option<String>,

    /// Actions chosen for this step. Engines may send a single object or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub action: Vec<StepAction>,

    /// The engine's judgement of how the previous step went.
    #[serde(default)]
    pub evaluation_previous_goal: Option<String>,

    /// Request for human help raised by the engine itself.
    #[serde(default)]
    pub signal: Option<EngineSignal>,
}

impl StepOutput {
    /// Human-readable description of the step.
    ///
    /// Prefers a non-empty `next_goal`, then the first action's description,
    /// then [`FALLBACK_DESCRIPTION`].
    pub fn description(&self) -> &str {
        if let Some(goal) = self.next_goal.as_deref()
            && !goal.trim().is_empty()
        {
            return goal;
        }
        self.action
            .first()
            .and_then(|a| a.description.as_deref())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(FALLBACK_DESCRIPTION)
    }

    /// Evaluation text, empty when the engine gave none.
    pub fn evaluation(&self) -> &str {
        self.evaluation_previous_goal.as_deref().unwrap_or("")
    }
}

/// A single action chosen by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepAction {
    #[serde(default)]
    pub description: Option<String>,
}

impl StepAction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }
}

/// Conditions the engine cannot resolve without a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineSignal {
    /// The target requires the user to log in.
    AuthRequired {
        #[serde(default)]
        message: Option<String>,
    },

    /// The target presents a human-verification challenge.
    Captcha {
        #[serde(default)]
        message: Option<String>,
    },

    /// Several candidates match and the engine needs the user to pick one.
    Choice {
        #[serde(default)]
        message: Option<String>,
        options: Vec<String>,
        /// 1-based default option.
        #[serde(default)]
        default_choice: Option<usize>,
    },

    /// A destructive or irreversible action is about to happen.
    Confirm {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        action_summary: BTreeMap<String, String>,
    },
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<StepAction>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(StepAction),
        Many(Vec<StepAction>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(action)) => vec![action],
        Some(OneOrMany::Many(actions)) => actions,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_prefers_next_goal() {
        let step = StepOutput {
            next_goal: Some("Search for laptops".to_string()),
            action: vec![StepAction::new("click search box")],
            ..Default::default()
        };
        assert_eq!(step.description(), "Search for laptops");
    }

    #[test]
    fn test_description_falls_back_to_first_action() {
        let step = StepOutput {
            next_goal: Some("   ".to_string()),
            action: vec![StepAction::new("click search box"), StepAction::new("type")],
            ..Default::default()
        };
        assert_eq!(step.description(), "click search box");
    }

    #[test]
    fn test_description_defaults_to_processing() {
        assert_eq!(StepOutput::default().description(), "Processing");
        let step = StepOutput {
            action: vec![StepAction::default()],
            ..Default::default()
        };
        assert_eq!(step.description(), "Processing");
    }

    #[test]
    fn test_action_accepts_single_object() {
        let json = r#"{"next_goal":"go","action":{"description":"click"}}"#;
        let step: StepOutput = serde_json::from_str(json).unwrap();
        assert_eq!(step.action, vec![StepAction::new("click")]);
    }

    #[test]
    fn test_action_accepts_list_and_missing() {
        let json = r#"{"action":[{"description":"a"},{}]}"#;
        let step: StepOutput = serde_json::from_str(json).unwrap();
        assert_eq!(step.action.len(), 2);

        let step: StepOutput = serde_json::from_str("{}").unwrap();
        assert!(step.action.is_empty());
        assert_eq!(step.evaluation(), "");
    }

    #[test]
    fn test_parses_choice_signal() {
        let json = r#"{"signal":{"kind":"choice","options":["Red","Blue"],"default_choice":2}}"#;
        let step: StepOutput = serde_json::from_str(json).unwrap();
        assert_eq!(
            step.signal,
            Some(EngineSignal::Choice {
                message: None,
                options: vec!["Red".to_string(), "Blue".to_string()],
                default_choice: Some(2),
            })
        );
    }
}
