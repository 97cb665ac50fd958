//! Interventions: typed prompts that hand control to the human.
//!
//! The run loop builds an [`InterventionRequest`] when a detector trips or the
//! engine raises a signal. [`run_intervention`] marks the terminal as owned by
//! the prompt, dispatches on the kind, and returns the structured answer.

use crate::control::ControlState;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Instruction sent when the user asks the engine to wrap up.
pub const WRAP_UP_INSTRUCTION: &str = "Please wrap up and show results so far";
/// Instruction sent when the user skips an uncertain step.
pub const SKIP_STEP_INSTRUCTION: &str = "Skip this step and move on to the next one";
/// Label of the option appended to every choice menu.
pub const NONE_OF_THESE: &str = "None of these";

/// What triggered an intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterventionKind {
    /// Login wall.
    Auth,
    /// Human-verification challenge.
    Captcha,
    /// Several candidates; the user picks one.
    Choice,
    /// Destructive action pending.
    Confirm,
    /// Repeated failures or repeated actions.
    Stuck,
    /// Step budget nearly spent.
    MaxSteps,
    /// Phase transition.
    Checkpoint,
    /// The engine sounds unsure.
    Confidence,
    /// A sub-goal looks finished.
    SubGoalComplete,
}

impl InterventionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InterventionKind::Auth => "auth",
            InterventionKind::Captcha => "captcha",
            InterventionKind::Choice => "choice",
            InterventionKind::Confirm => "confirm",
            InterventionKind::Stuck => "stuck",
            InterventionKind::MaxSteps => "max_steps",
            InterventionKind::Checkpoint => "checkpoint",
            InterventionKind::Confidence => "confidence",
            InterventionKind::SubGoalComplete => "sub_goal_complete",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a handler needs to render one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionRequest {
    pub kind: InterventionKind,
    pub step: u32,
    pub max_steps: u32,
    pub message: Option<String>,
    pub choices: Vec<String>,
    /// 1-based default option for choice menus.
    pub default_choice: Option<usize>,
    pub action_summary: BTreeMap<String, String>,
    pub progress_summary: Option<String>,
    pub confidence_detail: Option<String>,
}

impl InterventionRequest {
    pub fn new(kind: InterventionKind, step: u32, max_steps: u32) -> Self {
        Self {
            kind,
            step,
            max_steps,
            message: None,
            choices: Vec::new(),
            default_choice: None,
            action_summary: BTreeMap::new(),
            progress_summary: None,
            confidence_detail: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<String>, default_choice: Option<usize>) -> Self {
        self.choices = choices;
        self.default_choice = default_choice;
        self
    }

    pub fn with_action_summary(mut self, summary: BTreeMap<String, String>) -> Self {
        self.action_summary = summary;
        self
    }

    pub fn with_progress(mut self, summary: impl Into<String>) -> Self {
        self.progress_summary = Some(summary.into());
        self
    }

    pub fn with_confidence_detail(mut self, detail: impl Into<String>) -> Self {
        self.confidence_detail = Some(detail.into());
        self
    }
}

/// The human's answer to an intervention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterventionResponse {
    pub continue_execution: bool,
    /// 0-based option picked in a choice menu.
    pub choice_index: Option<usize>,
    pub new_instructions: Option<String>,
    /// Double the step budget.
    pub increase_steps: bool,
}

impl InterventionResponse {
    pub fn proceed() -> Self {
        Self {
            continue_execution: true,
            ..Self::default()
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn instruct(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            continue_execution: true,
            new_instructions: (!text.trim().is_empty()).then_some(text),
            ..Self::default()
        }
    }

    pub fn choose(index: usize) -> Self {
        Self {
            continue_execution: true,
            choice_index: Some(index),
            ..Self::default()
        }
    }

    pub fn extend_budget() -> Self {
        Self {
            continue_execution: true,
            increase_steps: true,
            ..Self::default()
        }
    }
}

/// Terminal interaction used by intervention handlers.
///
/// Implementations own the terminal for the duration of a call.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Alerts the user that input is needed.
    fn bell(&self);

    /// Prints a plain line.
    fn say(&self, line: &str);

    /// Prints a highlighted warning line.
    fn warn(&self, line: &str);

    /// Asks for a line of text. Empty input yields `default` (or "").
    async fn ask(&self, question: &str, default: Option<&str>) -> String;

    /// Asks a yes/no question.
    async fn confirm(&self, question: &str, default: bool) -> bool;
}

/// Runs one intervention with the terminal marked as owned by the prompt.
///
/// `intervention_active` is cleared on every exit path, including when the
/// surrounding future is dropped.
pub async fn run_intervention(
    request: &InterventionRequest,
    prompter: &dyn Prompter,
    control: &ControlState,
) -> InterventionResponse {
    debug!(kind = %request.kind, step = request.step, "Starting intervention");
    control.set_intervention_active(true);
    let _restore = scopeguard::guard(control.clone(), |control| {
        control.set_intervention_active(false);
    });

    let response = handle_intervention(request, prompter, control).await;
    debug!(kind = %request.kind, ?response, "Intervention resolved");
    response
}

/// Dispatches a request to the handler for its kind.
pub async fn handle_intervention(
    request: &InterventionRequest,
    prompter: &dyn Prompter,
    control: &ControlState,
) -> InterventionResponse {
    prompter.bell();
    prompter.say("");
    match request.kind {
        InterventionKind::Auth => {
            control.set_browser_visible(true);
            prompter.say("Browser window shown for authentication.");
            say_message(request, prompter);
            prompter.say("The site requires you to log in. Please log in manually in the browser window.");
            prompter
                .ask("Press Enter when you've logged in to continue", Some(""))
                .await;
            InterventionResponse::proceed()
        }
        InterventionKind::Captcha => {
            control.set_browser_visible(true);
            prompter.say("Browser window shown for verification.");
            say_message(request, prompter);
            prompter.say("Please solve the verification challenge in the browser window.");
            prompter
                .ask("Press Enter when you've completed it", Some(""))
                .await;
            InterventionResponse::proceed()
        }
        InterventionKind::Choice => handle_choice(request, prompter).await,
        InterventionKind::Confirm => {
            say_message(request, prompter);
            for (key, value) in &request.action_summary {
                prompter.say(&format!("  {key}: {value}"));
            }
            if prompter.confirm("Proceed?", false).await {
                InterventionResponse::proceed()
            } else {
                let text = prompter.ask("What would you like to do instead?", None).await;
                InterventionResponse::instruct(text)
            }
        }
        InterventionKind::Stuck => {
            say_message(request, prompter);
            prompter.say("This might mean:");
            prompter.say("  - The page layout has changed");
            prompter.say("  - The element is hidden or not yet loaded");
            prompter.say("  - I'm looking in the wrong place");
            prompter.say("");
            let menu = [
                "Retry (I'll try again)",
                "Describe what you see (I'll tell you what's on the page)",
                "Give me new instructions",
                "Abort task",
            ];
            match pick(prompter, "What would you like to do?", &menu, 1).await {
                Some(1) => InterventionResponse::proceed(),
                Some(2) => {
                    prompter.warn("Page description is not available yet. Retrying instead.");
                    InterventionResponse::proceed()
                }
                Some(3) => {
                    let text = prompter.ask("What should I do instead?", None).await;
                    InterventionResponse::instruct(text)
                }
                Some(4) => InterventionResponse::stop(),
                _ => {
                    prompter.warn("Invalid choice. Retrying.");
                    InterventionResponse::proceed()
                }
            }
        }
        InterventionKind::MaxSteps => {
            prompter.warn(&format!(
                "⚠ Approaching step limit ({}/{} steps used).",
                request.step, request.max_steps
            ));
            prompter.say("");
            let extend = format!(
                "Continue (increase limit to {} steps)",
                request.max_steps.saturating_mul(2)
            );
            let menu = [
                extend.as_str(),
                "Wrap up and show results so far",
                "Stop now",
            ];
            match pick(prompter, "What would you like to do?", &menu, 1).await {
                Some(1) => InterventionResponse::extend_budget(),
                Some(2) => InterventionResponse::instruct(WRAP_UP_INSTRUCTION),
                Some(3) => InterventionResponse::stop(),
                _ => {
                    prompter.warn("Invalid choice. Continuing.");
                    InterventionResponse::extend_budget()
                }
            }
        }
        InterventionKind::Checkpoint => {
            say_progress(request, prompter);
            let menu = ["Continue", "Adjust (give new instructions)", "Stop"];
            match pick(prompter, "Continue with this approach, or adjust?", &menu, 1).await {
                Some(2) => {
                    let text = prompter.ask("What should I do differently?", None).await;
                    InterventionResponse::instruct(text)
                }
                Some(3) => InterventionResponse::stop(),
                Some(1) => InterventionResponse::proceed(),
                _ => {
                    prompter.warn("Invalid choice. Continuing.");
                    InterventionResponse::proceed()
                }
            }
        }
        InterventionKind::Confidence => {
            if let Some(detail) = &request.confidence_detail {
                prompter.say(detail);
                prompter.say("");
            }
            let menu = ["Proceed anyway", "Give guidance", "Skip this step"];
            match pick(prompter, "How would you like to proceed?", &menu, 2).await {
                Some(1) => InterventionResponse::proceed(),
                Some(3) => InterventionResponse::instruct(SKIP_STEP_INSTRUCTION),
                choice => {
                    if choice != Some(2) {
                        prompter.warn("Invalid choice. Waiting for guidance.");
                    }
                    let text = prompter
                        .ask("What guidance would you like to give?", None)
                        .await;
                    InterventionResponse::instruct(text)
                }
            }
        }
        InterventionKind::SubGoalComplete => {
            say_progress(request, prompter);
            let menu = [
                "Continue to next step",
                "Give new directions",
                "That's enough, show results",
            ];
            match pick(prompter, "What next?", &menu, 1).await {
                Some(2) => {
                    let text = prompter.ask("What should I do next?", None).await;
                    InterventionResponse::instruct(text)
                }
                Some(3) => InterventionResponse::stop(),
                Some(1) => InterventionResponse::proceed(),
                _ => {
                    prompter.warn("Invalid choice. Continuing.");
                    InterventionResponse::proceed()
                }
            }
        }
    }
}

async fn handle_choice(
    request: &InterventionRequest,
    prompter: &dyn Prompter,
) -> InterventionResponse {
    say_message(request, prompter);
    if request.choices.is_empty() {
        return InterventionResponse::stop();
    }

    for (i, choice) in request.choices.iter().enumerate() {
        prompter.say(&format!("  {}. {choice}", i + 1));
    }
    let refine_option = request.choices.len() + 1;
    prompter.say(&format!("  {refine_option}. {NONE_OF_THESE}"));

    let default = request
        .default_choice
        .filter(|d| (1..=request.choices.len()).contains(d))
        .unwrap_or(1);
    let answer = prompter
        .ask("Which would you like?", Some(&default.to_string()))
        .await;

    match answer.trim().parse::<usize>() {
        Ok(n) if n == refine_option => {
            let text = prompter
                .ask("How would you like to refine the search?", None)
                .await;
            InterventionResponse::instruct(text)
        }
        Ok(n) if (1..refine_option).contains(&n) => InterventionResponse::choose(n - 1),
        _ => {
            prompter.warn("Invalid choice. Using default.");
            InterventionResponse::choose(default - 1)
        }
    }
}

/// Prints a numbered menu and parses the answer as a 1-based option.
///
/// Returns `None` for non-numeric or out-of-range input.
async fn pick(prompter: &dyn Prompter, title: &str, options: &[&str], default: usize) -> Option<usize> {
    prompter.say(title);
    for (i, option) in options.iter().enumerate() {
        prompter.say(&format!("  {}. {option}", i + 1));
    }
    prompter.say("");
    let answer = prompter.ask("Choose", Some(&default.to_string())).await;
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=options.len()).contains(n))
}

fn say_message(request: &InterventionRequest, prompter: &dyn Prompter) {
    if let Some(message) = &request.message {
        prompter.say(message);
        prompter.say("");
    }
}

fn say_progress(request: &InterventionRequest, prompter: &dyn Prompter) {
    if let Some(summary) = &request.progress_summary {
        prompter.say(summary);
        prompter.say("");
    }
}
