//! Run control: drives one task through the engine with a human in the loop.
//!
//! [`RunController`] is the per-step callback. On every step it honours the
//! control flags (quit, pause, queued instruction, visibility), runs the
//! heuristic detectors, and suspends the run for an intervention when one
//! trips. [`TaskRunner`] wraps a whole task: engine start, the step loop,
//! engine stop, error translation, and the closing summary.

use crate::config::RunConfig;
use crate::control::ControlState;
use crate::detectors::{Phase, classify_phase, is_completion, is_failure, is_hedging, is_repetitive};
use crate::guidance::ErrorCategory;
use crate::intervention::{
    InterventionKind, InterventionRequest, InterventionResponse, Prompter, run_intervention,
};
use crate::reporter::{NoticeLevel, RunReporter};
use crate::session::TaskRecord;
use crate::status::format_step_status;
use crate::summary::{TaskSummary, summarize};
use async_trait::async_trait;
use browse_proto::{
    AutomationEngine, EngineError, EngineSignal, LanguageModel, StepCallback, StepInterrupt,
    StepOutput, StepVerdict, TaskRequest, VisibilityControl,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Appended to the engine's system message for every task.
pub const STRATEGY_VARIATION_PROMPT: &str = "\n\nIMPORTANT - Avoid repeating failed approaches:\n\
If an extraction or interaction attempt does not produce useful results after \
2 tries, you MUST switch to a fundamentally different strategy. Do not rephrase \
the same selector or approach. Instead try one of these alternatives:\n\
- Use broader CSS selectors (e.g. article, section, main) instead of specific attributes\n\
- Extract raw text via document.body.innerText or textContent\n\
- Use link text and heading elements (h1, h2, h3, a) to identify content\n\
- Scroll the page and look for dynamically loaded content\n\
- Try the accessibility tree to find semantic page structure\n\
Each retry must be a genuinely different approach, not a minor variation.";

const VISION_TIP: &str = "Tip: Press [F] to enable vision mode for visually complex pages";

/// A task as typed by the user, plus the session context it follows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub task: String,
    pub context: String,
}

impl RunRequest {
    pub fn new(task: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            context: context.into(),
        }
    }

    /// Task text handed to the engine, prefixed with session context.
    pub fn full_task(&self) -> String {
        if self.context.is_empty() {
            self.task.clone()
        } else {
            format!("{}\n\nNew task: {}", self.context, self.task)
        }
    }
}

/// Per-run counters kept by the controller.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Current step budget. Doubles when the user extends it.
    pub max_steps: u32,
    /// Last step number seen.
    pub current_step: u32,
    /// Step descriptions and user instructions, in order.
    pub actions: Vec<String>,
    pub consecutive_failures: u32,
    /// Consecutive steps flagged as repetitive.
    pub repetition_warnings: u32,
    pub last_phase: Option<Phase>,
    /// Step of the last checkpoint or sub-goal prompt.
    pub last_phase_prompt_step: u32,
    /// Visibility last pushed to the engine.
    pub applied_visibility: bool,
    pub vision_tip_shown: bool,
    /// Interventions raised, with the step they were raised on.
    pub interventions: Vec<(u32, InterventionKind)>,
    step_started: Instant,
}

impl RunState {
    pub fn new(max_steps: u32, visible: bool) -> Self {
        Self {
            max_steps,
            current_step: 0,
            actions: Vec::new(),
            consecutive_failures: 0,
            repetition_warnings: 0,
            last_phase: None,
            last_phase_prompt_step: 0,
            applied_visibility: visible,
            vision_tip_shown: false,
            interventions: Vec::new(),
            step_started: Instant::now(),
        }
    }

    /// Number of interventions of `kind` raised so far.
    pub fn intervention_count(&self, kind: InterventionKind) -> usize {
        self.interventions.iter().filter(|(_, k)| *k == kind).count()
    }

    fn recent_actions(&self, n: usize) -> String {
        let start = self.actions.len().saturating_sub(n);
        self.actions[start..].join("; ")
    }
}

/// The step callback registered with the engine for one task.
pub struct RunController<'a> {
    config: &'a RunConfig,
    control: ControlState,
    prompter: &'a dyn Prompter,
    reporter: &'a mut dyn RunReporter,
    visibility: Arc<dyn VisibilityControl>,
    state: RunState,
}

impl<'a> RunController<'a> {
    pub fn new(
        config: &'a RunConfig,
        control: ControlState,
        prompter: &'a dyn Prompter,
        reporter: &'a mut dyn RunReporter,
        visibility: Arc<dyn VisibilityControl>,
    ) -> Self {
        let state = RunState::new(config.max_steps, control.browser_visible());
        Self {
            config,
            control,
            prompter,
            reporter,
            visibility,
            state,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    /// Runs an intervention and applies the parts of the answer the loop owns.
    async fn intervene(
        &mut self,
        request: InterventionRequest,
    ) -> Result<InterventionResponse, StepInterrupt> {
        let kind = request.kind;
        self.state.interventions.push((request.step, kind));
        info!(kind = %kind, step = request.step, "Intervention raised");

        let response = run_intervention(&request, self.prompter, &self.control).await;
        if !response.continue_execution {
            info!(kind = %kind, "User stopped the run");
            return Err(StepInterrupt::StoppedByUser);
        }

        if let Some(text) = &response.new_instructions {
            debug!(kind = %kind, instruction = %text, "Instruction not forwarded to engine");
            let notice = if kind == InterventionKind::MaxSteps {
                "Wrap up requested, but the engine cannot change course mid-run."
            } else {
                "New instructions received, but the engine cannot take them mid-run."
            };
            self.reporter.on_notice(NoticeLevel::Warning, notice);
        }
        Ok(response)
    }

    /// Pushes a visibility change to the engine. Failures are logged only.
    fn apply_visibility(&mut self) {
        let desired = self.control.browser_visible();
        if desired == self.state.applied_visibility {
            return;
        }
        match self.visibility.set_visible(desired) {
            Ok(()) => debug!(visible = desired, "Browser visibility changed"),
            Err(e) => warn!(error = %e, visible = desired, "Failed to change browser visibility"),
        }
        self.state.applied_visibility = desired;
    }

    fn suggest_vision(&mut self) {
        if !self.control.vision_enabled() && !self.state.vision_tip_shown {
            self.reporter.on_notice(NoticeLevel::Tip, VISION_TIP);
            self.state.vision_tip_shown = true;
        }
    }

    fn take_pending_instruction(&mut self) {
        if let Some(instruction) = self.control.take_instruction() {
            self.state
                .actions
                .push(format!("[User instruction] {instruction}"));
            self.reporter.on_notice(
                NoticeLevel::Success,
                &format!("Instruction received: {instruction}"),
            );
            self.reporter.on_notice(
                NoticeLevel::Dim,
                "Note: the engine cannot take instructions mid-run, so this is recorded only.",
            );
        }
    }

    /// Handles an engine-raised signal. Returns the picked option for choices.
    async fn handle_signal(
        &mut self,
        signal: &EngineSignal,
        step: u32,
    ) -> Result<Option<usize>, StepInterrupt> {
        let max_steps = self.state.max_steps;
        let request = match signal {
            EngineSignal::AuthRequired { message } => {
                let mut request = InterventionRequest::new(InterventionKind::Auth, step, max_steps);
                request.message = message.clone();
                request
            }
            EngineSignal::Captcha { message } => {
                let mut request =
                    InterventionRequest::new(InterventionKind::Captcha, step, max_steps);
                request.message = message.clone();
                request
            }
            EngineSignal::Choice {
                message,
                options,
                default_choice,
            } => {
                let mut request = InterventionRequest::new(InterventionKind::Choice, step, max_steps)
                    .with_choices(options.clone(), *default_choice);
                request.message = message.clone();
                request
            }
            EngineSignal::Confirm {
                message,
                action_summary,
            } => {
                let mut request =
                    InterventionRequest::new(InterventionKind::Confirm, step, max_steps)
                        .with_action_summary(action_summary.clone());
                request.message = message.clone();
                request
            }
        };

        let response = self.intervene(request).await?;
        // Auth and captcha prompts force the browser into view.
        self.apply_visibility();
        Ok(response.choice_index)
    }
}

#[async_trait]
impl StepCallback for RunController<'_> {
    async fn on_step(
        &mut self,
        output: &StepOutput,
        step: u32,
    ) -> Result<StepVerdict, StepInterrupt> {
        if self.control.is_quit_requested() {
            return Err(StepInterrupt::QuitRequested);
        }
        if self.control.is_paused() {
            debug!(step, "Paused, waiting for resume");
            if !self.control.wait_while_paused().await {
                return Err(StepInterrupt::QuitRequested);
            }
        }

        self.take_pending_instruction();
        self.apply_visibility();

        self.state.current_step = step;
        let elapsed = self.state.step_started.elapsed();
        let evaluation = output.evaluation();

        if is_failure(evaluation) {
            self.state.consecutive_failures += 1;
        } else {
            self.state.consecutive_failures = 0;
        }

        let description = output.description().to_string();
        self.state.actions.push(description.clone());

        let status = format_step_status(step, self.state.max_steps, &description, elapsed);
        let flags = self.control.snapshot();
        self.reporter.on_step(&status, evaluation, &flags);
        debug!(step, description = %description, evaluation = %evaluation, "Step received");

        let choice = match &output.signal {
            Some(signal) => self.handle_signal(signal, step).await?,
            None => None,
        };

        let current_phase = classify_phase(&description);
        let phase_changed = matches!(
            (current_phase, self.state.last_phase),
            (Some(current), Some(last)) if current != last
        );
        if current_phase.is_some() {
            self.state.last_phase = current_phase;
        }

        if is_hedging(evaluation) {
            let request =
                InterventionRequest::new(InterventionKind::Confidence, step, self.state.max_steps)
                    .with_confidence_detail(format!("The agent seems uncertain: {evaluation}"));
            self.intervene(request).await?;
        }

        let phase_prompt_due = step.saturating_sub(self.state.last_phase_prompt_step)
            >= self.config.checkpoint_interval;
        if phase_changed && phase_prompt_due {
            self.state.last_phase_prompt_step = step;
            let recent = self.state.recent_actions(5);
            let request = if is_completion(evaluation) {
                InterventionRequest::new(
                    InterventionKind::SubGoalComplete,
                    step,
                    self.state.max_steps,
                )
                .with_progress(format!(
                    "Sub-goal reached at step {step}. Recent actions: {recent}"
                ))
            } else {
                let phase = self.state.last_phase.map_or("", Phase::as_str);
                InterventionRequest::new(InterventionKind::Checkpoint, step, self.state.max_steps)
                    .with_progress(format!(
                        "Phase change detected at step {step} ({phase}). Recent actions: {recent}"
                    ))
            };
            self.intervene(request).await?;
        }

        if is_repetitive(
            &self.state.actions,
            self.config.repetition_window,
            self.config.repetition_threshold,
        ) {
            self.state.repetition_warnings += 1;
            if self.state.repetition_warnings == 1 {
                self.reporter.on_notice(
                    NoticeLevel::Warning,
                    "Repetitive actions detected - the agent appears to be retrying the same approach.",
                );
            } else {
                let request =
                    InterventionRequest::new(InterventionKind::Stuck, step, self.state.max_steps)
                        .with_message(format!(
                            "The agent has been repeating similar actions without progress. Recent actions: {}",
                            self.state.recent_actions(3)
                        ));
                self.intervene(request).await?;
                self.suggest_vision();
                self.state.repetition_warnings = 0;
            }
        } else {
            self.state.repetition_warnings = 0;
        }

        if self.state.consecutive_failures >= self.config.failure_threshold {
            let request =
                InterventionRequest::new(InterventionKind::Stuck, step, self.state.max_steps)
                    .with_message(format!(
                        "I tried to {description} but couldn't complete the action."
                    ));
            self.intervene(request).await?;
            self.suggest_vision();
            self.state.consecutive_failures = 0;
        }

        let threshold =
            (f64::from(self.state.max_steps) * self.config.max_steps_warning_ratio) as u32;
        if step == threshold {
            self.reporter.on_notice(
                NoticeLevel::Warning,
                &format!(
                    "⚠ Approaching step limit ({step}/{}). Agent will prompt for guidance at step {}.",
                    self.state.max_steps,
                    threshold + 1
                ),
            );
        }
        if step > threshold {
            let request =
                InterventionRequest::new(InterventionKind::MaxSteps, step, self.state.max_steps);
            let response = self.intervene(request).await?;
            if response.increase_steps {
                self.state.max_steps = self.state.max_steps.saturating_mul(2);
                self.reporter.on_notice(
                    NoticeLevel::Success,
                    &format!("Step limit increased to {}", self.state.max_steps),
                );
            }
        }

        self.state.step_started = Instant::now();
        Ok(StepVerdict {
            max_steps: self.state.max_steps,
            choice,
        })
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    /// The engine finished the task.
    Completed,
    /// The user quit or stopped the run.
    Cancelled(StepInterrupt),
    /// The engine or model failed; `guidance` is what the user was shown.
    Failed {
        category: ErrorCategory,
        guidance: String,
    },
}

/// How a finished run should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Partial,
    NotStarted,
}

/// Everything known about a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub end: RunEnd,
    /// Final result text from the engine.
    pub result: Option<String>,
    pub steps: u32,
    /// Step budget at the end of the run.
    pub max_steps: u32,
    pub elapsed: Duration,
    pub summary: TaskSummary,
    pub actions: Vec<String>,
    pub interventions: Vec<(u32, InterventionKind)>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.end == RunEnd::Completed
    }

    pub fn kind(&self) -> OutcomeKind {
        if self.success() && (self.result.is_some() || !self.summary.summary.is_empty()) {
            OutcomeKind::Success
        } else if self.steps > 0 {
            OutcomeKind::Partial
        } else {
            OutcomeKind::NotStarted
        }
    }

    /// Key/value pairs for result displays: the summary first, then findings,
    /// falling back to the raw result.
    pub fn display_data(&self) -> Vec<(String, String)> {
        let mut data = Vec::new();
        if !self.summary.summary.is_empty() {
            data.push(("Summary".to_string(), self.summary.summary.clone()));
        }
        data.extend(
            self.summary
                .data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if data.is_empty()
            && let Some(result) = &self.result
        {
            data.push(("Result".to_string(), result.clone()));
        }
        data
    }

    /// Session record for this run.
    pub fn to_record(&self, task: &str) -> TaskRecord {
        TaskRecord {
            task: task.to_string(),
            summary: self.summary.summary.clone(),
            findings: self.summary.data.clone(),
            steps_taken: self.steps,
            elapsed_secs: self.elapsed.as_secs_f64(),
            success: self.success(),
            actions: self.actions.clone(),
        }
    }

    /// Machine-readable report for one-shot runs.
    pub fn to_json_report(&self) -> JsonReport {
        let summary = if self.summary.summary.is_empty() {
            self.result.clone().unwrap_or_default()
        } else {
            self.summary.summary.clone()
        };
        JsonReport {
            summary,
            data: self.summary.data.clone(),
            steps: self.steps,
            elapsed: self.elapsed.as_secs_f64(),
            success: self.success(),
        }
    }
}

/// Stdout payload of `browse run --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonReport {
    pub summary: String,
    pub data: BTreeMap<String, String>,
    pub steps: u32,
    pub elapsed: f64,
    pub success: bool,
}

/// Runs whole tasks: engine lifecycle, step loop, and closing summary.
pub struct TaskRunner<'a> {
    config: &'a RunConfig,
    control: ControlState,
    prompter: &'a dyn Prompter,
    model: Option<&'a dyn LanguageModel>,
    deployment: Option<String>,
}

impl<'a> TaskRunner<'a> {
    pub fn new(config: &'a RunConfig, control: ControlState, prompter: &'a dyn Prompter) -> Self {
        Self {
            config,
            control,
            prompter,
            model: None,
            deployment: None,
        }
    }

    /// Model used for the closing summary.
    pub fn with_model(mut self, model: &'a dyn LanguageModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Deployment name shown in deployment-not-found guidance.
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    /// Runs one task to completion, cancellation, or failure.
    pub async fn run(
        &self,
        engine: &mut dyn AutomationEngine,
        request: &RunRequest,
        reporter: &mut dyn RunReporter,
    ) -> RunOutcome {
        self.control.begin_run();
        let _running = scopeguard::guard(self.control.clone(), |control| control.end_run());

        let started = Instant::now();
        let task_request = TaskRequest {
            task: request.full_task(),
            max_steps: self.config.max_steps,
            use_vision: self.control.vision_enabled(),
            visible: self.control.browser_visible(),
            extend_system_message: Some(STRATEGY_VARIATION_PROMPT.to_string()),
        };
        info!(
            max_steps = task_request.max_steps,
            use_vision = task_request.use_vision,
            "Starting task"
        );
        reporter.on_notice(NoticeLevel::Info, "Starting agent...");

        let visibility = engine.visibility();
        let (result, state) = {
            let mut controller = RunController::new(
                self.config,
                self.control.clone(),
                self.prompter,
                &mut *reporter,
                visibility,
            );
            let result = match engine.start().await {
                Ok(()) => engine.run_task(&task_request, &mut controller).await,
                Err(e) => Err(e),
            };
            (result, controller.into_state())
        };

        if let Err(e) = engine.stop().await {
            warn!(error = %e, "Engine did not stop cleanly");
        }

        let (end, result_text, summary) = match result {
            Ok(result_text) => {
                let summary = self
                    .closing_summary(&request.task, result_text.as_deref(), &state.actions, reporter)
                    .await;
                (RunEnd::Completed, result_text, summary)
            }
            Err(EngineError::Cancelled(reason)) => {
                info!(%reason, step = state.current_step, "Run cancelled");
                reporter.on_notice(NoticeLevel::Warning, "Task interrupted by user");
                (RunEnd::Cancelled(reason), None, TaskSummary::default())
            }
            Err(e) => {
                let category = ErrorCategory::classify(&e.to_string());
                let guidance = category.guidance(self.deployment.as_deref());
                warn!(error = %e, ?category, step = state.current_step, "Run failed");
                reporter.on_error(&guidance);
                (RunEnd::Failed { category, guidance }, None, TaskSummary::default())
            }
        };

        RunOutcome {
            end,
            result: result_text,
            steps: state.current_step,
            max_steps: state.max_steps,
            elapsed: started.elapsed(),
            summary,
            actions: state.actions,
            interventions: state.interventions,
        }
    }

    async fn closing_summary(
        &self,
        task: &str,
        result: Option<&str>,
        actions: &[String],
        reporter: &mut dyn RunReporter,
    ) -> TaskSummary {
        match (self.model, result) {
            (Some(model), Some(text)) => {
                reporter.on_wait("Summarising results...");
                let summary = summarize(model, task, Some(text), actions).await;
                reporter.on_wait_done();
                summary
            }
            _ => TaskSummary {
                summary: result.unwrap_or_default().to_string(),
                data: BTreeMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_task_prefixes_context() {
        let request = RunRequest::new("compare them", "Context from this session:\n- Task 1: Found 3");
        assert_eq!(
            request.full_task(),
            "Context from this session:\n- Task 1: Found 3\n\nNew task: compare them"
        );
        assert_eq!(RunRequest::new("find laptops", "").full_task(), "find laptops");
    }

    fn outcome(end: RunEnd, result: Option<&str>, summary: &str, steps: u32) -> RunOutcome {
        RunOutcome {
            end,
            result: result.map(str::to_string),
            steps,
            max_steps: 25,
            elapsed: Duration::from_secs(3),
            summary: TaskSummary {
                summary: summary.to_string(),
                data: BTreeMap::new(),
            },
            actions: Vec::new(),
            interventions: Vec::new(),
        }
    }

    #[test]
    fn test_outcome_kinds() {
        assert_eq!(
            outcome(RunEnd::Completed, Some("done"), "", 4).kind(),
            OutcomeKind::Success
        );
        assert_eq!(
            outcome(RunEnd::Completed, None, "", 4).kind(),
            OutcomeKind::Partial
        );
        assert_eq!(
            outcome(RunEnd::Cancelled(StepInterrupt::QuitRequested), None, "", 2).kind(),
            OutcomeKind::Partial
        );
        let failed = RunEnd::Failed {
            category: ErrorCategory::Network,
            guidance: String::new(),
        };
        assert_eq!(outcome(failed, None, "", 0).kind(), OutcomeKind::NotStarted);
    }

    #[test]
    fn test_display_data_prefers_summary_then_result() {
        let mut with_summary = outcome(RunEnd::Completed, Some("raw"), "Found 3 items", 5);
        with_summary
            .summary
            .data
            .insert("cheapest".to_string(), "$10".to_string());
        assert_eq!(
            with_summary.display_data(),
            vec![
                ("Summary".to_string(), "Found 3 items".to_string()),
                ("cheapest".to_string(), "$10".to_string()),
            ]
        );

        let raw_only = outcome(RunEnd::Completed, Some("raw"), "", 5);
        assert_eq!(
            raw_only.display_data(),
            vec![("Result".to_string(), "raw".to_string())]
        );
    }

    #[test]
    fn test_json_report_falls_back_to_result() {
        let report = outcome(RunEnd::Completed, Some("raw result"), "", 5).to_json_report();
        assert_eq!(report.summary, "raw result");
        assert!(report.success);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"], 5);
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_record_carries_outcome() {
        let run = outcome(RunEnd::Completed, Some("raw"), "Found it", 5);
        let record = run.to_record("find it");
        assert_eq!(record.task, "find it");
        assert_eq!(record.summary, "Found it");
        assert_eq!(record.steps_taken, 5);
        assert!(record.success);
        assert!((record.elapsed_secs - 3.0).abs() < f64::EPSILON);
    }
}
