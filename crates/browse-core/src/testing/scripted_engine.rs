//! Engine that replays a fixed list of step outputs.

use async_trait::async_trait;
use browse_proto::{
    AutomationEngine, EngineError, StepCallback, StepOutput, StepVerdict, TaskRequest,
    VisibilityControl,
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Visibility handle that records every change.
#[derive(Debug, Default)]
pub struct RecordingVisibility {
    calls: Mutex<Vec<bool>>,
}

impl RecordingVisibility {
    pub fn calls(&self) -> Vec<bool> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VisibilityControl for RecordingVisibility {
    fn set_visible(&self, visible: bool) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(visible);
        Ok(())
    }
}

/// How a scripted run ends once every step has been replayed.
#[derive(Debug, Clone)]
enum Ending {
    Result(Option<String>),
    Error(String),
}

/// An [`AutomationEngine`] driven by a script.
///
/// Steps are numbered from 1. The engine stops early, with no result, when
/// the next step number exceeds the budget from the latest verdict, the way
/// a real engine stops at its step limit.
#[derive(Debug)]
pub struct ScriptedEngine {
    steps: Vec<StepOutput>,
    ending: Ending,
    start_error: Option<String>,
    step_delay: Duration,
    visibility: Arc<RecordingVisibility>,
    requests: Vec<TaskRequest>,
    verdicts: Vec<StepVerdict>,
    started: usize,
    stopped: usize,
}

impl ScriptedEngine {
    /// Replays `steps` and finishes with `result`.
    pub fn new(steps: Vec<StepOutput>, result: Option<&str>) -> Self {
        Self {
            steps,
            ending: Ending::Result(result.map(str::to_string)),
            start_error: None,
            step_delay: Duration::ZERO,
            visibility: Arc::new(RecordingVisibility::default()),
            requests: Vec::new(),
            verdicts: Vec::new(),
            started: 0,
            stopped: 0,
        }
    }

    /// Replays `steps` and then fails with `message`.
    pub fn failing_after(steps: Vec<StepOutput>, message: impl Into<String>) -> Self {
        let mut engine = Self::new(steps, None);
        engine.ending = Ending::Error(message.into());
        engine
    }

    /// Fails in `start` with `message`.
    pub fn failing_to_start(message: impl Into<String>) -> Self {
        let mut engine = Self::new(Vec::new(), None);
        engine.start_error = Some(message.into());
        engine
    }

    /// Sleeps before each step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Builds a step whose goal is `goal` and whose evaluation is `evaluation`.
    pub fn step(goal: &str, evaluation: &str) -> StepOutput {
        StepOutput {
            next_goal: Some(goal.to_string()),
            evaluation_previous_goal: Some(evaluation.to_string()),
            ..StepOutput::default()
        }
    }

    pub fn requests(&self) -> &[TaskRequest] {
        &self.requests
    }

    /// Verdicts returned by the callback, one per replayed step.
    pub fn verdicts(&self) -> &[StepVerdict] {
        &self.verdicts
    }

    pub fn visibility_calls(&self) -> Vec<bool> {
        self.visibility.calls()
    }

    pub fn start_count(&self) -> usize {
        self.started
    }

    pub fn stop_count(&self) -> usize {
        self.stopped
    }
}

#[async_trait]
impl AutomationEngine for ScriptedEngine {
    async fn start(&mut self) -> Result<(), EngineError> {
        self.started += 1;
        match &self.start_error {
            Some(message) => Err(EngineError::Failed(message.clone())),
            None => Ok(()),
        }
    }

    async fn run_task(
        &mut self,
        request: &TaskRequest,
        callback: &mut dyn StepCallback,
    ) -> Result<Option<String>, EngineError> {
        self.requests.push(request.clone());
        let mut budget = request.max_steps;

        for (index, output) in self.steps.iter().enumerate() {
            let step = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if step > budget {
                return Ok(None);
            }
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            let verdict = callback
                .on_step(output, step)
                .await
                .map_err(EngineError::Cancelled)?;
            budget = verdict.max_steps;
            self.verdicts.push(verdict);
        }

        match &self.ending {
            Ending::Result(result) => Ok(result.clone()),
            Ending::Error(message) => Err(EngineError::Failed(message.clone())),
        }
    }

    fn visibility(&self) -> Arc<dyn VisibilityControl> {
        self.visibility.clone()
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.stopped += 1;
        Ok(())
    }
}
