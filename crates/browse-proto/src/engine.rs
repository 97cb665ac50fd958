//! The automation engine seam.
//!
//! An engine executes a task one step at a time against a remote target and
//! hands every step to a [`StepCallback`] before moving on. The callback is
//! where the supervisor pauses, prompts the human, or cancels the run.

use crate::error::{EngineError, StepInterrupt};
use crate::step::StepOutput;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything the engine needs to run one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    /// Full task text, including any session context prefix.
    pub task: String,
    /// Initial step budget. The callback may raise it mid-run.
    pub max_steps: u32,
    /// Use the visually-grounded mode.
    pub use_vision: bool,
    /// Whether the target UI starts visible.
    pub visible: bool,
    /// Extra guidance appended to the engine's system message.
    pub extend_system_message: Option<String>,
}

/// The callback's answer for a step that may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepVerdict {
    /// Current step budget. Larger than the request's when the user extended it.
    pub max_steps: u32,
    /// 0-based option picked in answer to an engine `Choice` signal.
    pub choice: Option<usize>,
}

/// Invoked by the engine after it computes each step.
#[async_trait]
pub trait StepCallback: Send {
    /// Inspects a step. Returning `Err` cancels the run; the engine must stop
    /// and report [`EngineError::Cancelled`].
    async fn on_step(&mut self, output: &StepOutput, step: u32)
    -> Result<StepVerdict, StepInterrupt>;
}

/// Side channel for showing or hiding the target's UI while a task runs.
pub trait VisibilityControl: Send + Sync {
    fn set_visible(&self, visible: bool) -> Result<(), EngineError>;
}

/// An external engine that drives a remote target step by step.
#[async_trait]
pub trait AutomationEngine: Send {
    /// Brings the engine up. Called before every task.
    async fn start(&mut self) -> Result<(), EngineError>;

    /// Runs a task to completion, calling `callback` after every step.
    ///
    /// Returns the engine's final result text, if it produced one.
    async fn run_task(
        &mut self,
        request: &TaskRequest,
        callback: &mut dyn StepCallback,
    ) -> Result<Option<String>, EngineError>;

    /// Handle for toggling visibility from inside a step callback.
    fn visibility(&self) -> Arc<dyn VisibilityControl>;

    /// Shuts the engine down. Safe to call more than once.
    async fn stop(&mut self) -> Result<(), EngineError>;
}
