//! # browse-core
//!
//! Supervision logic for a human-in-the-loop browser automation session.
//!
//! This crate provides:
//! - The per-step run controller and whole-task runner
//! - Shared control flags for the key listener and the run loop
//! - Heuristic detectors for phases, hedging, failures, and repetition
//! - Intervention prompts and their handlers
//! - Session history, context prompts, and markdown export
//! - Configuration loading and error guidance

mod clarify;
mod config;
mod control;
mod detectors;
mod guidance;
mod intervention;
mod reporter;
mod run_control;
mod session;
mod status;
mod summary;
pub mod testing;

pub use clarify::{
    append_answers, ask_clarifying_questions, build_questions_prompt, parse_questions,
};
pub use config::{
    BrowseConfig, ConfigError, ENV_API_KEY, ENV_API_VERSION, ENV_DEPLOYMENT, ENV_ENDPOINT,
    ENV_ENGINE_COMMAND, EngineConfig, ProviderConfig, RunConfig, SessionConfig,
};
pub use control::{ControlFlags, ControlState};
pub use detectors::{
    Phase, classify_phase, is_completion, is_failure, is_hedging, is_repetitive, word_similarity,
};
pub use guidance::ErrorCategory;
pub use intervention::{
    InterventionKind, InterventionRequest, InterventionResponse, NONE_OF_THESE, Prompter,
    SKIP_STEP_INSTRUCTION, WRAP_UP_INSTRUCTION, handle_intervention, run_intervention,
};
pub use reporter::{NoticeLevel, RunReporter};
pub use run_control::{
    JsonReport, OutcomeKind, RunController, RunEnd, RunOutcome, RunRequest, RunState,
    STRATEGY_VARIATION_PROMPT, TaskRunner,
};
pub use session::{Session, TaskRecord};
pub use status::{format_duration, format_step_status};
pub use summary::{TaskSummary, build_summary_prompt, parse_summary_response, summarize};
