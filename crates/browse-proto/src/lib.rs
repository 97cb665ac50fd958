//! # browse-proto
//!
//! Shared types, error definitions, and traits for Browse.
//!
//! This crate provides the seams between the supervisor and its external
//! collaborators:
//! - `StepOutput` and `EngineSignal` describing one engine step
//! - `AutomationEngine`, `StepCallback`, and `VisibilityControl` for the engine
//! - `LanguageModel` for summaries and clarifying questions
//! - Common error types

mod engine;
mod error;
mod model;
mod step;

pub use engine::{AutomationEngine, StepCallback, StepVerdict, TaskRequest, VisibilityControl};
pub use error::{EngineError, ModelError, StepInterrupt};
pub use model::LanguageModel;
pub use step::{EngineSignal, FALLBACK_DESCRIPTION, StepAction, StepOutput};
