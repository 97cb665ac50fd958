//! Test doubles for deterministic run-loop tests.
//!
//! Everything here is scripted up front and records what it saw, so tests
//! can drive a full task without an engine process, a model endpoint, or a
//! terminal.

#[cfg(test)]
pub(crate) mod log_capture;
mod mock_model;
mod recording_reporter;
mod scripted_engine;
mod scripted_prompter;

pub use mock_model::MockModel;
pub use recording_reporter::RecordingReporter;
pub use scripted_engine::{RecordingVisibility, ScriptedEngine};
pub use scripted_prompter::ScriptedPrompter;
