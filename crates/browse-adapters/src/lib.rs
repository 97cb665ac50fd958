//! # browse-adapters
//!
//! Concrete implementations of the `browse-proto` traits:
//! - `AzureOpenAiModel`: chat completions against an Azure OpenAI deployment
//! - `ProcessEngine`: an automation engine running as a child process,
//!   driven over newline-delimited JSON on stdin/stdout
//!
//! The bridge protocol types live in `engine_stream` so other engine
//! implementations and tests can speak the same wire format.

mod azure_openai;
mod engine_stream;
mod process_engine;

pub use azure_openai::AzureOpenAiModel;
pub use engine_stream::{EngineCommand, EngineEvent, EngineStreamParser};
pub use process_engine::{BridgeError, ProcessEngine, ProcessEngineConfig};
