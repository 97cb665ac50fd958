//! # browse-tui
//!
//! Terminal front end for Browse.
//!
//! This crate provides:
//! - The key listener that maps single-key shortcuts onto the control state
//! - `TerminalPrompter`, answering intervention prompts on stdin
//! - `ConsoleReporter` and `ResultFormatter` for live and final output
//! - The shortcut bar shown under each step

mod display;
mod footer;
mod input;
mod prompt;
mod terminal;

pub use display::{
    CompletionMenu, ConsoleReporter, NOT_STARTED_MESSAGE, NextAction, ResultFormatter, Spinner,
    WaitingModel, error_lines, render_session_summary,
};
pub use footer::shortcut_bar;
pub use input::{InputListener, KeyCommand, apply_command, map_key};
pub use prompt::{TerminalPrompter, parse_yes_no};
pub use terminal::{Output, TerminalLock, read_line, terminal_lock};
