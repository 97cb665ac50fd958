//! Shared terminal plumbing: line output that is safe in raw mode, blocking
//! line input off the async runtime, and the lock that hands stdin between
//! the key listener and prompts.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Held by whoever is reading stdin. The key listener holds it while raw
/// mode is on; prompts hold it while waiting for a line.
pub type TerminalLock = Arc<Mutex<()>>;

pub fn terminal_lock() -> TerminalLock {
    Arc::new(Mutex::new(()))
}

/// Stream that user-facing text goes to.
///
/// One-shot JSON runs send everything to stderr so stdout carries only the
/// report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Output {
    #[default]
    Stdout,
    Stderr,
}

impl Output {
    /// Writes a line. Uses `\r\n` so output stays aligned while the listener
    /// has the terminal in raw mode.
    pub fn line(self, text: &str) {
        self.write(&format!("{text}\r\n"));
    }

    /// Writes text without a newline, for prompts.
    pub fn inline(self, text: &str) {
        self.write(text);
    }

    fn write(self, text: &str) {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Self::Stderr => {
                let mut out = io::stderr().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
        }
    }
}

/// Reads one line from stdin on the blocking pool.
///
/// Returns `None` at end of input or on a read error. The trailing newline
/// is stripped.
pub async fn read_line() -> Option<String> {
    let result = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                debug!(error = %e, "stdin read failed");
                None
            }
        }
    })
    .await;

    result.unwrap_or_else(|e| {
        debug!(error = %e, "stdin reader task failed");
        None
    })
}
