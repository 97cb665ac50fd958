//! Shared control flags between the key listener and the run loop.
//!
//! Every mutation goes through a `watch` channel so waiters (the pause wait,
//! the listener's suspend check) wake on change instead of polling.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Snapshot of the control flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlags {
    /// A task is being driven.
    pub running: bool,
    /// The run loop must block before the next step.
    pub paused: bool,
    /// Human text queued for the next step.
    pub pending_instruction: Option<String>,
    /// Abort requested. Only `begin_run` clears it.
    pub quit_requested: bool,
    /// Desired visibility of the target's UI.
    pub browser_visible: bool,
    /// Show detailed step logs.
    pub verbose: bool,
    /// Use the visually-grounded engine mode.
    pub vision_enabled: bool,
    /// An intervention prompt owns the terminal.
    pub intervention_active: bool,
}

/// Process-wide control state. Cheap to clone; all clones share one channel.
#[derive(Debug, Clone)]
pub struct ControlState {
    tx: Arc<watch::Sender<ControlFlags>>,
}

impl ControlState {
    pub fn new(initial: ControlFlags) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Returns a copy of the current flags.
    pub fn snapshot(&self) -> ControlFlags {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<ControlFlags> {
        self.tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.tx.borrow().running
    }

    pub fn is_paused(&self) -> bool {
        self.tx.borrow().paused
    }

    pub fn is_quit_requested(&self) -> bool {
        self.tx.borrow().quit_requested
    }

    pub fn is_intervention_active(&self) -> bool {
        self.tx.borrow().intervention_active
    }

    pub fn browser_visible(&self) -> bool {
        self.tx.borrow().browser_visible
    }

    pub fn verbose(&self) -> bool {
        self.tx.borrow().verbose
    }

    pub fn vision_enabled(&self) -> bool {
        self.tx.borrow().vision_enabled
    }

    /// Marks a task as running and clears per-run flags.
    pub fn begin_run(&self) {
        self.tx.send_modify(|f| {
            f.running = true;
            f.paused = false;
            f.quit_requested = false;
            f.pending_instruction = None;
            f.intervention_active = false;
        });
    }

    pub fn end_run(&self) {
        self.tx.send_modify(|f| {
            f.running = false;
            f.paused = false;
        });
    }

    pub fn request_quit(&self) {
        debug!("Quit requested");
        self.tx.send_modify(|f| f.quit_requested = true);
    }

    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.tx.send_modify(|f| {
            f.paused = !f.paused;
            paused = f.paused;
        });
        paused
    }

    pub fn toggle_visibility(&self) -> bool {
        let mut visible = false;
        self.tx.send_modify(|f| {
            f.browser_visible = !f.browser_visible;
            visible = f.browser_visible;
        });
        visible
    }

    pub fn toggle_verbose(&self) -> bool {
        let mut verbose = false;
        self.tx.send_modify(|f| {
            f.verbose = !f.verbose;
            verbose = f.verbose;
        });
        verbose
    }

    pub fn toggle_vision(&self) -> bool {
        let mut vision = false;
        self.tx.send_modify(|f| {
            f.vision_enabled = !f.vision_enabled;
            vision = f.vision_enabled;
        });
        vision
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.tx.send_modify(|f| f.verbose = verbose);
    }

    pub fn set_vision_enabled(&self, enabled: bool) {
        self.tx.send_modify(|f| f.vision_enabled = enabled);
    }

    pub fn set_browser_visible(&self, visible: bool) {
        self.tx.send_modify(|f| f.browser_visible = visible);
    }

    pub fn set_intervention_active(&self, active: bool) {
        self.tx.send_modify(|f| f.intervention_active = active);
    }

    /// Pauses the run so the user can type an instruction.
    pub fn begin_instruction(&self) {
        self.tx.send_modify(|f| f.paused = true);
    }

    /// Queues `text` (when non-blank) and resumes the run.
    pub fn submit_instruction(&self, text: Option<String>) {
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self.tx.send_modify(|f| {
            if text.is_some() {
                f.pending_instruction = text;
            }
            f.paused = false;
        });
    }

    /// Removes and returns the queued instruction.
    pub fn take_instruction(&self) -> Option<String> {
        let mut taken = None;
        self.tx.send_if_modified(|f| {
            taken = f.pending_instruction.take();
            taken.is_some()
        });
        taken
    }

    /// Blocks while paused. Returns `false` if quit was requested.
    pub async fn wait_while_paused(&self) -> bool {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|f| !f.paused || f.quit_requested).await {
            Ok(flags) => !flags.quit_requested,
            Err(_) => false,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(ControlFlags::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_toggles_flip_and_report_new_value() {
        let state = ControlState::default();
        assert!(state.toggle_visibility());
        assert!(state.browser_visible());
        assert!(!state.toggle_visibility());
        assert!(state.toggle_verbose());
        assert!(state.toggle_vision());
        assert!(state.toggle_pause());
        assert!(state.is_paused());
    }

    #[test]
    fn test_begin_run_clears_quit_and_instruction() {
        let state = ControlState::default();
        state.submit_instruction(Some("look at reviews".to_string()));
        state.request_quit();
        state.begin_run();

        let flags = state.snapshot();
        assert!(flags.running);
        assert!(!flags.quit_requested);
        assert!(flags.pending_instruction.is_none());
    }

    #[test]
    fn test_end_run_keeps_quit_flag() {
        let state = ControlState::default();
        state.begin_run();
        state.request_quit();
        state.end_run();
        assert!(!state.is_running());
        assert!(state.is_quit_requested());
    }

    #[test]
    fn test_instruction_round_trip() {
        let state = ControlState::default();
        state.begin_instruction();
        assert!(state.is_paused());

        state.submit_instruction(Some("  only 4 stars and up  ".to_string()));
        assert!(!state.is_paused());
        assert_eq!(state.take_instruction().as_deref(), Some("only 4 stars and up"));
        assert_eq!(state.take_instruction(), None);
    }

    #[test]
    fn test_blank_instruction_is_dropped_but_resumes() {
        let state = ControlState::default();
        state.begin_instruction();
        state.submit_instruction(Some("   ".to_string()));
        assert!(!state.is_paused());
        assert_eq!(state.take_instruction(), None);
    }

    #[tokio::test]
    async fn test_wait_while_paused_wakes_on_resume() {
        let state = ControlState::default();
        state.toggle_pause();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_while_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        state.toggle_pause();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_while_paused_returns_false_on_quit() {
        let state = ControlState::default();
        state.toggle_pause();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_while_paused().await })
        };
        state.request_quit();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_while_paused_returns_immediately_when_running() {
        let state = ControlState::default();
        assert!(state.wait_while_paused().await);
    }
}
