//! Single-key shortcuts while a task runs.
//!
//! [`map_key`] and [`apply_command`] are pure so they can be tested without
//! a terminal. [`InputListener`] owns the background task that reads keys in
//! raw mode and steps aside whenever an intervention prompt needs stdin.

use crate::terminal::{Output, TerminalLock};
use browse_core::ControlState;
use colored::Colorize;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use scopeguard::defer;
use std::io;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shortcut actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleVisibility,
    ToggleVerbose,
    ToggleVision,
    Instruct,
    TogglePause,
    Quit,
}

/// Maps a key press to a shortcut. Letters are case-insensitive; Ctrl+C quits.
pub fn map_key(key: KeyEvent) -> Option<KeyCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c' | 'C') => Some(KeyCommand::Quit),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'b' => Some(KeyCommand::ToggleVisibility),
            'v' => Some(KeyCommand::ToggleVerbose),
            'f' => Some(KeyCommand::ToggleVision),
            'i' => Some(KeyCommand::Instruct),
            'p' => Some(KeyCommand::TogglePause),
            'q' => Some(KeyCommand::Quit),
            _ => None,
        },
        _ => None,
    }
}

/// Applies a shortcut to the control state.
///
/// Returns the feedback line to show, if any. `Instruct` only pauses; the
/// listener collects the text.
pub fn apply_command(control: &ControlState, command: KeyCommand) -> Option<String> {
    match command {
        KeyCommand::ToggleVisibility => {
            let visible = control.toggle_visibility();
            Some(format!("Browser: {}", if visible { "visible" } else { "hidden" }))
        }
        KeyCommand::ToggleVerbose => {
            let verbose = control.toggle_verbose();
            Some(format!("Verbose: {}", if verbose { "on" } else { "off" }))
        }
        KeyCommand::ToggleVision => {
            let vision = control.toggle_vision();
            Some(format!(
                "Vision mode: {} (applies from the next task)",
                if vision { "on" } else { "off" }
            ))
        }
        KeyCommand::Instruct => {
            control.begin_instruction();
            None
        }
        KeyCommand::TogglePause => {
            let paused = control.toggle_pause();
            Some(format!("Agent {}", if paused { "paused" } else { "resumed" }))
        }
        KeyCommand::Quit => {
            control.request_quit();
            Some("Quitting after the current step...".to_string())
        }
    }
}

/// Why a listening window closed.
enum WindowEnd {
    Key(KeyEvent),
    Suspended,
    Shutdown,
}

/// Background key listener for one task.
pub struct InputListener {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl InputListener {
    /// Starts listening. Must be called from inside a Tokio runtime.
    pub fn spawn(control: ControlState, terminal: TerminalLock) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listen(control, terminal, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Stops the listener and waits for it to release the terminal.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Key listener ended abnormally");
        }
    }
}

async fn listen(control: ControlState, terminal: TerminalLock, mut shutdown: watch::Receiver<bool>) {
    debug!("Key listener started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        if control.is_intervention_active() {
            if !wait_for_terminal(&control, &mut shutdown).await {
                break;
            }
            continue;
        }

        let end = {
            let _owner = terminal.lock().await;
            listen_window(&control, &mut shutdown).await
        };

        match end {
            Ok(WindowEnd::Key(key)) => {
                let Some(command) = map_key(key) else {
                    continue;
                };
                debug!(?command, "Shortcut pressed");
                if let Some(feedback) = apply_command(&control, command) {
                    Output::Stdout.line(&feedback.dimmed().to_string());
                }
                if command == KeyCommand::Instruct
                    && let Err(e) = collect_instruction(&control, &terminal, &mut shutdown).await
                {
                    warn!(error = %e, "Key listener stopped: terminal input unavailable");
                    break;
                }
            }
            Ok(WindowEnd::Suspended) => {}
            Ok(WindowEnd::Shutdown) => break,
            Err(e) => {
                warn!(error = %e, "Key listener stopped: terminal input unavailable");
                break;
            }
        }
    }
    debug!("Key listener stopped");
}

/// Reads keys in raw mode until a key arrives, an intervention takes the
/// terminal, or shutdown is signalled. Raw mode is restored on every exit.
async fn listen_window(
    control: &ControlState,
    shutdown: &mut watch::Receiver<bool>,
) -> io::Result<WindowEnd> {
    let mut flags = control.subscribe();
    if control.is_intervention_active() {
        return Ok(WindowEnd::Suspended);
    }

    crossterm::terminal::enable_raw_mode()?;
    defer! {
        let _ = crossterm::terminal::disable_raw_mode();
    }
    let mut events = EventStream::new();

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    return Ok(WindowEnd::Key(key));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(WindowEnd::Shutdown),
            },
            changed = flags.changed() => {
                if changed.is_err() || control.is_intervention_active() {
                    return Ok(WindowEnd::Suspended);
                }
            }
            _ = shutdown.changed() => return Ok(WindowEnd::Shutdown),
        }
    }
}

/// Waits while an intervention owns the terminal. Returns `false` on shutdown.
async fn wait_for_terminal(control: &ControlState, shutdown: &mut watch::Receiver<bool>) -> bool {
    let mut flags = control.subscribe();
    while control.is_intervention_active() {
        tokio::select! {
            changed = flags.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = shutdown.changed() => return false,
        }
    }
    true
}

/// Reads an instruction line and resumes the run. An abandoned line resumes
/// without an instruction.
async fn collect_instruction(
    control: &ControlState,
    terminal: &TerminalLock,
    shutdown: &mut watch::Receiver<bool>,
) -> io::Result<()> {
    let _owner = terminal.lock().await;
    Output::Stdout.inline(&format!("{} ", "Instruction>".cyan().bold()));

    let result = read_instruction_raw(shutdown).await;
    let text = match &result {
        Ok(text) => text.clone(),
        Err(_) => None,
    };
    control.submit_instruction(text);
    result.map(drop)
}

async fn read_instruction_raw(shutdown: &mut watch::Receiver<bool>) -> io::Result<Option<String>> {
    crossterm::terminal::enable_raw_mode()?;
    defer! {
        let _ = crossterm::terminal::disable_raw_mode();
    }
    let mut events = EventStream::new();
    read_instruction(&mut events, shutdown, Output::Stdout).await
}

/// What a key does to the instruction line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEdit {
    Push(char),
    Erase,
    Submit,
    Cancel,
    Ignore,
}

fn line_edit(key: KeyEvent) -> LineEdit {
    if key.kind != KeyEventKind::Press {
        return LineEdit::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c' | 'C') => LineEdit::Cancel,
            _ => LineEdit::Ignore,
        };
    }

    match key.code {
        KeyCode::Char(c) => LineEdit::Push(c),
        KeyCode::Backspace => LineEdit::Erase,
        KeyCode::Enter => LineEdit::Submit,
        KeyCode::Esc => LineEdit::Cancel,
        _ => LineEdit::Ignore,
    }
}

/// Edits a line from key events, echoing to `echo`.
///
/// Returns the line on Enter and `None` on Esc, Ctrl+C, end of events, or
/// shutdown.
async fn read_instruction<S>(
    events: &mut S,
    shutdown: &mut watch::Receiver<bool>,
    echo: Output,
) -> io::Result<Option<String>>
where
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    let mut line = String::new();
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => match line_edit(key) {
                    LineEdit::Push(c) => {
                        line.push(c);
                        echo.inline(c.encode_utf8(&mut [0; 4]));
                    }
                    LineEdit::Erase => {
                        if line.pop().is_some() {
                            echo.inline("\x08 \x08");
                        }
                    }
                    LineEdit::Submit => {
                        echo.line("");
                        return Ok(Some(line));
                    }
                    LineEdit::Cancel => {
                        echo.line("");
                        return Ok(None);
                    }
                    LineEdit::Ignore => {}
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    echo.line("");
                    return Ok(None);
                }
            },
            _ = shutdown.changed() => {
                echo.line("");
                debug!("Instruction abandoned at shutdown");
                return Ok(None);
            }
        }
    }
}
