//! Key presses flowing through the control state into the shortcut bar.

use browse_core::ControlState;
use browse_tui::{KeyCommand, apply_command, map_key, shortcut_bar};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

fn press(control: &ControlState, c: char) -> Option<String> {
    let command = map_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))?;
    apply_command(control, command)
}

#[test]
fn test_bar_follows_toggles() {
    let control = ControlState::default();

    press(&control, 'b');
    press(&control, 'V');
    press(&control, 'p');

    let bar = shortcut_bar(&control.snapshot());
    assert!(bar.contains("[B] Minimise browser"));
    assert!(bar.contains("[V] Less detail"));
    assert!(bar.contains("[P] Resume"));
    assert!(bar.contains("[F] Enable vision"));
}

#[test]
fn test_vision_toggle_reports_deferred_effect() {
    let control = ControlState::default();
    let feedback = press(&control, 'f').unwrap();
    assert!(feedback.starts_with("Vision mode: on"));
    assert!(control.vision_enabled());
    assert!(shortcut_bar(&control.snapshot()).contains("[F] Disable vision"));
}

#[test]
fn test_pause_round_trip() {
    let control = ControlState::default();
    assert_eq!(press(&control, 'p').as_deref(), Some("Agent paused"));
    assert_eq!(press(&control, 'p').as_deref(), Some("Agent resumed"));
    assert!(!control.is_paused());
}

#[test]
fn test_quit_is_sticky() {
    let control = ControlState::default();
    assert_eq!(
        map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        Some(KeyCommand::Quit)
    );
    press(&control, 'q');
    press(&control, 'p');
    assert!(control.is_quit_requested());
}
