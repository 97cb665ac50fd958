//! Ctrl+C at an interactive prompt ends the process.

#![cfg(unix)]

use anyhow::Result;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Collects stdout until `needle` shows up or `timeout` passes.
fn wait_for_output(rx: &mpsc::Receiver<u8>, needle: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(byte) => {
                seen.push(byte);
                if String::from_utf8_lossy(&seen).contains(needle) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    String::from_utf8_lossy(&seen).into_owned()
}

#[test]
fn test_interrupt_at_prompt_exits() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let mut child = Command::new(env!("CARGO_BIN_EXE_browse"))
        .arg("--config")
        .arg(temp_dir.path().join("browse.yml"))
        .arg("--color")
        .arg("never")
        .current_dir(temp_dir.path())
        .env("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com")
        .env("AZURE_OPENAI_API_KEY", "test-key")
        .env("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o")
        .env("AZURE_OPENAI_API_VERSION", "2024-08-01-preview")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Held open so the prompt stays blocked on its read
    let _stdin = child.stdin.take();
    let mut stdout = child.stdout.take().expect("stdout is piped");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut byte = [0u8; 1];
        while let Ok(1) = stdout.read(&mut byte) {
            if tx.send(byte[0]).is_err() {
                break;
            }
        }
    });

    let before = wait_for_output(&rx, "Verbose mode?", Duration::from_secs(10));
    assert!(before.contains("Verbose mode?"), "no prompt shown: {before:?}");
    thread::sleep(Duration::from_millis(200));

    let status = Command::new("kill")
        .arg("-INT")
        .arg(child.id().to_string())
        .status()?;
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(5);
    let exit = loop {
        if let Some(exit) = child.try_wait()? {
            break Some(exit);
        }
        if Instant::now() >= deadline {
            break None;
        }
        thread::sleep(Duration::from_millis(50));
    };

    let Some(exit) = exit else {
        child.kill()?;
        panic!("browse was still running 5s after Ctrl+C");
    };
    assert!(exit.success());

    let after = wait_for_output(&rx, "Goodbye!", Duration::from_secs(2));
    assert!(after.contains("Goodbye!"), "no farewell: {after:?}");
    Ok(())
}
