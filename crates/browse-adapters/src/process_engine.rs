//! Automation engine running as a child process.
//!
//! The engine command is spawned per task with stdin, stdout and stderr
//! piped. Commands are queued on a channel and written by a dedicated task,
//! so the visibility handle can send from inside a step callback while the
//! run loop is awaiting the next event. Stdout is read line by line as
//! [`EngineEvent`]s; stderr is drained into debug logs so a chatty engine
//! never fills its pipe buffer.

use crate::engine_stream::{EngineCommand, EngineEvent, EngineStreamParser};
use async_trait::async_trait;
use browse_proto::{
    AutomationEngine, EngineError, StepCallback, TaskRequest, VisibilityControl,
};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Failures of the process bridge itself, as opposed to task failures the
/// engine reports.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to start engine `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine did not report ready within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("engine closed its output before finishing")]
    Closed,

    #[error("engine {0} pipe unavailable")]
    MissingPipe(&'static str),

    #[error("engine input channel closed")]
    ChannelClosed,
}

impl From<BridgeError> for EngineError {
    fn from(err: BridgeError) -> Self {
        match err {
            // Spawn failures read as engine crashes to the user.
            BridgeError::Spawn { .. } => EngineError::Failed(err.to_string()),
            BridgeError::ChannelClosed => EngineError::NotStarted,
            other => EngineError::Protocol(other.to_string()),
        }
    }
}

/// How to launch the engine process.
#[derive(Debug, Clone)]
pub struct ProcessEngineConfig {
    pub command: String,
    pub args: Vec<String>,
    /// How long to wait for the `ready` event after spawning.
    pub ready_timeout: Duration,
    /// How long to wait for exit after `shutdown` before killing.
    pub shutdown_timeout: Duration,
}

impl ProcessEngineConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ready_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Sender slot shared between the engine and its visibility handles.
///
/// Empty while no process is running.
#[derive(Debug, Default)]
struct CommandChannel {
    sender: Mutex<Option<mpsc::UnboundedSender<EngineCommand>>>,
}

impl CommandChannel {
    fn send(&self, command: EngineCommand) -> Result<(), BridgeError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => tx.send(command).map_err(|_| BridgeError::ChannelClosed),
            None => Err(BridgeError::ChannelClosed),
        }
    }

    fn replace(&self, tx: Option<mpsc::UnboundedSender<EngineCommand>>) {
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = tx;
    }
}

/// Visibility handle that forwards changes as `visibility` commands.
#[derive(Debug)]
struct ProcessVisibility {
    channel: Arc<CommandChannel>,
}

impl VisibilityControl for ProcessVisibility {
    fn set_visible(&self, visible: bool) -> Result<(), EngineError> {
        self.channel
            .send(EngineCommand::Visibility { visible })
            .map_err(EngineError::from)
    }
}

/// An [`AutomationEngine`] speaking the bridge protocol over stdio.
#[derive(Debug)]
pub struct ProcessEngine {
    config: ProcessEngineConfig,
    channel: Arc<CommandChannel>,
    child: Option<Child>,
    events: Option<Lines<BufReader<ChildStdout>>>,
    writer: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<()>>,
}

impl ProcessEngine {
    pub fn new(config: ProcessEngineConfig) -> Self {
        Self {
            config,
            channel: Arc::new(CommandChannel::default()),
            child: None,
            events: None,
            writer: None,
            stderr_drain: None,
        }
    }

    /// Next protocol event, skipping noise. `None` at end of stream.
    async fn next_event(&mut self) -> Result<Option<EngineEvent>, EngineError> {
        let events = self.events.as_mut().ok_or(EngineError::NotStarted)?;
        while let Some(line) = events.next_line().await? {
            if let Some(event) = EngineStreamParser::parse_line(&line) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        loop {
            match self.next_event().await? {
                Some(EngineEvent::Ready) => return Ok(()),
                Some(EngineEvent::Error { message }) => return Err(EngineError::Failed(message)),
                Some(other) => debug!(?other, "Ignoring event before ready"),
                None => return Err(BridgeError::Closed.into()),
            }
        }
    }

    fn spawn_writer(
        mut stdin: tokio::process::ChildStdin,
        mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                let line = match command.to_line() {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode engine command");
                        continue;
                    }
                };
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    warn!(error = %e, "Failed to write to engine");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    warn!(error = %e, "Failed to flush engine input");
                    break;
                }
                if command == EngineCommand::Shutdown {
                    break;
                }
            }
        })
    }

    fn spawn_stderr_drain(stderr: tokio::process::ChildStderr) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "browse::engine", line = %line, "engine stderr");
            }
        })
    }
}

#[async_trait]
impl AutomationEngine for ProcessEngine {
    async fn start(&mut self) -> Result<(), EngineError> {
        if self.child.is_some() {
            return Ok(());
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            command = %self.config.command,
            args = ?self.config.args,
            "Spawning engine"
        );

        let mut child = command.spawn().map_err(|source| BridgeError::Spawn {
            command: self.config.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(BridgeError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(BridgeError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(BridgeError::MissingPipe("stderr"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.channel.replace(Some(tx));
        self.writer = Some(Self::spawn_writer(stdin, rx));
        self.stderr_drain = Some(Self::spawn_stderr_drain(stderr));
        self.events = Some(BufReader::new(stdout).lines());
        self.child = Some(child);

        let timeout = self.config.ready_timeout;
        match tokio::time::timeout(timeout, self.wait_ready()).await {
            Ok(Ok(())) => {
                info!(command = %self.config.command, "Engine ready");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::HandshakeTimeout(timeout).into()),
        }
    }

    async fn run_task(
        &mut self,
        request: &TaskRequest,
        callback: &mut dyn StepCallback,
    ) -> Result<Option<String>, EngineError> {
        self.channel.send(EngineCommand::RunTask {
            task: request.task.clone(),
            max_steps: request.max_steps,
            use_vision: request.use_vision,
            visible: request.visible,
            extend_system_message: request.extend_system_message.clone(),
        })?;

        loop {
            let Some(event) = self.next_event().await? else {
                return Err(BridgeError::Closed.into());
            };

            match event {
                EngineEvent::Step { step, output } => match callback.on_step(&output, step).await {
                    Ok(verdict) => self.channel.send(EngineCommand::Continue {
                        max_steps: verdict.max_steps,
                        choice: verdict.choice,
                    })?,
                    Err(interrupt) => {
                        debug!(step, %interrupt, "Cancelling engine task");
                        if let Err(e) = self.channel.send(EngineCommand::Cancel {
                            reason: interrupt.to_string(),
                        }) {
                            debug!(error = %e, "Cancel not delivered");
                        }
                        return Err(EngineError::Cancelled(interrupt));
                    }
                },
                EngineEvent::Done { result } => {
                    debug!(has_result = result.is_some(), "Engine task done");
                    return Ok(result);
                }
                EngineEvent::Error { message } => return Err(EngineError::Failed(message)),
                EngineEvent::Ready => debug!("Ignoring repeated ready"),
            }
        }
    }

    fn visibility(&self) -> Arc<dyn VisibilityControl> {
        Arc::new(ProcessVisibility {
            channel: self.channel.clone(),
        })
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        if let Err(e) = self.channel.send(EngineCommand::Shutdown) {
            debug!(error = %e, "Shutdown not delivered");
        }
        self.channel.replace(None);

        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.await
        {
            debug!(error = %e, "Engine writer task ended abnormally");
        }
        self.events = None;

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => debug!(?status, "Engine exited"),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!("Engine ignored shutdown, killing it");
                    child.kill().await?;
                }
            }
        }

        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        Ok(())
    }
}
