//! Realtime process lifecycle.
//!
//! A [`Session`] owns one engine process and moves one way through
//! `NotStarted → Running → Stopped`. The stdout pipe is drained by a reader
//! thread that parses event lines into a channel; the stderr pipe is
//! relayed to the log. Killing the engine is the normal way to end it, so a
//! signal death counts as a clean exit.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command as ProcessCommand, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::protocol::{Command, EngineEvent};
use crate::{EngineError, Result};

/// A running engine's pipes and channel.
struct EngineHandle {
    child: Child,
    stdin: ChildStdin,
    events: mpsc::Receiver<EngineEvent>,
}

enum SessionState {
    NotStarted,
    Running(EngineHandle),
    /// Killed or exited, but not yet reaped.
    Stopped(Child),
    Finished,
}

/// One realtime process, from spawn to reaped exit status.
pub struct Session {
    binary: PathBuf,
    state: SessionState,
}

impl Session {
    /// Creates a session for the given engine binary without starting it.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            state: SessionState::NotStarted,
        }
    }

    /// Spawns the engine process and its pipe reader threads.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, SessionState::NotStarted) {
            return Err(EngineError::InvalidState {
                operation: "start",
            });
        }

        let mut child = ProcessCommand::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // The pipes are always present right after a piped spawn.
        let stdin = child.stdin.take().ok_or(EngineError::InvalidState {
            operation: "start",
        })?;
        let stdout = child.stdout.take().ok_or(EngineError::InvalidState {
            operation: "start",
        })?;
        let stderr = child.stderr.take().ok_or(EngineError::InvalidState {
            operation: "start",
        })?;

        let (sender, events) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                match serde_json::from_str::<EngineEvent>(&line) {
                    Ok(event) => {
                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, line, "dropping unparseable engine event");
                    }
                }
            }
        });
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                tracing::warn!(engine = %line, "engine stderr");
            }
        });

        tracing::info!(binary = %self.binary.display(), "started engine process");
        self.state = SessionState::Running(EngineHandle {
            child,
            stdin,
            events,
        });
        Ok(())
    }

    /// Sends one command line to the engine.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let SessionState::Running(handle) = &mut self.state else {
            return Err(EngineError::InvalidState { operation: "send" });
        };
        writeln!(handle.stdin, "{command}")?;
        handle.stdin.flush()?;
        Ok(())
    }

    /// Waits up to `timeout` for the next engine event.
    pub fn wait_event(&mut self, timeout: Duration) -> Result<Option<EngineEvent>> {
        let SessionState::Running(handle) = &mut self.state else {
            return Err(EngineError::InvalidState {
                operation: "wait_event",
            });
        };
        match handle.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout | mpsc::RecvTimeoutError::Disconnected) => {
                Ok(None)
            }
        }
    }

    /// Returns the next engine event without blocking.
    pub fn poll_event(&mut self) -> Result<Option<EngineEvent>> {
        let SessionState::Running(handle) = &mut self.state else {
            return Err(EngineError::InvalidState {
                operation: "poll_event",
            });
        };
        match handle.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::TryRecvError::Empty | mpsc::TryRecvError::Disconnected) => Ok(None),
        }
    }

    /// Kills the engine process. Closing stdin alone is not enough: the
    /// engine sleeps forever by design.
    pub fn stop(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Finished) {
            SessionState::Running(handle) => {
                let mut child = handle.child;
                match child.kill() {
                    Ok(()) => {}
                    // Already exited on its own; wait_for_exit judges the status.
                    Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {}
                    Err(err) => return Err(err.into()),
                }
                self.state = SessionState::Stopped(child);
                Ok(())
            }
            other => {
                self.state = other;
                Err(EngineError::InvalidState { operation: "stop" })
            }
        }
    }

    /// Reaps the process. Success is exit code 0 or death by signal (the
    /// usual result of [`stop`](Self::stop)); any other code is an error.
    pub fn wait_for_exit(&mut self) -> Result<()> {
        let (SessionState::Running(EngineHandle { child, .. })
        | SessionState::Stopped(child)) = &mut self.state
        else {
            return Err(EngineError::InvalidState {
                operation: "wait_for_exit",
            });
        };

        let status = child.wait()?;
        self.state = SessionState::Finished;
        match status.code() {
            Some(0) | None => Ok(()),
            Some(code) => Err(EngineError::EngineExited { code }),
        }
    }
}

/// Replaces a running session with a fresh one for `binary`.
///
/// The old engine is fully stopped and reaped before the new one spawns:
/// two realtime processes must never contend for the JACK output at once.
pub fn swap(old: &mut Session, binary: impl Into<PathBuf>) -> Result<Session> {
    old.stop()?;
    old.wait_for_exit()?;

    let mut next = Session::new(binary);
    next.start()?;
    Ok(next)
}
