//! Runs one synthesis command as a child process and checks its result.

use crate::command::SynthesisCommand;
use crate::error::SynthesisError;
use crate::file::EphemeralFile;
use crate::relay::{spawn_relay, ChildStream};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long to wait for the output relays after the child exits. A tool that
/// leaves a grandchild holding its pipes must not stall the request.
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of one child process.
///
/// `Idle → Spawned → Streaming → Exited(code) → Succeeded | Failed`.
/// `Failed` is also reachable from `Idle` (spawn error), `Spawned` (pipes
/// unavailable) and `Streaming` (timeout or wait error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    Spawned,
    Streaming,
    /// Exit status; `None` when the child was killed by a signal.
    Exited(Option<i32>),
    Succeeded,
    Failed,
}

impl InvocationState {
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, Spawned)
                | (Idle, Failed)
                | (Spawned, Streaming)
                | (Spawned, Failed)
                | (Streaming, Exited(_))
                | (Streaming, Failed)
                | (Exited(_), Succeeded)
                | (Exited(_), Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::Succeeded | InvocationState::Failed)
    }
}

/// Tracks and logs state transitions for one command.
struct Invocation<'a> {
    command: &'a SynthesisCommand,
    state: InvocationState,
}

impl<'a> Invocation<'a> {
    fn new(command: &'a SynthesisCommand) -> Self {
        Self {
            command,
            state: InvocationState::Idle,
        }
    }

    fn advance(&mut self, next: InvocationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            request_id = %self.command.request_id,
            program = %self.command.program,
            from = ?self.state,
            to = ?next,
            "synthesis state transition"
        );
        self.state = next;
    }

    fn fail(&mut self, error: SynthesisError) -> SynthesisError {
        self.advance(InvocationState::Failed);
        tracing::error!(
            request_id = %self.command.request_id,
            program = %self.command.program,
            args = ?self.command.args,
            output = %self.command.output_path.display(),
            kind = error.kind(),
            "synthesis failed: {}",
            error
        );
        error
    }
}

/// A generated audio file handed over to delivery.
///
/// The file is deleted when this value (or the [`EphemeralFile`] taken out of
/// it) is dropped.
#[derive(Debug)]
pub struct SynthesisOutput {
    file: EphemeralFile,
    size: u64,
}

impl SynthesisOutput {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size in bytes at the time synthesis finished. Always > 0.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_file(self) -> EphemeralFile {
        self.file
    }
}

/// Spawns synthesis commands with a wall-clock limit. No retries.
#[derive(Debug, Clone)]
pub struct SynthesisInvoker {
    timeout: Duration,
}

impl SynthesisInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `command` to completion.
    ///
    /// Succeeds only if the child exits with status 0 and leaves a non-empty
    /// file at `command.output_path`. Any partial output is deleted on
    /// failure. The child is killed if this future is dropped.
    ///
    /// # Errors
    ///
    /// `Spawn`, `NonZeroExit`, `MissingOutput`, `EmptyOutput`, `TimedOut` or
    /// `Io`, as described on [`SynthesisError`].
    pub async fn run(&self, command: SynthesisCommand) -> Result<SynthesisOutput, SynthesisError> {
        let mut invocation = Invocation::new(&command);
        let output = EphemeralFile::new(&command.output_path);

        tracing::info!(
            request_id = %command.request_id,
            program = %command.program,
            args = ?command.args,
            output = %command.output_path.display(),
            "spawning synthesis tool"
        );

        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return Err(invocation.fail(SynthesisError::Spawn {
                    program: command.program.clone(),
                    source: e,
                }))
            }
        };
        invocation.advance(InvocationState::Spawned);

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(invocation.fail(SynthesisError::Io {
                    program: command.program.clone(),
                    source: std::io::Error::other("child output pipes unavailable"),
                }))
            }
        };
        tracing::debug!(
            request_id = %command.request_id,
            pid = child.id(),
            "synthesis tool started"
        );
        let stdout_relay = spawn_relay(stdout, ChildStream::Stdout, command.program.clone());
        let stderr_relay = spawn_relay(stderr, ChildStream::Stderr, command.program.clone());
        invocation.advance(InvocationState::Streaming);

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout_relay.abort();
                stderr_relay.abort();
                return Err(invocation.fail(SynthesisError::Io {
                    program: command.program.clone(),
                    source: e,
                }));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        request_id = %command.request_id,
                        "failed to kill timed out synthesis tool: {}",
                        e
                    );
                }
                stdout_relay.abort();
                stderr_relay.abort();
                return Err(invocation.fail(SynthesisError::TimedOut {
                    program: command.program.clone(),
                    secs: self.timeout.as_secs(),
                }));
            }
        };

        let stdout_tail = collect_relay(stdout_relay).await;
        let stderr_tail = collect_relay(stderr_relay).await;
        invocation.advance(InvocationState::Exited(status.code()));

        if !status.success() {
            let output_tail = if stderr_tail.is_empty() {
                stdout_tail
            } else {
                stderr_tail
            };
            return Err(invocation.fail(SynthesisError::NonZeroExit {
                program: command.program.clone(),
                code: status.code(),
                output_tail,
            }));
        }

        let size = match tokio::fs::metadata(output.path()).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                return Err(invocation.fail(SynthesisError::MissingOutput {
                    program: command.program.clone(),
                    path: command.output_path.clone(),
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(invocation.fail(SynthesisError::MissingOutput {
                    program: command.program.clone(),
                    path: command.output_path.clone(),
                }))
            }
            Err(e) => {
                return Err(invocation.fail(SynthesisError::Io {
                    program: command.program.clone(),
                    source: e,
                }))
            }
        };
        if size == 0 {
            return Err(invocation.fail(SynthesisError::EmptyOutput {
                program: command.program.clone(),
                path: command.output_path.clone(),
            }));
        }

        invocation.advance(InvocationState::Succeeded);
        tracing::info!(
            request_id = %command.request_id,
            size_bytes = size,
            "synthesis succeeded"
        );

        Ok(SynthesisOutput { file: output, size })
    }
}

async fn collect_relay(mut relay: JoinHandle<String>) -> String {
    match tokio::time::timeout(RELAY_DRAIN_TIMEOUT, &mut relay).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(e)) => {
            tracing::warn!("output relay task failed: {}", e);
            String::new()
        }
        Err(_) => {
            relay.abort();
            String::new()
        }
    }
}
