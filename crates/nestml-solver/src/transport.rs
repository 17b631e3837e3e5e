//! Solver transport: "model as a sum-typed transport (`Available(proc) |
//! Unavailable`)" per this workspace's design notes — [`Transport`] is that
//! sum type, so the driver never has to special-case "no solver configured"
//! against "solver process failed"; both collapse to the same
//! [`TransportError::Unavailable`] path.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{SolverReply, SolverRequest};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no solver process is configured for this pipeline run")]
    Unavailable,

    #[error("failed to spawn solver process: {0}")]
    Spawn(String),

    #[error("solver request could not be encoded: {0}")]
    Encode(String),

    #[error("I/O error communicating with solver process: {0}")]
    Io(String),

    #[error("solver did not reply within the configured timeout")]
    Timeout,

    #[error("solver reply could not be parsed: {0}")]
    MalformedReply(String),
}

/// Anything capable of answering a [`SolverRequest`]. Implemented by
/// [`Transport`] for real use and by a stub in tests so the driver's
/// fold-back logic can be exercised without a solver binary on `PATH`.
pub trait SolverTransport {
    fn solve(&self, request: &SolverRequest, timeout: Duration) -> Result<SolverReply, TransportError>;
}

/// Talks to a solver subprocess over JSON-over-pipe (spec.md §6:
/// "conventionally JSON-over-pipe"): the request is written to the child's
/// stdin, and its stdout is read to EOF and parsed as a [`SolverReply`].
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl ProcessTransport {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl SolverTransport for ProcessTransport {
    fn solve(&self, request: &SolverRequest, timeout: Duration) -> Result<SolverReply, TransportError> {
        let payload = serde_json::to_vec(request).map_err(|e| TransportError::Encode(e.to_string()))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        let mut stdout = child.stdout.take().expect("piped stdout");

        let writer = thread::spawn(move || stdin.write_all(&payload));

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let outcome = rx.recv_timeout(timeout);
        let _ = writer.join();

        match outcome {
            Ok(Ok(buf)) => {
                let _ = child.wait();
                serde_json::from_slice::<SolverReply>(&buf).map_err(|e| TransportError::MalformedReply(e.to_string()))
            }
            Ok(Err(io_err)) => {
                let _ = child.kill();
                Err(TransportError::Io(io_err.to_string()))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(TransportError::Timeout)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TransportError::Io("solver stdout pipe closed unexpectedly".into())),
        }
    }
}

/// The sum-typed transport the orchestrator actually holds. `Unavailable`
/// covers both "no `--solver-command` configured" and "process vanished
/// mid-run" — either way the driver demotes to numeric mode with a WARN.
pub enum Transport {
    Available(ProcessTransport),
    Unavailable,
}

impl Transport {
    pub fn configured(command: Option<PathBuf>) -> Self {
        match command {
            Some(path) => Transport::Available(ProcessTransport::new(path)),
            None => Transport::Unavailable,
        }
    }
}

impl SolverTransport for Transport {
    fn solve(&self, request: &SolverRequest, timeout: Duration) -> Result<SolverReply, TransportError> {
        match self {
            Transport::Available(process) => process.solve(request, timeout),
            Transport::Unavailable => Err(TransportError::Unavailable),
        }
    }
}
