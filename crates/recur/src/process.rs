//! Child process execution and failure classification
//!
//! Running the child is the operation the retry executor wraps. Both the
//! blocking (duct) and async (tokio) paths capture stderr so it can be
//! classified, then forward it to our own stderr.

use std::io::{self, Write};
use std::process::{ExitStatus, Stdio};

use recur_core::retry::RetryPredicate;
use thiserror::Error;

/// A failed child process run
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be started
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program exited with a non-zero status
    #[error("`{program}` exited with status {code}{}", stderr_suffix(.stderr))]
    Exited {
        program: String,
        code: i32,
        stderr: String,
    },

    /// The program was terminated by a signal
    #[error("`{program}` was terminated by a signal")]
    Terminated { program: String },
}

impl CommandError {
    /// Exit code to propagate from recur itself
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => 127,
            CommandError::Spawn { .. } => 126,
            CommandError::Exited { code, .. } => *code,
            CommandError::Terminated { .. } => 128,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => format!(": {}", line.trim()),
        None => String::new(),
    }
}

/// Run a command to completion, blocking the current thread
pub fn run_blocking(program: &str, args: &[String]) -> Result<(), CommandError> {
    let output = duct::cmd(program, args)
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    forward_stderr(&output.stderr);
    check_status(program, output.status, &output.stderr)
}

/// Run a command to completion without blocking a worker thread
pub async fn run_async(program: &str, args: &[String]) -> Result<(), CommandError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    forward_stderr(&output.stderr);
    check_status(program, output.status, &output.stderr)
}

fn forward_stderr(stderr: &[u8]) {
    let _ = io::stderr().write_all(stderr);
}

fn check_status(program: &str, status: ExitStatus, stderr: &[u8]) -> Result<(), CommandError> {
    if status.success() {
        return Ok(());
    }

    match status.code() {
        Some(code) => Err(CommandError::Exited {
            program: program.to_string(),
            code,
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }),
        None => Err(CommandError::Terminated {
            program: program.to_string(),
        }),
    }
}

/// Treats non-zero exits as transient, optionally only for selected codes
///
/// Start failures and signals are never transient.
#[derive(Debug, Clone)]
pub struct ExitCodePredicate {
    codes: Option<Vec<i32>>,
}

impl ExitCodePredicate {
    /// Every non-zero exit is transient
    pub fn any() -> Self {
        Self { codes: None }
    }

    /// Only the listed exit codes are transient
    pub fn only(codes: Vec<i32>) -> Self {
        Self { codes: Some(codes) }
    }
}

impl RetryPredicate<CommandError> for ExitCodePredicate {
    fn should_retry(&self, error: &CommandError) -> bool {
        match error {
            CommandError::Exited { code, .. } => match &self.codes {
                Some(codes) => codes.contains(code),
                None => true,
            },
            CommandError::Spawn { .. } | CommandError::Terminated { .. } => false,
        }
    }
}

/// Matches stderr of exited commands against patterns
#[derive(Debug, Clone)]
pub struct StderrPredicate {
    patterns: recur_core::retry::MessagePredicate,
}

impl StderrPredicate {
    /// Create a predicate for the given case-insensitive substrings
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: recur_core::retry::MessagePredicate::new(patterns),
        }
    }
}

impl RetryPredicate<CommandError> for StderrPredicate {
    fn should_retry(&self, error: &CommandError) -> bool {
        match error {
            CommandError::Exited { stderr, .. } => self.patterns.matches(stderr),
            _ => false,
        }
    }
}
