//! Command execution primitives with consistent error handling.

use std::process::{Command, Output};

use serde::Serialize;

use crate::error::{Error, Result};

/// Run a command and return stdout on success.
///
/// Returns an error with stderr (or stdout fallback) if it fails.
/// Stdout is not trimmed: callers parse it as a document.
pub fn run<S: AsRef<str>>(program: &str, args: &[S], context: &str) -> Result<String> {
    let output = spawn(program, args, context)?;

    if !output.status.success() {
        return Err(Error::internal_io(
            format!("{} failed: {}", context, error_text(&output)),
            Some(context.to_string()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a command to completion and capture both streams regardless of exit status.
///
/// Returns the output together with whether the command succeeded. Only a
/// failure to spawn is an error.
pub fn run_captured<S: AsRef<str>>(
    program: &str,
    args: &[S],
    context: &str,
) -> Result<(CapturedOutput, bool)> {
    let output = spawn(program, args, context)?;
    let captured = CapturedOutput::new(
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    );
    Ok((captured, output.status.success()))
}

fn spawn<S: AsRef<str>>(program: &str, args: &[S], context: &str) -> Result<Output> {
    Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .output()
        .map_err(|e| {
            Error::internal_io(
                format!("Failed to run {}: {}", context, e),
                Some(context.to_string()),
            )
        })
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Captured output from command execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: String, stderr: String) -> Self {
        Self { stdout, stderr }
    }

    /// Both streams joined, stdout first. Build logs interleave the two.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}
