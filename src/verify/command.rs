//! Verifier backed by an external process.
//!
//! The verification input is written to the child's stdin as JSON and the
//! verdict is read from its stdout. The child is killed if it outlives the
//! configured timeout.

use super::{VerificationInput, Verifier, VerifyError};
use crate::generation::extract_json;
use crate::models::{VerificationVerdict, VerifierConfig};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Maximum stderr characters kept in an error message.
const MAX_STDERR_CHARS: usize = 2_000;

/// Runs a verifier command per candidate.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandVerifier {
    pub fn new(argv: &[String], working_dir: Option<PathBuf>, timeout: Duration) -> Result<Self, VerifyError> {
        let (program, args) = argv.split_first().ok_or(VerifyError::NotConfigured)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir,
            timeout,
        })
    }

    pub fn from_config(config: &VerifierConfig) -> Result<Self, VerifyError> {
        Self::new(
            &config.command,
            config.working_dir.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, input: &VerificationInput) -> Result<VerificationVerdict, VerifyError> {
        let payload = serde_json::to_vec(input).map_err(|e| VerifyError::Failed(e.to_string()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(VerifyError::Spawn)?;

        // Written from a task so a child that writes before reading cannot deadlock us.
        if let Some(mut stdin) = child.stdin.take() {
            let program = self.program.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(program = %program, error = %e, "Verifier did not read its full input");
                }
            });
        }

        // On timeout the child is dropped, and `kill_on_drop` terminates it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VerifyError::Timeout(self.timeout))?
            .map_err(VerifyError::Spawn)?;

        debug!(
            program = %self.program,
            status = ?output.status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Verifier process finished"
        );

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(VerifyError::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        parse_verdict(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Read a verdict from verifier stdout, tolerating log lines around the JSON.
fn parse_verdict(stdout: &str) -> Result<VerificationVerdict, VerifyError> {
    let value = extract_json(stdout).map_err(|e| VerifyError::InvalidOutput(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| VerifyError::InvalidOutput(e.to_string()))
}
