//! Schedule generation: one run of the external generator program.

use std::sync::{Arc, Mutex};

use oncall_core::ProcessConfig;
use tracing::{error, info};

use crate::process::{command_for, forward_lines, OutputBuffer};

const PROCESS_LABEL: &str = "generation";

/// Combined output kept from a generation run.
pub const OUTPUT_CAP_BYTES: usize = 64 * 1024;

/// Characters of output included in the admin report after success.
pub const SUCCESS_TAIL_CHARS: usize = 800;

/// Characters of output included in the admin report after failure.
pub const FAILURE_TAIL_CHARS: usize = 600;

/// Outcome of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Process exit code; -1 if it was killed by a signal or never started.
    pub exit_code: i32,
    /// Interleaved stdout and stderr.
    pub output: String,
}

impl GenerationResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// The last `max_chars` characters of output, trailing whitespace removed.
    pub fn output_tail(&self, max_chars: usize) -> &str {
        let text = self.output.trim_end();
        let count = text.chars().count();
        if count <= max_chars {
            return text;
        }
        let start = text
            .char_indices()
            .nth(count - max_chars)
            .map_or(text.len(), |(i, _)| i);
        &text[start..]
    }
}

/// Runs schedule generation to completion.
#[async_trait::async_trait]
pub trait GenerationInvoker: Send + Sync {
    /// Run once and wait for it to finish. Failures are reported through the
    /// result, never as an error.
    async fn run(&self) -> GenerationResult;
}

/// Invokes the generator as a child process.
#[derive(Debug, Clone)]
pub struct ProcessGenerationInvoker {
    config: ProcessConfig,
}

impl ProcessGenerationInvoker {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl GenerationInvoker for ProcessGenerationInvoker {
    async fn run(&self) -> GenerationResult {
        let command = self.config.display();
        info!(%command, "running schedule generation");

        let mut child = match command_for(&self.config).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(%command, error = %e, "failed to start schedule generation");
                return GenerationResult {
                    exit_code: -1,
                    output: format!("failed to start '{command}': {e}"),
                };
            }
        };

        let output = Arc::new(Mutex::new(OutputBuffer::new(OUTPUT_CAP_BYTES)));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(
                stdout,
                PROCESS_LABEL,
                "stdout",
                Some(output.clone()),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(
                stderr,
                PROCESS_LABEL,
                "stderr",
                Some(output.clone()),
            )));
        }

        let exit_code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                error!(error = %e, "failed to wait for schedule generation");
                -1
            }
        };
        for reader in readers {
            let _ = reader.await;
        }

        let output = match Arc::try_unwrap(output) {
            Ok(buffer) => buffer
                .into_inner()
                .map(OutputBuffer::into_string)
                .unwrap_or_default(),
            Err(shared) => shared
                .lock()
                .map(|buffer| buffer.snapshot())
                .unwrap_or_default(),
        };

        info!(exit_code, output_bytes = output.len(), "schedule generation finished");
        GenerationResult { exit_code, output }
    }
}
