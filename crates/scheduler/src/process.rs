//! Child-process plumbing shared by the collection service and the
//! generation invoker: command construction, output forwarding, and
//! signal handling.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use oncall_core::ProcessConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Build a command from config with stdin closed and both outputs piped.
pub(crate) fn command_for(config: &ProcessConfig) -> Command {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Bounded text buffer that keeps the most recent output.
#[derive(Debug)]
pub(crate) struct OutputBuffer {
    text: String,
    max_bytes: usize,
}

impl OutputBuffer {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            text: String::new(),
            max_bytes,
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        if self.text.len() > self.max_bytes {
            let mut cut = self.text.len() - self.max_bytes;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    pub(crate) fn snapshot(&self) -> String {
        self.text.clone()
    }

    pub(crate) fn into_string(self) -> String {
        self.text
    }
}

pub(crate) type SharedOutput = Arc<Mutex<OutputBuffer>>;

/// Forward each line of a child stream to the log, optionally capturing it.
///
/// Invalid UTF-8 is replaced rather than ending the stream.
pub(crate) async fn forward_lines<R>(
    reader: R,
    process: &'static str,
    stream: &'static str,
    capture: Option<SharedOutput>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let raw = String::from_utf8_lossy(&buf);
                let line = raw.trim_end_matches(['\r', '\n']);
                info!(process, stream, "{line}");
                if let Some(capture) = &capture {
                    if let Ok(mut out) = capture.lock() {
                        out.push_line(line);
                    }
                }
            }
            Err(e) => {
                warn!(process, stream, error = %e, "failed to read child output");
                break;
            }
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
