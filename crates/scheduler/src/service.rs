//! Collection service lifecycle: the web form developers use to submit
//! restrictions runs as a child process only while the window is open.

use oncall_core::ProcessConfig;
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::LifecycleError;
use crate::process::{command_for, forward_lines};

const PROCESS_LABEL: &str = "collection-service";

/// Controls the collection service. At most one instance runs at a time.
pub trait CollectionService: Send {
    /// Start the service. A no-op if it is already running.
    fn start(&mut self) -> Result<(), LifecycleError>;

    /// Ask the service to terminate. A no-op if it is not running.
    fn stop(&mut self);

    /// Whether a live instance is being tracked. Clears the handle of an
    /// instance that exited on its own.
    fn is_running(&mut self) -> bool;
}

/// Runs the collection service as a child process.
///
/// A watcher task owns the [`Child`]; the controller keeps only its pid and
/// two channels. An unexpected exit is logged by the watcher and the stale
/// handle is dropped on the next `start`/`is_running`.
pub struct ProcessCollectionService {
    config: ProcessConfig,
    handle: Option<ServiceHandle>,
}

struct ServiceHandle {
    pid: Option<u32>,
    stop_tx: oneshot::Sender<()>,
    exited_rx: oneshot::Receiver<Option<i32>>,
}

impl ProcessCollectionService {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }

    /// Drop the handle if the watched process has already exited.
    fn reap(&mut self) {
        let exited = match self.handle.as_mut() {
            Some(handle) => !matches!(
                handle.exited_rx.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            ),
            None => false,
        };
        if exited {
            info!("collection service handle cleared after exit");
            self.handle = None;
        }
    }
}

impl CollectionService for ProcessCollectionService {
    fn start(&mut self) -> Result<(), LifecycleError> {
        self.reap();
        if let Some(handle) = &self.handle {
            info!(pid = ?handle.pid, "collection service already running");
            return Ok(());
        }

        let mut child = command_for(&self.config)
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| LifecycleError::Spawn {
                program: self.config.display(),
                source,
            })?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, PROCESS_LABEL, "stdout", None));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, PROCESS_LABEL, "stderr", None));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = oneshot::channel();
        tokio::spawn(watch(child, stop_rx, exited_tx));

        info!(pid = ?pid, command = %self.config.display(), "collection service started");
        self.handle = Some(ServiceHandle {
            pid,
            stop_tx,
            exited_rx,
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.reap();
        let Some(handle) = self.handle.take() else {
            info!("collection service not running, nothing to stop");
            return;
        };

        #[cfg(unix)]
        if let Some(pid) = handle.pid {
            send_sigterm(pid);
        }

        let _ = handle.stop_tx.send(());
        info!(pid = ?handle.pid, "collection service stopped");
    }

    fn is_running(&mut self) -> bool {
        self.reap();
        self.handle.is_some()
    }
}

impl Drop for ProcessCollectionService {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range, cannot signal collection service");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to send SIGTERM to collection service");
    }
}

/// Wait for the child to exit on its own or for a stop request.
async fn watch(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    exited_tx: oneshot::Sender<Option<i32>>,
) {
    tokio::select! {
        status = child.wait() => {
            let code = status.as_ref().ok().and_then(|s| s.code());
            warn!(code = ?code, "collection service exited unexpectedly");
            let _ = exited_tx.send(code);
        }
        _ = stop_rx => {
            // On unix the controller has already sent SIGTERM.
            #[cfg(not(unix))]
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill collection service");
            }
            match child.wait().await {
                Ok(status) => info!(code = ?status.code(), "collection service exited"),
                Err(e) => warn!(error = %e, "failed to wait for collection service"),
            }
        }
    }
}
