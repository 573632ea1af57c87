//! Handle on a ComfyUI server process launched by the relay.
//!
//! The child is owned by a monitor task that publishes its exit status on
//! a `watch` channel, so any number of observers can check liveness or
//! await exit without holding a lock on the child.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex};

/// How to start the server.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchConfig {
    /// `python3 <main_py> --listen 127.0.0.1 --port <port>`, run from the
    /// ComfyUI checkout with it on `PYTHONPATH`.
    pub fn comfyui(main_py: &Path, port: u16) -> Result<Self, ProcessError> {
        if !main_py.is_file() {
            return Err(ProcessError::MissingEntryPoint(main_py.to_path_buf()));
        }
        Ok(Self {
            program: "python3".to_string(),
            args: vec![
                main_py.display().to_string(),
                "--listen".to_string(),
                "127.0.0.1".to_string(),
                "--port".to_string(),
                port.to_string(),
            ],
            working_dir: main_py.parent().map(Path::to_path_buf),
        })
    }
}

/// Exit status of the supervised process. `code` is `None` when it was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("ComfyUI entry point not found at {}", .0.display())]
    MissingEntryPoint(PathBuf),

    #[error("Failed to start ComfyUI: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct ComfyUIProcess {
    pid: Option<u32>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ComfyUIProcess {
    /// Start the process and its monitor task. Must be called inside a
    /// Tokio runtime.
    pub fn spawn(config: &LaunchConfig) -> Result<Self, ProcessError> {
        let mut command = tokio::process::Command::new(&config.program);
        command.args(&config.args).kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir).env("PYTHONPATH", dir);
        }

        let mut child = command.spawn()?;
        let pid = child.id();
        tracing::info!(pid, program = %config.program, "ComfyUI process started");

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                // Fires on an explicit terminate and when the handle is dropped.
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "Failed to signal ComfyUI process");
                    }
                    child.wait().await
                }
            };

            let exit = ProcessExit {
                code: status.ok().and_then(|s| s.code()),
            };
            tracing::info!(pid, code = ?exit.code, "ComfyUI process exited");
            let _ = exit_tx.send(Some(exit));
        });

        Ok(Self {
            pid,
            exit_rx,
            kill_tx: Mutex::new(Some(kill_tx)),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The exit status, once the process has exited.
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Wait until the process exits.
    pub async fn exited(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => *exit,
            // The monitor task always publishes before dropping its sender.
            Err(_) => None,
        };
        exit.unwrap_or(ProcessExit { code: None })
    }

    /// Kill the process and wait up to `grace` for it to be reaped.
    pub async fn terminate(&self, grace: Duration) -> Option<ProcessExit> {
        if let Some(kill_tx) = self.kill_tx.lock().await.take() {
            let _ = kill_tx.send(());
        }
        tokio::time::timeout(grace, self.exited()).await.ok()
    }
}
