//! Child-process worker executor
//!
//! Every unit runs in a fresh copy of this binary started in worker mode.
//! A crash, hang or memory blow-up of the page load stays inside the child.

use crate::worker::protocol::{parse_completion, WorkerPayload, WorkerTask};
use crate::worker::{WorkerExecutor, WorkerFailure};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Runs each task in its own child process
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
    base_args: Vec<OsString>,
    timeout: Duration,
}

impl ProcessExecutor {
    /// Creates an executor that runs `program base_args.. --worker <kind> --target <url>`
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            base_args,
            timeout,
        }
    }

    /// Creates an executor that re-invokes the running binary
    pub fn current_exe(base_args: Vec<OsString>, timeout: Duration) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, base_args, timeout))
    }

    fn command(&self, task: &WorkerTask) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg("--worker")
            .arg(task.kind.as_str())
            .arg("--target")
            .arg(&task.target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // Keep terminal interrupts away from workers; the parent kills them.
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

#[async_trait]
impl WorkerExecutor for ProcessExecutor {
    async fn execute(&self, task: &WorkerTask) -> Result<WorkerPayload, WorkerFailure> {
        let mut child = self
            .command(task)
            .spawn()
            .map_err(|e| WorkerFailure::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerFailure::Spawn("worker stdout was not captured".to_string()))?;

        tracing::debug!("Spawned {} worker (pid {:?}) for {}", task.kind, child.id(), task.target);

        let outcome = {
            let collect = collect_output(&mut child, stdout);
            tokio::time::timeout(self.timeout, collect).await
        };

        let (output, status) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                terminate(&mut child).await;
                return Err(WorkerFailure::Crashed(format!("worker I/O failed: {}", e)));
            }
            Err(_) => {
                tracing::warn!(
                    "Worker for {} exceeded {:?}, killing it",
                    task.target,
                    self.timeout
                );
                terminate(&mut child).await;
                return Err(WorkerFailure::Timeout(self.timeout));
            }
        };

        match parse_completion(&output) {
            Some(message) if message.success => message.payload.ok_or_else(|| {
                WorkerFailure::Protocol("success reported without payload".to_string())
            }),
            Some(message) => Err(WorkerFailure::Reported(
                message.error.unwrap_or_else(|| "unspecified failure".to_string()),
            )),
            None => Err(WorkerFailure::NoCompletion(describe_exit(status))),
        }
    }
}

/// Reads the child's stdout to EOF, then reaps it
async fn collect_output(
    child: &mut Child,
    mut stdout: ChildStdout,
) -> std::io::Result<(String, ExitStatus)> {
    let mut output = String::new();
    stdout.read_to_string(&mut output).await?;
    let status = child.wait().await?;
    Ok((output, status))
}

/// Kills the child and waits until it is gone
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Worker already gone during kill: {}", e);
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("worker exited with code {} without reporting", code),
        None => "worker was terminated by a signal without reporting".to_string(),
    }
}
