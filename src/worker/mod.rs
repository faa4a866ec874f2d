//! Isolated worker execution
//!
//! Every fetch-and-extract operation runs as a unit in an isolated worker.
//! The orchestrator only sees the `WorkerExecutor` seam: it hands over a task
//! and gets back a payload or a `WorkerFailure`. A worker that crashes, hangs
//! or exits without reporting is a failed attempt, never a crashed crawl.

mod process;
mod protocol;
mod retry;
mod runner;
mod task;

pub use process::ProcessExecutor;
pub use protocol::{
    parse_completion, TaskKind, WorkerMessage, WorkerPayload, WorkerTask, COMPLETION_MARKER,
};
pub use retry::{execute_with_retry, RetryOutcome, RetryPolicy};
pub use runner::{serve_worker, WorkerContext};
pub use task::TaskExecutor;

use crate::config::{Config, IsolationMode};
use crate::HarvestError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reasons a single attempt of a unit failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFailure {
    #[error("Failed to start worker: {0}")]
    Spawn(String),

    #[error("Worker exceeded operation timeout of {0:?}")]
    Timeout(Duration),

    #[error("Worker crashed: {0}")]
    Crashed(String),

    #[error("Worker finished without completion message: {0}")]
    NoCompletion(String),

    #[error("Worker reported failure: {0}")]
    Reported(String),

    #[error("Worker protocol violation: {0}")]
    Protocol(String),
}

/// Runs a unit of work in isolation
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    /// Executes one attempt of `task`
    async fn execute(&self, task: &WorkerTask) -> Result<WorkerPayload, WorkerFailure>;
}

/// Builds the executor selected by `crawler.isolation`
///
/// `worker_args` are passed in front of the worker arguments when a child
/// process is started; they must point the child at the same configuration.
pub fn build_executor(
    config: &Config,
    worker_args: Vec<OsString>,
) -> Result<Arc<dyn WorkerExecutor>, HarvestError> {
    let timeout = Duration::from_millis(config.crawler.operation_timeout_ms);
    match config.crawler.isolation {
        IsolationMode::Process => {
            tracing::debug!("Workers run as child processes");
            Ok(Arc::new(ProcessExecutor::current_exe(worker_args, timeout)?))
        }
        IsolationMode::Task => {
            tracing::debug!("Workers run as in-process tasks");
            let context = WorkerContext::from_config(config)?;
            Ok(Arc::new(TaskExecutor::new(Arc::new(context), timeout)))
        }
    }
}
