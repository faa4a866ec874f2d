//! In-process worker executor
//!
//! Runs each unit on a separately spawned tokio task. A panic inside the
//! unit is caught at the task boundary and a hung unit is aborted after the
//! operation timeout. Lighter than a child process, but memory is shared.

use crate::worker::protocol::{WorkerPayload, WorkerTask};
use crate::worker::runner::WorkerContext;
use crate::worker::{WorkerExecutor, WorkerFailure};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs each task on a fresh tokio task
pub struct TaskExecutor {
    context: Arc<WorkerContext>,
    timeout: Duration,
}

impl TaskExecutor {
    pub fn new(context: Arc<WorkerContext>, timeout: Duration) -> Self {
        Self { context, timeout }
    }
}

/// Aborts the wrapped task when dropped, so a cancelled caller leaves nothing running
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl WorkerExecutor for TaskExecutor {
    async fn execute(&self, task: &WorkerTask) -> Result<WorkerPayload, WorkerFailure> {
        let context = Arc::clone(&self.context);
        let owned_task = task.clone();
        let mut handle = AbortOnDrop(tokio::spawn(async move {
            context.run_task(&owned_task).await
        }));

        match tokio::time::timeout(self.timeout, &mut handle.0).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => Err(WorkerFailure::Reported(e.to_string())),
            Ok(Err(join_error)) if join_error.is_panic() => {
                Err(WorkerFailure::Crashed("worker task panicked".to_string()))
            }
            Ok(Err(join_error)) => Err(WorkerFailure::Crashed(join_error.to_string())),
            Err(_) => {
                tracing::warn!(
                    "Worker task for {} exceeded {:?}, aborting it",
                    task.target,
                    self.timeout
                );
                Err(WorkerFailure::Timeout(self.timeout))
            }
        }
    }
}
