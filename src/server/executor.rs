//! Concurrency substrate for sessions.

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

use crate::error::SpawnError;

/// Runs a session without the caller waiting on it.
///
/// On refusal the task is dropped, which closes the connection it owns.
pub trait Executor: Send + Sync + 'static {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnError>;
}

/// Spawns sessions as Tokio tasks.
///
/// Uses the runtime captured at construction, or the ambient one when none was given.
#[derive(Debug, Clone, Default)]
pub struct TokioExecutor {
    handle: Option<Handle>,
}

impl TokioExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn onto a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnError> {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|e| SpawnError::new(e.to_string()))?,
        };
        // Detached: the JoinHandle is dropped on purpose.
        drop(handle.spawn(task));
        Ok(())
    }
}
