//! Task graph primitives.
//!
//! A [`Task`] is one node. Before it executes, its *dependents* run and must
//! all succeed. `execute` may then produce *dependencies*, sub-tasks that run
//! in parallel after it; once they settle, `post_execute` sees a
//! [`DependencyReport`] and decides the node's final outcome.
//!
//! ```rust,ignore
//! let executor = TaskExecutor::new(ctx, 16);
//! executor.run(Box::new(CompletionTask::load(&env, "atm9")?)).await?;
//! ```

pub mod executor;

pub use executor::TaskExecutor;

use crate::error::Result;
use crate::progress::ProgressSink;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type BoxedTask = Box<dyn Task>;

#[async_trait]
pub trait Task: Send + Sync {
    /// Name for logs
    fn name(&self) -> String;

    /// Stage tag shown to the user; dependency progress is counted under it
    fn stage(&self) -> Option<String> {
        None
    }

    /// Tasks that must succeed before `execute`
    fn take_dependents(&mut self) -> Vec<BoxedTask> {
        Vec::new()
    }

    async fn execute(&mut self, ctx: &TaskContext) -> Result<()>;

    /// Sub-tasks produced by `execute`, run after it
    fn take_dependencies(&mut self) -> Vec<BoxedTask> {
        Vec::new()
    }

    /// When true, any failed dependency fails this task before `post_execute`
    fn is_relying_on_dependencies(&self) -> bool {
        true
    }

    async fn post_execute(&mut self, _ctx: &TaskContext, _report: &DependencyReport) -> Result<()> {
        Ok(())
    }
}

/// Shared per-operation context handed to every node
#[derive(Clone)]
pub struct TaskContext {
    pub operation_id: String,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
}

impl TaskContext {
    pub fn new(
        operation_id: impl Into<String>,
        cancel: CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            cancel,
            progress,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Outcome of a fan-out of sub-tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// `"<task name>: <error>"` for every failure
    pub errors: Vec<String>,
}

impl DependencyReport {
    pub fn is_all_succeeded(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}
