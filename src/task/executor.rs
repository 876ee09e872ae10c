use super::{BoxedTask, DependencyReport, TaskContext};
use crate::error::{LauncherError, Result};
use crate::progress::StageCounter;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};

/// Runs a task graph: dependents → execute → dependencies → post_execute.
/// Fan-outs are join barriers with at most `max_parallel` nodes in flight
/// per level.
pub struct TaskExecutor {
    ctx: TaskContext,
    max_parallel: usize,
}

impl TaskExecutor {
    pub fn new(ctx: TaskContext, max_parallel: usize) -> Self {
        Self {
            ctx,
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Run the root task to completion (or cancellation)
    pub async fn run(&self, task: BoxedTask) -> Result<()> {
        let name = task.name();
        log::info!("Starting operation '{}' ({})", name, self.ctx.operation_id);

        let result = self.run_node(task).await;
        match &result {
            Ok(()) => log::info!("Operation '{}' finished successfully", name),
            Err(LauncherError::OperationCancelled) => {
                log::info!("Operation '{}' was cancelled", name)
            }
            Err(e) => log::error!("Operation '{}' failed: {}", name, e),
        }
        result
    }

    fn run_node(&self, mut task: BoxedTask) -> BoxFuture<'_, Result<()>> {
        async move {
            let name = task.name();
            if self.ctx.is_cancelled() {
                return Err(LauncherError::OperationCancelled);
            }

            let stage = task.stage();

            let dependents = task.take_dependents();
            if !dependents.is_empty() {
                let report = self.run_all(dependents, stage.as_deref()).await;
                if report.cancelled {
                    return Err(LauncherError::OperationCancelled);
                }
                if !report.is_all_succeeded() {
                    return Err(LauncherError::DependencyFailed(format!(
                        "prerequisites of '{}' failed: {}",
                        name,
                        report.errors.join("; ")
                    )));
                }
            }

            log::debug!("Executing task '{}'", name);
            let executed = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => Err(LauncherError::OperationCancelled),
                result = task.execute(&self.ctx) => result,
            };
            if let Err(e) = executed {
                if !matches!(e, LauncherError::OperationCancelled) {
                    log::warn!("Task '{}' failed: {}", name, e);
                }
                return Err(e);
            }

            let dependencies = task.take_dependencies();
            let report = self.run_all(dependencies, stage.as_deref()).await;
            if report.cancelled || self.ctx.is_cancelled() {
                return Err(LauncherError::OperationCancelled);
            }
            if report.failed > 0 {
                log::warn!(
                    "Task '{}': {} of {} sub-task(s) failed",
                    name,
                    report.failed,
                    report.total
                );
                if task.is_relying_on_dependencies() {
                    return Err(LauncherError::DependencyFailed(format!(
                        "sub-tasks of '{}' failed: {}",
                        name,
                        report.errors.join("; ")
                    )));
                }
            }

            task.post_execute(&self.ctx, &report).await
        }
        .boxed()
    }

    async fn run_all(&self, tasks: Vec<BoxedTask>, stage: Option<&str>) -> DependencyReport {
        let total = tasks.len();
        let mut report = DependencyReport {
            total,
            ..Default::default()
        };
        if total == 0 {
            return report;
        }

        let counter = stage.map(|stage| {
            StageCounter::new(self.ctx.progress.clone(), &self.ctx.operation_id, stage, total)
        });
        if let Some(counter) = &counter {
            counter.start();
        }

        let futures: Vec<BoxFuture<'_, (String, Result<()>)>> = tasks
            .into_iter()
            .map(|task| {
                let counter = counter.clone();
                async move {
                    let name = task.name();
                    let result = self.run_node(task).await;
                    if let Some(counter) = &counter {
                        counter.advance();
                    }
                    (name, result)
                }
                .boxed()
            })
            .collect();
        let results: Vec<(String, Result<()>)> = stream::iter(futures)
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        for (name, result) in results {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(LauncherError::OperationCancelled) => report.cancelled = true,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", name, e));
                }
            }
        }

        report
    }
}
