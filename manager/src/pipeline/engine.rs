//! Recursive pipeline interpreter

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, error, warn};

use crate::errors::ManagerError;
use crate::pipeline::task::{Pipeline, Step, Task};

/// Run a task tree in declaration order.
///
/// The first failing step stops its remaining siblings and the error travels
/// up through every enclosing pipeline unchanged. Best-effort steps are the
/// only exception.
pub fn run(task: &Task) -> BoxFuture<'_, Result<(), ManagerError>> {
    async move {
        match task {
            Task::Step(step) => run_step(step).await,
            Task::Pipeline(pipeline) => run_pipeline(pipeline).await,
        }
    }
    .boxed()
}

async fn run_step(step: &Step) -> Result<(), ManagerError> {
    debug!("Running step: {}", step.label);

    match step.action.run().await {
        Ok(()) => Ok(()),
        Err(e) if step.best_effort => {
            warn!("Best-effort step '{}' failed, continuing: {}", step.label, e);
            Ok(())
        }
        Err(e) => {
            error!("Step '{}' failed: {}", step.label, e);
            Err(e)
        }
    }
}

async fn run_pipeline(pipeline: &Pipeline) -> Result<(), ManagerError> {
    debug!(
        "Entering pipeline '{}' ({} tasks)",
        pipeline.label,
        pipeline.children.len()
    );

    for child in &pipeline.children {
        if let Err(e) = run(child).await {
            debug!("Pipeline '{}' aborted at '{}'", pipeline.label, child.label());
            return Err(e);
        }
    }

    debug!("Pipeline '{}' completed", pipeline.label);
    Ok(())
}
