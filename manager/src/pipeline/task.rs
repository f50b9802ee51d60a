//! Pipeline building blocks

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::errors::ManagerError;

/// The work performed by a step
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self) -> Result<(), ManagerError>;
}

#[async_trait]
impl<F, Fut> Action for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ManagerError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), ManagerError> {
        (self)().await
    }
}

/// Smallest unit of work: a label and an action
pub struct Step {
    pub label: String,
    pub action: Box<dyn Action>,
    /// A failing best-effort step is logged and its siblings continue
    pub best_effort: bool,
}

/// Ordered group of tasks run one after another
pub struct Pipeline {
    pub label: String,
    pub children: Vec<Task>,
}

/// A node of the task tree
pub enum Task {
    Step(Step),
    Pipeline(Pipeline),
}

impl Task {
    /// Create a step that aborts its parents on failure
    pub fn step(label: impl Into<String>, action: impl Action + 'static) -> Self {
        Task::Step(Step {
            label: label.into(),
            action: Box::new(action),
            best_effort: false,
        })
    }

    /// Create a step whose failure is logged but does not abort its siblings
    pub fn best_effort(label: impl Into<String>, action: impl Action + 'static) -> Self {
        Task::Step(Step {
            label: label.into(),
            action: Box::new(action),
            best_effort: true,
        })
    }

    /// Create a nested pipeline
    pub fn pipeline(label: impl Into<String>, children: Vec<Task>) -> Self {
        Task::Pipeline(Pipeline {
            label: label.into(),
            children,
        })
    }

    pub fn label(&self) -> &str {
        match self {
            Task::Step(step) => &step.label,
            Task::Pipeline(pipeline) => &pipeline.label,
        }
    }

    /// Number of leaf steps in this subtree
    pub fn step_count(&self) -> usize {
        match self {
            Task::Step(_) => 1,
            Task::Pipeline(pipeline) => pipeline.children.iter().map(Task::step_count).sum(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Step(step) => f
                .debug_struct("Step")
                .field("label", &step.label)
                .field("best_effort", &step.best_effort)
                .finish(),
            Task::Pipeline(pipeline) => f
                .debug_struct("Pipeline")
                .field("label", &pipeline.label)
                .field("children", &pipeline.children)
                .finish(),
        }
    }
}
