//! Task pipeline engine and progress reporting

pub mod engine;
pub mod progress;
pub mod task;

pub use engine::run;
pub use task::{Action, Pipeline, Step, Task};
