//! Install state machine and the managed app

pub mod process;
pub mod state;
#[allow(clippy::module_inception)]
pub mod supervisor;
