//! Install/update orchestrator

pub mod install;
pub mod plan;
