//! Installation primitives: external commands, git, npm and generated files

pub mod command;
pub mod git;
pub mod npm;
pub mod template;
