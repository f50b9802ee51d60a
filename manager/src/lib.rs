//! Containerizer Library
//!
//! Core modules for installing, updating and supervising a git-hosted Node
//! application.

pub mod app;
pub mod deploy;
pub mod env;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod installer;
pub mod logs;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod supervisor;
pub mod utils;
