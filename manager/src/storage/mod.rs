//! Persistent state and configuration files

pub mod config;
pub mod layout;
pub mod settings;
pub mod version;
