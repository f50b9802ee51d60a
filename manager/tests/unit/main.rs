//! Integration tests for the containerizer manager

mod common;
mod test_installer;
mod test_server;
