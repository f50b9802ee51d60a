//! Environment variables feeding the generated files

pub mod snapshot;
pub mod values;
