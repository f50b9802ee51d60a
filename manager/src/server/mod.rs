//! Progress page and update endpoint

pub mod handlers;
pub mod page;
pub mod serve;
pub mod state;
