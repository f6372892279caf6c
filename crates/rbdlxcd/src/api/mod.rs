//! HTTP API.

pub mod error;
pub mod handlers;
pub mod server;
