//! spindle-server
//!
//! HTTP front end for `spindle-core`: submit operations, poll their status,
//! cancel them, and report health / readiness.

pub mod api;
pub mod config;
pub mod operations;
pub mod router;
pub mod state;

pub use crate::config::ServerConfig;
pub use crate::router::build_router;
pub use crate::state::AppState;
