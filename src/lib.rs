// ABOUTME: Root library module for the parley server
// ABOUTME: HTTP surface, CLI and web search on top of parley-core

pub mod cli;
pub mod error;
pub mod routes;
pub mod server;
pub mod websearch;

// Re-export platform-agnostic modules from parley-core
pub use parley_core::config;
pub use parley_core::metrics;
pub use parley_core::paths;

pub use server::{build_router, AppState, SharedState};
