//! # revisit
//!
//! HTTP server, CLI and deployment config around `revisit-core`.
//!
//! Exposed as a library so integration tests can build the router directly.

pub mod api;
pub mod cli;
pub mod config;
