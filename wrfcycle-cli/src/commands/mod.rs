//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`run`] - Cycle commands (analysis, forecast, cycle)

pub mod config;
pub mod run;
