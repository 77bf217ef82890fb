//! pymigrate: Python 2 to 3 migration library.
//!
//! Lexical compatibility scanning, corpus aggregation into migration
//! reports, and a backup-first convert/validate pipeline, exposed over MCP
//! and a CLI.

pub mod cli;
pub mod compat;
pub mod config;
pub mod convert;
pub mod error;
pub mod fs;
pub mod mcp;
pub mod observability;
pub mod types;

pub use error::{MigrateError, Result};
