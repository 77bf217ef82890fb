//! Structured logging and path handling for tool inputs.
//!
//! - [`init_logging`]: one-time subscriber setup with `RUST_LOG` support
//! - [`resolve_path`]: turn a tool-supplied path into a canonical one

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::error::{MigrateError, Result};

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `pymigrate=info` when `RUST_LOG` is not set. Output goes to
/// stderr; stdout carries MCP frames in server mode. Subsequent calls are
/// ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pymigrate=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Resolve `path` against `base` and canonicalize it.
///
/// Relative paths are joined onto `base`; absolute paths are taken as is.
/// A path that does not exist is [`MigrateError::NotFound`].
pub fn resolve_path(path: &str, base: &Path) -> Result<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(MigrateError::InvalidInput("path must not be empty".into()));
    }
    if trimmed.contains('\0') {
        return Err(MigrateError::InvalidInput("path contains a NUL byte".into()));
    }
    let requested = base.join(trimmed);
    requested
        .canonicalize()
        .map_err(|e| MigrateError::from_io(e, &requested))
}
