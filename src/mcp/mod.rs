//! MCP server over stdio.
//!
//! Tool handler logic is split into modules by domain:
//! - [`tools_analysis`]: scanning, reports, validation, syntax, reference
//! - [`tools_convert`]: file conversion and snippet rewriting
//! - [`server`]: rmcp wiring, preset filtering, the guide resource and the
//!   `plan-migration` prompt
//!
//! Handlers are synchronous and return `Result<serde_json::Value>`; the
//! server wraps them in an [`envelope::Envelope`]. The CLI calls the same
//! handlers.

pub mod envelope;
pub mod registry;
pub mod server;
pub mod tools_analysis;
pub mod tools_convert;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::PyMigrateConfig;
use crate::convert::rewrite::{engine_for, Rewriter};
use crate::convert::Pipeline;
use crate::error::{MigrateError, Result};
use crate::fs::{FileAccess, LocalFs};

use envelope::Metadata;

/// Collaborators shared by every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub fs: Arc<dyn FileAccess>,
    pub rewriter: Arc<dyn Rewriter>,
    pub config: PyMigrateConfig,
    /// Relative tool paths are resolved against this directory.
    pub base: PathBuf,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("rewriter", &self.rewriter.name())
            .field("config", &self.config)
            .field("base", &self.base)
            .finish()
    }
}

impl ToolContext {
    /// Local filesystem plus the engine named in `config.rewrite`.
    pub fn new(config: PyMigrateConfig, base: PathBuf) -> Self {
        Self {
            fs: Arc::new(LocalFs),
            rewriter: engine_for(&config.rewrite),
            config,
            base,
        }
    }

    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            limits: self.config.limits.into(),
            rewrite_engine: self.rewriter.name().to_string(),
        }
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self.fs.as_ref(), self.rewriter.as_ref(), self.config.limits)
    }

    /// Join `path` onto the base directory without requiring it to exist.
    pub fn locate(&self, path: &str) -> Result<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(MigrateError::InvalidInput("path must not be empty".into()));
        }
        Ok(self.base.join(Path::new(trimmed)))
    }
}
