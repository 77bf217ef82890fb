//! Error types for pymigrate.
//!
//! Every variant maps to a stable condition code (see [`MigrateError::code`])
//! that the response envelope carries alongside the human-readable message.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Inline source text exceeds the configured character limit.
    #[error("input length ({length} chars) exceeds limit ({limit} chars)")]
    InputTooLarge { length: usize, limit: usize },

    /// A file or operation count ceiling would be exceeded.
    #[error("{what}: found {found}, limit is {limit}")]
    LimitExceeded {
        what: &'static str,
        found: usize,
        limit: usize,
    },

    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// A create-only write found the target already present.
    #[error("already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// Text failed to parse as Python 3, or the rewrite engine rejected it.
    #[error("syntax error at line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    /// The rewrite engine failed; nothing on disk was touched.
    #[error("conversion failed for {}: {message}", path.display())]
    ConversionFailed { path: PathBuf, message: String },

    /// A single file could not be read.
    #[error("cannot read {}: {message}", path.display())]
    ReadError { path: PathBuf, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation ran past its time budget.
    #[error("operation exceeded {seconds}s timeout")]
    Timeout { seconds: u64 },

    /// A scan hit its deadline; `partial` holds what completed in time.
    #[error("operation exceeded {seconds}s timeout after {completed} files")]
    PartialTimeout {
        seconds: u64,
        completed: usize,
        partial: Box<serde_json::Value>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// The tree-sitter grammar could not be loaded or gave up.
    #[error("parser error: {0}")]
    Parser(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl MigrateError {
    /// Stable, machine-readable condition code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputTooLarge { .. } => "InputTooLarge",
            Self::LimitExceeded { .. } => "LimitExceeded",
            Self::NotFound { .. } => "NotFound",
            Self::PermissionDenied { .. } => "PermissionDenied",
            Self::SyntaxError { .. } => "SyntaxError",
            Self::ConversionFailed { .. } => "ConversionFailed",
            Self::ReadError { .. } => "ReadError",
            Self::InvalidInput(_) | Self::AlreadyExists { .. } => "InvalidInput",
            Self::Timeout { .. } | Self::PartialTimeout { .. } => "Timeout",
            Self::Config(_) => "ConfigError",
            Self::Parser(_) => "ParserError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
            Self::Yaml(_) => "YamlError",
            Self::Pattern(_) => "InvalidPattern",
        }
    }

    /// The path this error is about, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::AlreadyExists { path }
            | Self::ConversionFailed { path, .. }
            | Self::ReadError { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Structured details for the envelope `error.details` field.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InputTooLarge { length, limit } => {
                Some(serde_json::json!({ "length": length, "limit": limit }))
            }
            Self::LimitExceeded { what, found, limit } => Some(serde_json::json!({
                "what": what,
                "found": found,
                "limit": limit,
                "skipped": found.saturating_sub(*limit),
            })),
            Self::SyntaxError { line, .. } => Some(serde_json::json!({ "line": line })),
            Self::Timeout { seconds } => Some(serde_json::json!({ "timeoutSeconds": seconds })),
            Self::PartialTimeout {
                seconds,
                completed,
                partial,
            } => Some(serde_json::json!({
                "timeoutSeconds": seconds,
                "completed": completed,
                "partial": partial,
            })),
            _ => None,
        }
    }

    /// Map an I/O error on `path` onto the specific variants where possible.
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::ReadError {
                path,
                message: err.to_string(),
            },
        }
    }
}

impl From<crate::types::ReadError> for MigrateError {
    fn from(err: crate::types::ReadError) -> Self {
        use crate::types::ReadErrorKind;
        let path = PathBuf::from(err.path);
        match err.kind {
            ReadErrorKind::NotFound => Self::NotFound { path },
            ReadErrorKind::PermissionDenied => Self::PermissionDenied { path },
            ReadErrorKind::TooLarge | ReadErrorKind::Encoding | ReadErrorKind::Io => {
                Self::ReadError {
                    path,
                    message: err.message,
                }
            }
        }
    }
}
