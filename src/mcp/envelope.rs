//! Uniform response envelope for every tool.

use serde::Serialize;
use serde_json::Value;

use crate::config::schema::LimitsConfig;
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&MigrateError> for ErrorBody {
    fn from(err: &MigrateError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            path: err.path().map(|p| p.display().to_string()),
            details: err.details(),
        }
    }
}

/// Limits as reported to clients. The YAML form keeps snake_case keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_file_size_bytes: u64,
    pub max_files_per_operation: usize,
    pub max_code_length: usize,
    pub timeout_seconds: u64,
}

impl From<LimitsConfig> for Limits {
    fn from(limits: LimitsConfig) -> Self {
        Self {
            max_file_size_bytes: limits.max_file_size_bytes,
            max_files_per_operation: limits.max_files_per_operation,
            max_code_length: limits.max_code_length,
            timeout_seconds: limits.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub limits: Limits,
    pub rewrite_engine: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub tool: String,
    pub status: Status,
    /// UTC, second precision.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub metadata: Metadata,
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl Envelope {
    pub fn success(tool: &str, data: Value, metadata: Metadata) -> Self {
        Self {
            tool: tool.to_string(),
            status: Status::Success,
            timestamp: now(),
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn failure(tool: &str, err: &MigrateError, metadata: Metadata) -> Self {
        Self {
            tool: tool.to_string(),
            status: Status::Error,
            timestamp: now(),
            data: None,
            error: Some(err.into()),
            metadata,
        }
    }

    pub fn from_result(tool: &str, result: Result<Value>, metadata: Metadata) -> Self {
        match result {
            Ok(data) => Self::success(tool, data, metadata),
            Err(err) => {
                tracing::warn!(tool, code = err.code(), error = %err, "tool failed");
                Self::failure(tool, &err, metadata)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
