//! Conversion through a rewrite engine, post-conversion validation and
//! original/converted comparison.

pub mod pipeline;
pub mod rewrite;
pub mod syntax;

pub use pipeline::{
    backup_path, fix_rate, ComparisonReport, ComparisonStatus, ConversionAction, ConversionResult,
    ConvertOptions, Pipeline, ValidationReport, ValidationStatus, BACKUP_SUFFIX,
};
pub use rewrite::{engine_for, CommandRewriter, PrintRewriter, RewriteError, Rewriter, BUILTIN_PRINT};
pub use syntax::{check_syntax, IssueKind, SyntaxCheck, SyntaxIssue};
