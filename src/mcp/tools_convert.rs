//! Conversion tool handlers: convert_file, convert_print_statements and
//! run_2to3.

use std::time::Duration;

use serde_json::{json, Value};

use crate::compat::matcher::{check_length, Matcher};
use crate::convert::pipeline::ConvertOptions;
use crate::convert::rewrite::{PrintRewriter, RewriteError, Rewriter};
use crate::error::{MigrateError, Result};
use crate::observability::resolve_path;

use super::ToolContext;

// convert_file
pub fn handle_convert_file(
    ctx: &ToolContext,
    file_path: &str,
    backup: Option<bool>,
    dry_run: Option<bool>,
) -> Result<Value> {
    let path = resolve_path(file_path, &ctx.base)?;
    // The server's timeout cannot stop a blocking handler, so the pipeline
    // checks this deadline itself before touching disk.
    let budget = Duration::from_secs(ctx.config.limits.timeout_seconds).mul_f64(0.9);
    let opts = ConvertOptions {
        backup: backup.unwrap_or(true),
        dry_run: dry_run.unwrap_or(false),
        deadline: None,
    }
    .with_budget(budget);
    let result = ctx.pipeline().convert(&path, opts)?;
    Ok(serde_json::to_value(result)?)
}

fn engine_error(err: RewriteError) -> MigrateError {
    match err {
        RewriteError::Syntax { line, message } => MigrateError::SyntaxError { line, message },
        RewriteError::Unsupported(message) => MigrateError::ConversionFailed {
            path: "<input>".into(),
            message,
        },
    }
}

fn rewrite_snippet(ctx: &ToolContext, engine: &dyn Rewriter, code: &str) -> Result<Value> {
    let limit = ctx.config.limits.max_code_length;
    check_length(code, limit)?;
    let converted = engine.rewrite(code).map_err(engine_error)?;
    let matcher = Matcher::compat().with_max_length(limit);
    let before = matcher.scan(code, "<input>")?;
    let after = matcher.scan(&converted, "<input>")?;
    let changed = code
        .lines()
        .zip(converted.lines())
        .filter(|(a, b)| a != b)
        .count();
    Ok(json!({
        "engine": engine.name(),
        "converted": converted,
        "linesChanged": changed,
        "findingsBefore": before.len(),
        "remaining": after,
    }))
}

// convert_print_statements
pub fn handle_convert_print(ctx: &ToolContext, code: &str) -> Result<Value> {
    rewrite_snippet(ctx, &PrintRewriter, code)
}

// run_2to3
pub fn handle_run_engine(ctx: &ToolContext, code: &str) -> Result<Value> {
    rewrite_snippet(ctx, ctx.rewriter.as_ref(), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PyMigrateConfig;
    use std::sync::Arc;

    fn ctx(base: &std::path::Path) -> ToolContext {
        ToolContext::new(PyMigrateConfig::default(), base.to_path_buf())
            .with_rewriter(Arc::new(PrintRewriter))
    }

    #[test]
    fn print_snippet_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let data = handle_convert_print(&ctx(dir.path()), "print 'a'\nx = 1\nprint x,\n").unwrap();
        assert_eq!(data["converted"], "print('a')\nx = 1\nprint(x, end=' ')\n");
        assert_eq!(data["linesChanged"], 2);
        assert_eq!(data["findingsBefore"], 2);
        assert_eq!(data["remaining"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn convert_file_dry_run_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.py"), "print 'x'\n").unwrap();
        let data = handle_convert_file(&ctx(dir.path()), "m.py", None, Some(true)).unwrap();
        assert_eq!(data["action"], "dry-run");
        assert_eq!(data["changes"][0]["after"], "print('x')");
    }

    #[test]
    fn zero_timeout_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "print 'x'\n").unwrap();
        let mut config = PyMigrateConfig::default();
        config.limits.timeout_seconds = 0;
        let context =
            ToolContext::new(config, dir.path().to_path_buf()).with_rewriter(Arc::new(PrintRewriter));
        let err = handle_convert_file(&context, "m.py", None, None).unwrap_err();
        assert_eq!(err.code(), "Timeout");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'x'\n");
        assert!(!dir.path().join("m.py.py2.bak").exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = handle_convert_file(&ctx(dir.path()), "gone.py", None, None).unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[test]
    fn missing_engine_surfaces_as_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PyMigrateConfig::default();
        config.rewrite.program = "pymigrate-no-such-engine".into();
        let context = ToolContext::new(config, dir.path().to_path_buf());
        let err = handle_run_engine(&context, "print 'x'\n").unwrap_err();
        assert_eq!(err.code(), "ConversionFailed");
    }
}
