//! Rewrite engines.
//!
//! The pipeline never edits source text itself. It hands the whole file to a
//! [`Rewriter`] and receives the converted text or a [`RewriteError`].

use std::io::Write;
use std::process::Command;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::schema::RewriteConfig;

/// Why an engine refused or failed to convert a text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("engine could not parse line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("{0}")]
    Unsupported(String),
}

/// A whole-text source converter.
pub trait Rewriter: Send + Sync {
    /// Short engine name, reported in response metadata.
    fn name(&self) -> &str;

    fn rewrite(&self, text: &str) -> Result<String, RewriteError>;
}

/// `rewrite.program` value that selects [`PrintRewriter`] instead of an
/// external command.
pub const BUILTIN_PRINT: &str = "builtin-print";

/// The engine named by `config`.
pub fn engine_for(config: &RewriteConfig) -> Arc<dyn Rewriter> {
    if config.program == BUILTIN_PRINT {
        Arc::new(PrintRewriter)
    } else {
        Arc::new(CommandRewriter::from_config(config))
    }
}

// ---------------------------------------------------------------------------
// External command
// ---------------------------------------------------------------------------

/// Runs a 2to3-compatible program on a temporary copy of the text.
///
/// The program receives `args` followed by the temp file path and is expected
/// to rewrite the file in place.
#[derive(Debug, Clone)]
pub struct CommandRewriter {
    program: String,
    args: Vec<String>,
}

static PARSE_POSITION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\((\d+),\s*\d+\)\)").ok());

impl CommandRewriter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &RewriteConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Command line as a single string, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Rewriter for CommandRewriter {
    fn name(&self) -> &str {
        &self.program
    }

    fn rewrite(&self, text: &str) -> Result<String, RewriteError> {
        let io_err = |e: std::io::Error| RewriteError::Unsupported(format!("temp file: {e}"));

        let mut tmp = tempfile::Builder::new()
            .prefix("pymigrate-")
            .suffix(".py")
            .tempfile()
            .map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;

        tracing::debug!(command = %self.command_line(), file = %tmp.path().display(), "running rewrite engine");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(tmp.path())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RewriteError::Unsupported(format!(
                    "rewrite engine `{}` not found on PATH",
                    self.program
                )),
                _ => RewriteError::Unsupported(format!("cannot run `{}`: {e}", self.program)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(message) = stderr.lines().chain(stdout.lines()).find(|l| l.contains("Can't parse")) {
            let line = PARSE_POSITION
                .as_ref()
                .and_then(|re| re.captures(message))
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            return Err(RewriteError::Syntax {
                line,
                message: message.trim().to_string(),
            });
        }
        if !output.status.success() {
            let detail = stderr.trim();
            return Err(RewriteError::Unsupported(format!(
                "`{}` exited with {}{}{}",
                self.program,
                output.status,
                if detail.is_empty() { "" } else { ": " },
                detail
            )));
        }

        std::fs::read_to_string(tmp.path())
            .map_err(|e| RewriteError::Unsupported(format!("cannot read engine output: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Built-in print converter
// ---------------------------------------------------------------------------

/// Converts print statements to print calls and leaves every other line
/// untouched.
///
/// Handles `print x, y`, a trailing comma (`end=' '`), the chevron form
/// `print >>f, x` and a trailing comment. Statements continued onto the
/// next line and lines inside triple-quoted strings are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintRewriter;

impl PrintRewriter {
    pub fn convert_line(line: &str) -> Option<String> {
        let indent_len = line.len() - line.trim_start().len();
        let (indent, body) = line.split_at(indent_len);
        let rest = body.strip_prefix("print")?;
        if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
            return None;
        }

        let (code, comment) = split_comment(rest);
        let args = code.trim();
        if args.starts_with('(') || args.starts_with('=') || args.ends_with('\\') {
            return None;
        }
        if !balanced(args) {
            return None;
        }

        let mut parts: Vec<String> = Vec::new();
        let mut file = None;
        let mut args = args;
        if let Some(chevron) = args.strip_prefix(">>") {
            let pieces = split_top_level(chevron);
            let target = pieces.first()?;
            if target.trim().is_empty() {
                return None;
            }
            file = Some(target.trim().to_string());
            let after = &chevron[target.len()..];
            args = after.strip_prefix(',').unwrap_or(after).trim();
        }

        let trailing_comma = args.ends_with(',');
        parts.extend(
            split_top_level(args)
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
        if trailing_comma {
            parts.push("end=' '".into());
        }
        if let Some(f) = file {
            parts.push(format!("file={f}"));
        }

        let mut out = format!("{indent}print({})", parts.join(", "));
        if let Some(comment) = comment {
            out.push_str("  ");
            out.push_str(comment.trim_start());
        }
        Some(out)
    }
}

impl Rewriter for PrintRewriter {
    fn name(&self) -> &str {
        BUILTIN_PRINT
    }

    fn rewrite(&self, text: &str) -> Result<String, RewriteError> {
        let mut out = String::with_capacity(text.len() + 16);
        let mut in_triple: Option<&str> = None;
        for chunk in text.split_inclusive('\n') {
            let (line, newline) = match chunk.strip_suffix('\n') {
                Some(l) => match l.strip_suffix('\r') {
                    Some(l2) => (l2, "\r\n"),
                    None => (l, "\n"),
                },
                None => (chunk, ""),
            };

            let converted = if in_triple.is_none() {
                Self::convert_line(line)
            } else {
                None
            };
            in_triple = track_triple_quotes(line, in_triple);

            out.push_str(converted.as_deref().unwrap_or(line));
            out.push_str(newline);
        }
        Ok(out)
    }
}

/// Split off a trailing `#` comment that is not inside a string literal.
fn split_comment(s: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => return (&s[..i], Some(&s[i..])),
            _ => {}
        }
    }
    (s, None)
}

/// Split on commas outside brackets and string literals.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}

/// True when brackets close and no string is left open on this line.
fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0 && quote.is_none()
}

/// Track whether the end of `line` is inside a triple-quoted string.
fn track_triple_quotes<'q>(line: &str, mut open: Option<&'q str>) -> Option<&'q str> {
    const DELIMS: [&str; 2] = ["\"\"\"", "'''"];
    let mut rest = line;
    loop {
        match open {
            Some(delim) => match rest.find(delim) {
                Some(i) => {
                    rest = &rest[i + 3..];
                    open = None;
                }
                None => return open,
            },
            None => {
                let next = DELIMS
                    .iter()
                    .filter_map(|d| rest.find(d).map(|i| (i, *d)))
                    .min_by_key(|(i, _)| *i);
                match next {
                    Some((i, delim)) => {
                        rest = &rest[i + 3..];
                        open = Some(delim);
                    }
                    None => return None,
                }
            }
        }
    }
}
