//! Line matcher: runs a rule catalog over source text.
//!
//! Every rule is evaluated on every line and all matches are reported, so
//! one line may yield several findings. Results are sorted by
//! `(line, column, rule declaration order)` and are byte-identical across
//! runs for identical input.
//!
//! Matches anchored inside a string literal or a `#` comment are dropped.
//! Triple-quoted strings are tracked across lines.

use crate::compat::catalog::{self, PatternRule};
use crate::config::schema::DEFAULT_MAX_CODE_LENGTH;
use crate::error::{MigrateError, Result};
use crate::types::Finding;

/// How many continuation lines a multi-line rule may pull in.
const LOOKAHEAD_LINES: usize = 3;

/// Scans text against a rule slice.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'r> {
    rules: &'r [PatternRule],
    max_length: usize,
}

impl Matcher<'static> {
    /// Matcher over the bundled compatibility catalog.
    pub fn compat() -> Self {
        Self::new(catalog::rules())
    }

    /// Matcher over the bundled review-hazard catalog.
    pub fn hazards() -> Self {
        Self::new(catalog::hazards())
    }
}

impl<'r> Matcher<'r> {
    pub fn new(rules: &'r [PatternRule]) -> Self {
        Self {
            rules,
            max_length: DEFAULT_MAX_CODE_LENGTH,
        }
    }

    /// Override the maximum input length in characters.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn rules(&self) -> &'r [PatternRule] {
        self.rules
    }

    /// Scan `text` and return located findings attributed to `file_path`.
    ///
    /// Fails with [`MigrateError::InputTooLarge`] when `text` is longer than
    /// the configured maximum; input is never truncated.
    pub fn scan(&self, text: &str, file_path: &str) -> Result<Vec<Finding>> {
        check_length(text, self.max_length)?;

        let lines: Vec<&str> = text.lines().collect();
        let literals = literal_spans(&lines);
        let mut hits: Vec<(usize, Finding)> = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            if is_header_line(line_no, line) {
                continue;
            }
            for (order, rule) in self.rules.iter().enumerate() {
                let window;
                let haystack: &str = if rule.multiline && (has_open_paren(line) || continues(line)) {
                    window = join_window(&lines, idx);
                    &window
                } else {
                    line
                };
                for m in rule.find_in(haystack) {
                    // Matches that start in a continuation line belong to
                    // that line's own pass.
                    if m.anchor.0 >= line.len() || in_literal(&literals[idx], m.anchor.0) {
                        continue;
                    }
                    let column = line[..m.anchor.0].chars().count() + 1;
                    hits.push((
                        order,
                        Finding {
                            file: file_path.to_string(),
                            line: line_no,
                            column,
                            rule_id: rule.id,
                            rule_name: rule.name,
                            category: rule.category,
                            severity: rule.severity,
                            message: rule.description,
                            suggested_fix: rule.suggested_fix,
                            snippet: line.trim().to_string(),
                            matched: haystack[m.whole.0..m.whole.1].to_string(),
                        },
                    ));
                }
            }
        }

        hits.sort_by(|(oa, a), (ob, b)| (a.line, a.column, *oa).cmp(&(b.line, b.column, *ob)));
        Ok(hits.into_iter().map(|(_, f)| f).collect())
    }
}

/// Scan `text` against the bundled compatibility catalog.
pub fn scan(text: &str, file_path: &str) -> Result<Vec<Finding>> {
    Matcher::compat().scan(text, file_path)
}

/// Fail when `text` exceeds `limit` characters.
pub fn check_length(text: &str, limit: usize) -> Result<()> {
    // Byte length bounds the char count from above.
    if text.len() <= limit {
        return Ok(());
    }
    let length = text.chars().count();
    if length > limit {
        return Err(MigrateError::InputTooLarge { length, limit });
    }
    Ok(())
}

/// Shebang and encoding declarations on the first two lines are skipped.
fn is_header_line(line_no: usize, line: &str) -> bool {
    line_no <= 2 && (line.starts_with("#!") || line.contains("coding"))
}

fn paren_balance(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

fn has_open_paren(line: &str) -> bool {
    paren_balance(line) > 0
}

/// Explicit backslash line continuation.
fn continues(line: &str) -> bool {
    line.trim_end().ends_with('\\')
}

fn without_continuation(line: &str) -> &str {
    let trimmed = line.trim_end();
    trimmed.strip_suffix('\\').unwrap_or(line)
}

/// `lines[idx]` joined with continuation lines until parentheses balance
/// and no backslash continuation is pending, at most [`LOOKAHEAD_LINES`]
/// extra lines. The first line keeps its byte offsets.
fn join_window(lines: &[&str], idx: usize) -> String {
    let first = lines[idx];
    let mut joined = without_continuation(first).to_string();
    let mut balance = paren_balance(first);
    for next in lines.iter().skip(idx + 1).take(LOOKAHEAD_LINES) {
        joined.push(' ');
        joined.push_str(without_continuation(next.trim()));
        balance += paren_balance(next);
        if balance <= 0 && !continues(next) {
            break;
        }
    }
    joined
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    quote: u8,
    triple: bool,
}

/// Byte ranges per line covered by string literals (quotes included) or
/// comments. Prefixes such as `u` or `r` stay outside the range.
fn literal_spans(lines: &[&str]) -> Vec<Vec<(usize, usize)>> {
    let mut open: Option<OpenString> = None;
    lines
        .iter()
        .map(|line| {
            let bytes = line.as_bytes();
            let mut spans = Vec::new();
            let mut start = 0;
            let mut i = 0;
            while i < bytes.len() {
                match open {
                    Some(s) => {
                        if bytes[i] == b'\\' {
                            i += 2;
                        } else if bytes[i] == s.quote
                            && (!s.triple || bytes[i..].starts_with(&[s.quote; 3]))
                        {
                            i += if s.triple { 3 } else { 1 };
                            spans.push((start, i));
                            open = None;
                        } else {
                            i += 1;
                        }
                    }
                    None => match bytes[i] {
                        b'#' => {
                            spans.push((i, bytes.len()));
                            i = bytes.len();
                        }
                        quote @ (b'\'' | b'"') => {
                            let triple = bytes[i..].starts_with(&[quote; 3]);
                            open = Some(OpenString { quote, triple });
                            start = i;
                            i += if triple { 3 } else { 1 };
                        }
                        _ => i += 1,
                    },
                }
            }
            if let Some(s) = open {
                spans.push((start, bytes.len()));
                if !s.triple {
                    open = None;
                }
            }
            spans
        })
        .collect()
}

fn in_literal(spans: &[(usize, usize)], at: usize) -> bool {
    spans.iter().any(|&(start, end)| start <= at && at < end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
