//! Python 3 syntax validity via tree-sitter-python.
//!
//! The grammar is only an oracle here: is the text parseable, and if not,
//! where is the first problem. Findings never come from the tree.
//!
//! tree-sitter-python also accepts Python 2 statements, so a clean parse is
//! followed by a walk that rejects constructs Python 3 cannot compile.

use serde::Serialize;
use tree_sitter::Node;

use crate::error::{MigrateError, Result};

/// Outcome of a syntax check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyntaxIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// The text does not parse at all.
    Invalid,
    /// Parses only as Python 2.
    Python2,
}

/// The first problem in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxIssue {
    pub kind: IssueKind,
    /// 1-based.
    pub line: usize,
    /// 1-based, in bytes.
    pub column: usize,
    pub message: String,
    pub snippet: String,
}

/// Parse `text` and report whether it is free of syntax errors.
///
/// A fresh parser is created per call; `tree_sitter::Parser` is not `Sync`.
pub fn check_syntax(text: &str) -> Result<SyntaxCheck> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| MigrateError::Parser(format!("language version mismatch: {e}")))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| MigrateError::Parser("tree-sitter returned no tree".into()))?;

    let root = tree.root_node();
    let issue_at = |kind: IssueKind, pos: tree_sitter::Point, message: String| SyntaxIssue {
        kind,
        line: pos.row + 1,
        column: pos.column + 1,
        message,
        snippet: text.lines().nth(pos.row).unwrap_or("").trim().to_string(),
    };

    if root.has_error() {
        let issue = first_problem(root).map(|node| {
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            issue_at(IssueKind::Invalid, node.start_position(), message)
        });
        return Ok(SyntaxCheck {
            valid: false,
            error: issue,
        });
    }

    let legacy = [first_legacy_node(root, text), first_legacy_token(root, text)]
        .into_iter()
        .flatten()
        .min_by_key(|(pos, _)| (pos.row, pos.column));
    Ok(match legacy {
        Some((pos, what)) => SyntaxCheck {
            valid: false,
            error: Some(issue_at(
                IssueKind::Python2,
                pos,
                format!("{what} is Python 2 only syntax"),
            )),
        },
        None => SyntaxCheck {
            valid: true,
            error: None,
        },
    })
}

fn is_literal(kind: &str) -> bool {
    matches!(kind, "string" | "comment" | "concatenated_string")
}

fn has_child(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

/// `0755`, `10L`: integer forms Python 3 removed.
fn legacy_integer(literal: &str) -> bool {
    if literal.ends_with(['l', 'L']) {
        return true;
    }
    let digits = literal.replace('_', "");
    digits.len() > 1
        && digits.starts_with('0')
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0')
}

fn legacy_kind(node: Node<'_>, text: &str) -> Option<&'static str> {
    match node.kind() {
        "print_statement" => Some("print statement"),
        "exec_statement" => Some("exec statement"),
        "except_clause" if has_child(node, ",") || has_child(node, "expression_list") => {
            Some("`except X, e`")
        }
        "raise_statement" if has_child(node, "expression_list") => Some("`raise E, msg`"),
        "integer" => node
            .utf8_text(text.as_bytes())
            .ok()
            .filter(|t| legacy_integer(t))
            .map(|_| "old integer literal"),
        _ => None,
    }
}

/// Pre-order walk, skipping strings and comments.
fn first_legacy_node(root: Node<'_>, text: &str) -> Option<(tree_sitter::Point, &'static str)> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(what) = legacy_kind(node, text) {
            return Some((node.start_position(), what));
        }
        if is_literal(node.kind()) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Backticks and `<>` outside strings and comments.
fn first_legacy_token(root: Node<'_>, text: &str) -> Option<(tree_sitter::Point, &'static str)> {
    let candidates = text
        .match_indices('`')
        .map(|(i, _)| (i, "backtick repr"))
        .chain(text.match_indices("<>").map(|(i, _)| (i, "`<>` operator")));
    candidates
        .filter(|(offset, _)| !inside_literal(root, *offset))
        .min_by_key(|(offset, _)| *offset)
        .map(|(offset, what)| {
            let row = text[..offset].matches('\n').count();
            let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
            (
                tree_sitter::Point {
                    row,
                    column: offset - line_start,
                },
                what,
            )
        })
}

fn inside_literal(root: Node<'_>, offset: usize) -> bool {
    let mut node = root.descendant_for_byte_range(offset, offset + 1);
    while let Some(n) = node {
        if is_literal(n.kind()) {
            return true;
        }
        node = n.parent();
    }
    false
}

/// Pre-order search for the first ERROR or MISSING node, descending only
/// into subtrees that contain one.
fn first_problem(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}
