//! Bundled pattern catalogs.
//!
//! Two immutable tables, compiled once per process:
//! - [`rules`]: Python 2 compatibility rules across the six compat categories.
//! - [`hazards`]: constructs whose Python 3 behavior cannot be proven equal by
//!   text matching (division, encoding, serialization, dynamic code).
//!
//! The `regex` crate has no look-around, so rules carry [`Guard`]s that
//! filter candidate matches by their surrounding text instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Category, Severity};

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Context check applied to a candidate match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The text before the match must not end with this literal.
    NotAfter(&'static str),
    /// The text before the match must not end with any of these characters.
    NotAfterAny(&'static str),
    /// The text after the match must not start with this literal.
    NotBefore(&'static str),
    /// The text after the match must not start with any of these characters.
    NotBeforeAny(&'static str),
    /// The whole line must not contain this literal.
    LineLacks(&'static str),
    /// No `#` may appear before the match.
    OutsideComment,
}

impl Guard {
    fn allows(&self, line: &str, start: usize, end: usize) -> bool {
        let before = &line[..start];
        let after = &line[end..];
        match *self {
            Self::NotAfter(lit) => !before.ends_with(lit),
            Self::NotAfterAny(set) => before.chars().next_back().map_or(true, |c| !set.contains(c)),
            Self::NotBefore(lit) => !after.starts_with(lit),
            Self::NotBeforeAny(set) => after.chars().next().map_or(true, |c| !set.contains(c)),
            Self::LineLacks(lit) => !line.contains(lit),
            Self::OutsideComment => !before.contains('#'),
        }
    }
}

// ---------------------------------------------------------------------------
// PatternRule
// ---------------------------------------------------------------------------

/// One legacy-pattern rule. Immutable once compiled.
#[derive(Debug)]
pub struct PatternRule {
    /// Stable code, e.g. `PY2-SYN-001`.
    pub id: &'static str,
    /// Stable slug, e.g. `print-statement`.
    pub name: &'static str,
    pub category: Category,
    pub severity: Severity,
    /// Source of the compiled regex.
    pub pattern: &'static str,
    pub description: &'static str,
    pub suggested_fix: Option<&'static str>,
    /// Join continuation lines while parentheses are open before matching.
    pub multiline: bool,
    guards: &'static [Guard],
    regex: Regex,
}

/// A match span in a line: `anchor` is where the finding is located (the
/// `at` capture group when the pattern has one), `whole` the full match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub anchor: (usize, usize),
    pub whole: (usize, usize),
}

impl PatternRule {
    /// All guarded, non-overlapping matches of this rule in `line`.
    pub fn find_in(&self, line: &str) -> Vec<RuleMatch> {
        let mut out = Vec::new();
        for caps in self.regex.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            let anchor = caps.name("at").unwrap_or(whole);
            if self
                .guards
                .iter()
                .all(|g| g.allows(line, anchor.start(), anchor.end()))
            {
                out.push(RuleMatch {
                    anchor: (anchor.start(), anchor.end()),
                    whole: (whole.start(), whole.end()),
                });
            }
        }
        out
    }

    /// Whether the rule matches anywhere in `line`.
    pub fn is_match(&self, line: &str) -> bool {
        !self.find_in(line).is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rule definitions
// ---------------------------------------------------------------------------

struct RuleDef {
    id: &'static str,
    name: &'static str,
    category: Category,
    severity: Severity,
    pattern: &'static str,
    guards: &'static [Guard],
    multiline: bool,
    description: &'static str,
    fix: Option<&'static str>,
}

const fn entry(
    id: &'static str,
    name: &'static str,
    category: Category,
    severity: Severity,
    pattern: &'static str,
    description: &'static str,
    fix: &'static str,
) -> RuleDef {
    RuleDef {
        id,
        name,
        category,
        severity,
        pattern,
        guards: &[],
        multiline: false,
        description,
        fix: Some(fix),
    }
}

impl RuleDef {
    const fn guarded(mut self, guards: &'static [Guard]) -> Self {
        self.guards = guards;
        self
    }

    const fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }
}

use Category::*;
use Guard::*;
use Severity::{Error as E, Info as I, Warning as W};

const NOT_ATTR: &[Guard] = &[NotAfter(".")];

#[rustfmt::skip]
const COMPAT_SPECS: &[RuleDef] = &[
    // -- iterators ----------------------------------------------------------
    entry("PY2-ITER-001", "xrange", Iterators, E, r"\bxrange\s*\(",
        "xrange() is not available in Python 3", "Use range() instead"),
    entry("PY2-ITER-002", "dict-iteritems", Iterators, E, r"\.iteritems\s*\(",
        "dict.iteritems() is not available in Python 3", "Use dict.items() instead"),
    entry("PY2-ITER-003", "dict-itervalues", Iterators, E, r"\.itervalues\s*\(",
        "dict.itervalues() is not available in Python 3", "Use dict.values() instead"),
    entry("PY2-ITER-004", "dict-iterkeys", Iterators, E, r"\.iterkeys\s*\(",
        "dict.iterkeys() is not available in Python 3", "Use dict.keys() instead"),
    entry("PY2-ITER-005", "dict-has-key", Iterators, E, r"\.has_key\s*\(",
        "dict.has_key() is not available in Python 3", "Use 'key in dict' instead"),
    entry("PY2-ITER-006", "dict-viewitems", Iterators, W, r"\.viewitems\s*\(",
        "dict.viewitems() is not available in Python 3", "Use dict.items() instead"),
    entry("PY2-ITER-007", "dict-viewkeys", Iterators, W, r"\.viewkeys\s*\(",
        "dict.viewkeys() is not available in Python 3", "Use dict.keys() instead"),
    entry("PY2-ITER-008", "dict-viewvalues", Iterators, W, r"\.viewvalues\s*\(",
        "dict.viewvalues() is not available in Python 3", "Use dict.values() instead"),
    // -- text-types ---------------------------------------------------------
    entry("PY2-TYPE-001", "unicode-builtin", TextTypes, E, r"\bunicode\s*\(",
        "unicode() is not available in Python 3", "Use str() instead")
        .guarded(NOT_ATTR),
    entry("PY2-TYPE-002", "long-suffix", TextTypes, E, r"\b(?:0[xX][0-9a-fA-F]+|\d+)[lL]\b",
        "Long integer suffix L is not valid in Python 3", "Remove the L suffix")
        .guarded(&[NotAfterAny(".")]),
    entry("PY2-TYPE-003", "basestring", TextTypes, E, r"\bbasestring\b",
        "basestring is not available in Python 3", "Use str instead"),
    entry("PY2-TYPE-004", "unicode-literal", TextTypes, I, r#"\bu["']"#,
        "Unicode literal prefix u'' is unnecessary in Python 3",
        "Remove the u prefix (all strings are unicode in Python 3)"),
    // -- operators ----------------------------------------------------------
    entry("PY2-OP-001", "not-equal-diamond", Operators, E, r"<>",
        "<> comparison operator is not valid in Python 3", "Use != instead"),
    entry("PY2-OP-002", "backtick-repr", Operators, E, r"`[^`]+`",
        "Backticks for repr are not valid in Python 3", "Use repr() instead")
        .guarded(&[OutsideComment]),
    // -- syntax -------------------------------------------------------------
    entry("PY2-SYN-001", "print-statement", Syntax, E, r"^[^#]*?\b(?P<at>print)\s+[^(=\s]",
        "Print statement syntax is not valid in Python 3", "Use print() function instead"),
    entry("PY2-SYN-002", "except-comma", Syntax, E,
        r"\bexcept\s+(?:[\w.]+|\([^)]*\))\s*,\s*\w+\s*:",
        "Old except syntax with comma is not valid in Python 3",
        "Use 'except Exception as e:' instead")
        .multiline(),
    entry("PY2-SYN-003", "raise-comma", Syntax, E, r"\braise\s+[\w.]+\s*,",
        "Old raise syntax is not valid in Python 3",
        "Use raise Exception('message') instead")
        .multiline(),
    entry("PY2-SYN-004", "exec-statement", Syntax, E, r"^[^#]*?\b(?P<at>exec)\s+[^(=\s]",
        "exec statement syntax is not valid in Python 3", "Use exec() function instead"),
    entry("PY2-SYN-005", "octal-literal", Syntax, E, r"\b0\d{2,}\b",
        "Old octal literal is not valid in Python 3", "Use the 0o prefix (0o755)")
        .guarded(&[NotAfterAny("."), OutsideComment]),
    // -- stdlib-move --------------------------------------------------------
    entry("PY2-LIB-001", "configparser", StdlibMove, E, r"\bConfigParser\b",
        "ConfigParser module was renamed in Python 3", "Use 'import configparser' instead")
        .guarded(&[NotAfter("."), LineLacks("configparser")]),
    entry("PY2-LIB-002", "stringio", StdlibMove, E, r"\bStringIO\b",
        "StringIO module was moved in Python 3", "Use 'from io import StringIO' instead")
        .guarded(&[NotBefore("."), NotAfter("io."), LineLacks("from io import")]),
    entry("PY2-LIB-003", "cstringio", StdlibMove, E, r"\bcStringIO\b",
        "cStringIO is not available in Python 3", "Use 'from io import StringIO' instead"),
    entry("PY2-LIB-004", "cpickle", StdlibMove, E, r"\bcPickle\b",
        "cPickle is not available in Python 3",
        "Use 'import pickle' instead (it's fast in Python 3)"),
    entry("PY2-LIB-005", "queue", StdlibMove, E, r"\bQueue\b",
        "Queue module was renamed in Python 3", "Use 'import queue' instead")
        .guarded(&[NotAfter("."), LineLacks("from queue import")]),
    entry("PY2-LIB-006", "urllib2", StdlibMove, E, r"\burllib2\b",
        "urllib2 is not available in Python 3", "Use urllib.request and urllib.error instead"),
    entry("PY2-LIB-007", "urlparse", StdlibMove, E, r"\burlparse\b",
        "urlparse module was moved in Python 3", "Use urllib.parse instead")
        .guarded(&[NotAfter("."), LineLacks("urllib.parse")]),
    entry("PY2-LIB-008", "httplib", StdlibMove, E, r"\bhttplib\b",
        "httplib was renamed in Python 3", "Use http.client instead"),
    entry("PY2-LIB-009", "htmlparser", StdlibMove, E, r"\bHTMLParser\b",
        "HTMLParser module was moved in Python 3", "Use html.parser instead")
        .guarded(&[NotAfter("."), LineLacks("html.parser")]),
    entry("PY2-LIB-010", "tkinter", StdlibMove, E, r"\bTkinter\b",
        "Tkinter was renamed in Python 3", "Use 'import tkinter' instead"),
    entry("PY2-LIB-011", "cookielib", StdlibMove, E, r"\bcookielib\b",
        "cookielib was renamed in Python 3", "Use http.cookiejar instead"),
    entry("PY2-LIB-012", "thread-module", StdlibMove, W,
        r"^\s*(?:import|from)\s+(?P<at>thread)\b",
        "thread module was renamed in Python 3", "Use threading (or _thread) instead"),
    entry("PY2-LIB-013", "commands-module", StdlibMove, W,
        r"^\s*(?:import|from)\s+(?P<at>commands)\b",
        "commands module was removed in Python 3", "Use subprocess instead"),
    // -- builtins -----------------------------------------------------------
    entry("PY2-BUILTIN-001", "raw-input", Builtins, E, r"\braw_input\s*\(",
        "raw_input() is not available in Python 3", "Use input() instead"),
    entry("PY2-BUILTIN-002", "execfile", Builtins, E, r"\bexecfile\s*\(",
        "execfile() is not available in Python 3", "Use exec(open(file).read()) instead"),
    entry("PY2-BUILTIN-003", "reduce", Builtins, W, r"\breduce\s*\(",
        "reduce() was moved to functools in Python 3", "Use 'from functools import reduce'")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-004", "apply", Builtins, E, r"\bapply\s*\(",
        "apply() is not available in Python 3", "Use func(*args, **kwargs) instead")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-005", "file-builtin", Builtins, E, r"\bfile\s*\(",
        "file() builtin is not available in Python 3", "Use open() instead")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-006", "cmp-builtin", Builtins, E, r"\bcmp\s*\(",
        "cmp() is not available in Python 3",
        "Use (a > b) - (a < b) or functools.cmp_to_key")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-007", "coerce", Builtins, E, r"\bcoerce\s*\(",
        "coerce() was removed in Python 3", "Convert operands explicitly")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-008", "intern", Builtins, W, r"\bintern\s*\(",
        "intern() was moved to sys in Python 3", "Use sys.intern() instead")
        .guarded(NOT_ATTR),
    entry("PY2-BUILTIN-009", "buffer", Builtins, E, r"\bbuffer\s*\(",
        "buffer() is not available in Python 3", "Use memoryview() instead")
        .guarded(NOT_ATTR),
];

#[rustfmt::skip]
const HAZARD_SPECS: &[RuleDef] = &[
    entry("PY2-REVIEW-001", "exec-call", Runtime, E, r"\bexec\s*\(",
        "Dynamic code execution may behave differently in Python 3",
        "Check the executed code is Python 3 and the namespace arguments are explicit")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-002", "eval-call", Runtime, W, r"\beval\s*\(",
        "Dynamic evaluation may behave differently with str/bytes",
        "Confirm the evaluated input is text, not bytes")
        .guarded(&[OutsideComment, NotAfter(".")]),
    entry("PY2-REVIEW-003", "division", Division, E, r"/",
        "Division returns float in Python 3 (was int for int operands in Python 2)",
        "Use // where integer division is intended")
        .guarded(&[
            NotAfterAny("/0123456789"),
            NotBeforeAny("/0123456789*"),
            OutsideComment,
            LineLacks("://"),
            LineLacks("import"),
        ]),
    entry("PY2-REVIEW-004", "open-call", Encoding, W, r"\bopen\s*\([^)]+\)",
        "Default file encoding changed; an explicit encoding may be needed",
        "Pass encoding= or open in binary mode")
        .guarded(&[OutsideComment, LineLacks("encoding=")]),
    entry("PY2-REVIEW-005", "encode-decode", Encoding, W, r"\.(?:en|de)code\s*\(",
        "str/bytes handling changed significantly",
        "Verify the value is bytes before decode and str before encode")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-006", "pickle", Serialization, W, r"\bpickle\b",
        "Pickle protocol and str/bytes payloads differ between Python 2 and 3",
        "Test loading data pickled by Python 2 (encoding='latin1')")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-007", "socket", Encoding, W, r"\bsocket\b",
        "Socket data is bytes in Python 3", "Encode before send and decode after recv")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-008", "subprocess", Encoding, I, r"\bsubprocess\b",
        "Subprocess output is bytes by default in Python 3", "Pass text=True where text is expected")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-009", "std-streams", Encoding, I, r"\bsys\.std(?:in|out|err)\b",
        "Standard streams handle text differently in Python 3",
        "Use sys.stdout.buffer for bytes output")
        .guarded(&[OutsideComment]),
    entry("PY2-REVIEW-010", "metaclass-attribute", Runtime, E, r"\b__metaclass__\b",
        "__metaclass__ is ignored in Python 3", "Use class Foo(metaclass=Meta)"),
    entry("PY2-REVIEW-011", "sort-cmp", Runtime, E, r"(?:\.sort|\bsorted)\s*\([^)]*\bcmp\s*=",
        "cmp= parameter was removed from sorting in Python 3",
        "Use key=functools.cmp_to_key(cmp)"),
];

fn compile(defs: &'static [RuleDef]) -> Vec<PatternRule> {
    defs
        .iter()
        .filter_map(|s| match Regex::new(s.pattern) {
            Ok(regex) => Some(PatternRule {
                id: s.id,
                name: s.name,
                category: s.category,
                severity: s.severity,
                pattern: s.pattern,
                description: s.description,
                suggested_fix: s.fix,
                multiline: s.multiline,
                guards: s.guards,
                regex,
            }),
            Err(e) => {
                tracing::error!(rule = s.id, "bundled pattern failed to compile: {e}");
                None
            }
        })
        .collect()
}

static COMPAT_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| compile(COMPAT_SPECS));
static HAZARD_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| compile(HAZARD_SPECS));

/// Compatibility rules in declaration order.
pub fn rules() -> &'static [PatternRule] {
    &COMPAT_RULES
}

/// Review-hazard rules in declaration order.
pub fn hazards() -> &'static [PatternRule] {
    &HAZARD_RULES
}

/// Look a rule up by id (`PY2-SYN-001`) or name (`print-statement`) in
/// either catalog. Case-insensitive.
pub fn find_rule(key: &str) -> Option<&'static PatternRule> {
    let key = key.trim();
    rules()
        .iter()
        .chain(hazards())
        .find(|r| r.id.eq_ignore_ascii_case(key) || r.name.eq_ignore_ascii_case(key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
