//! Position-tracked rewriting of one source file.
//!
//! The file is split into tokens that cover every character exactly once,
//! then walked with a running (line, column) cursor. A token is replaced only
//! when the cursor sits exactly on the next pending reference; everything
//! else is copied through untouched.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::{FileReferenceSet, NameTable};

/// Comment delimiters, word runs of at most 99 characters, or any single
/// other character (punctuation, whitespace, brackets, newline, non-ASCII).
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)//|/\*|\*/|[A-Za-z0-9_]{1,99}|.").unwrap());

/// Split `text` into tokens whose concatenation is exactly `text`.
pub fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No token starts at the reported coordinate.
    NoTokenBoundary,
    /// A token starts there, but its text is not a protected name.
    NotInTable,
}

/// A reference the rewriter could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedReference {
    pub line: usize,
    pub column: usize,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub content: String,
    pub substitutions: usize,
    pub skipped: Vec<SkippedReference>,
}

impl RewriteOutcome {
    pub fn changed(&self) -> bool {
        self.substitutions > 0
    }
}

/// Rewrite `text` at exactly the positions listed in `references`.
///
/// The table is only read; a coordinate that does not line up with a token
/// is skipped and reported instead of shifting later substitutions.
pub fn rewrite(text: &str, references: &FileReferenceSet, table: &NameTable) -> RewriteOutcome {
    let mut output = String::with_capacity(text.len());
    let mut pending = references.records().iter().peekable();
    let mut skipped = Vec::new();
    let mut substitutions = 0;
    let (mut line, mut column) = (1usize, 1usize);

    for token in tokenize(text) {
        while let Some(record) = pending.peek() {
            if record.position() >= (line, column) {
                break;
            }
            skipped.push(SkippedReference {
                line: record.line,
                column: record.column,
                name: record.name.clone(),
                reason: SkipReason::NoTokenBoundary,
            });
            pending.next();
        }

        let mut replacement: Option<&str> = None;
        if let Some(record) = pending.peek() {
            if record.position() == (line, column) {
                match table.get(token) {
                    Some(generated) => {
                        replacement = Some(generated);
                        substitutions += 1;
                    }
                    None => skipped.push(SkippedReference {
                        line: record.line,
                        column: record.column,
                        name: record.name.clone(),
                        reason: SkipReason::NotInTable,
                    }),
                }
                pending.next();
            }
        }
        output.push_str(replacement.unwrap_or(token));

        if token == "\n" {
            line += 1;
            column = 1;
        } else {
            column += token.chars().count();
        }
    }

    skipped.extend(pending.map(|record| SkippedReference {
        line: record.line,
        column: record.column,
        name: record.name.clone(),
        reason: SkipReason::NoTokenBoundary,
    }));

    RewriteOutcome {
        content: output,
        substitutions,
        skipped,
    }
}
