//! Client-side query compilation.
//!
//! A [`CompiledQuery`] splits SQL text around its `?` placeholders so parameters can be
//! interpolated client-side, and optionally records the `INSERT ... VALUES (...)` layout that
//! lets a protocol coalesce many parameter sets into one multi-row statement.

mod parsers;
mod scanner;

use parsers::{is_block_comment_end, is_block_comment_start, is_line_comment_start, keyword_eq};
use scanner::{State, is_word_byte, scan_word, skip_whitespace};

use crate::error::{Result, SqlPreparedError};
use crate::types::{ParameterSet, ParameterValue};

/// The parsed, immutable form of a prepared query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    sql: String,
    parts: Vec<String>,
    rewrite: Option<RewriteParts>,
    no_backslash_escapes: bool,
}

/// Layout of a single-row `INSERT ... VALUES (...)` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteParts {
    /// Everything before the values group, e.g. `INSERT INTO t (a, b) VALUES `.
    pub prefix: String,
    /// The values group split around its placeholders, e.g. `["(", ", ", ")"]`.
    pub value_parts: Vec<String>,
    /// Everything after the values group, e.g. ` ON DUPLICATE KEY UPDATE ...`.
    pub suffix: String,
}

#[derive(Debug, Default)]
struct Scan {
    placeholders: Vec<usize>,
    values_group: Option<(usize, usize)>,
    is_insert: bool,
    multi_statement: bool,
}

impl CompiledQuery {
    /// Compile `sql` into its placeholder-delimited parts.
    #[must_use]
    pub fn parameter_parts(sql: &str, no_backslash_escapes: bool) -> Self {
        let scan = scan(sql, no_backslash_escapes);
        Self {
            sql: sql.to_owned(),
            parts: split_at_placeholders(sql, 0, sql.len(), &scan.placeholders),
            rewrite: None,
            no_backslash_escapes,
        }
    }

    /// Compile `sql` and, when it is a single-row insert whose placeholders all sit inside the
    /// values group, record the layout needed for multi-row rewriting.
    #[must_use]
    pub fn rewritable_parts(sql: &str, no_backslash_escapes: bool) -> Self {
        let scan = scan(sql, no_backslash_escapes);
        let rewrite = rewrite_layout(sql, &scan);
        Self {
            sql: sql.to_owned(),
            parts: split_at_placeholders(sql, 0, sql.len(), &scan.placeholders),
            rewrite,
            no_backslash_escapes,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.parts.len() - 1
    }

    /// SQL fragments between placeholders; always `param_count() + 1` entries.
    #[must_use]
    pub fn query_parts(&self) -> &[String] {
        &self.parts
    }

    #[must_use]
    pub fn rewrite_parts(&self) -> Option<&RewriteParts> {
        self.rewrite.as_ref()
    }

    #[must_use]
    pub fn is_rewritable(&self) -> bool {
        self.rewrite.is_some()
    }

    #[must_use]
    pub fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }

    /// Interpolate `params` into the query as SQL literals.
    ///
    /// # Errors
    /// Returns `SqlPreparedError::UnboundParameter` when fewer values than placeholders are given.
    pub fn render(&self, params: &[ParameterValue]) -> Result<String> {
        if params.len() < self.param_count() {
            return Err(SqlPreparedError::UnboundParameter {
                position: params.len() + 1,
                param_count: self.param_count(),
            });
        }
        let mut out = String::with_capacity(self.sql.len() + params.len() * 8);
        out.push_str(&self.parts[0]);
        for (part, param) in self.parts[1..].iter().zip(params) {
            param.write_sql(&mut out, self.no_backslash_escapes);
            out.push_str(part);
        }
        Ok(out)
    }

    /// Render all `entries` as one multi-row insert, or `None` when the query is not
    /// rewritable or there is nothing to render.
    #[must_use]
    pub fn render_multi_values(&self, entries: &[ParameterSet]) -> Option<String> {
        let rewrite = self.rewrite.as_ref()?;
        if entries.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(rewrite.prefix.len() + entries.len() * 16);
        out.push_str(&rewrite.prefix);
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&rewrite.value_parts[0]);
            for (part, param) in rewrite.value_parts[1..].iter().zip(entry.values()) {
                param.write_sql(&mut out, self.no_backslash_escapes);
                out.push_str(part);
            }
        }
        out.push_str(&rewrite.suffix);
        Some(out)
    }
}

fn split_at_placeholders(sql: &str, start: usize, end: usize, placeholders: &[usize]) -> Vec<String> {
    let mut parts = Vec::with_capacity(placeholders.len() + 1);
    let mut last = start;
    for &pos in placeholders.iter().filter(|&&p| p >= start && p < end) {
        parts.push(sql[last..pos].to_string());
        last = pos + 1;
    }
    parts.push(sql[last..end].to_string());
    parts
}

fn rewrite_layout(sql: &str, scan: &Scan) -> Option<RewriteParts> {
    if !scan.is_insert || scan.multi_statement {
        return None;
    }
    let (open, close) = scan.values_group?;
    if scan.placeholders.iter().any(|&p| p < open || p > close) {
        return None;
    }
    let suffix = &sql[close + 1..];
    // Already a multi-row insert.
    if suffix.trim_start().starts_with(',') {
        return None;
    }
    Some(RewriteParts {
        prefix: sql[..open].to_string(),
        value_parts: split_at_placeholders(sql, open, close + 1, &scan.placeholders),
        suffix: suffix.to_string(),
    })
}

fn scan(sql: &str, no_backslash_escapes: bool) -> Scan {
    let bytes = sql.as_bytes();
    let mut out = Scan::default();
    let mut state = State::Normal;
    let mut idx = 0;
    let mut depth: u32 = 0;
    let mut first_word = true;
    let mut values_seen = false;
    let mut awaiting_group = false;
    let mut group_open: Option<usize> = None;
    let mut statement_ended = false;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if statement_ended
                    && !b.is_ascii_whitespace()
                    && b != b';'
                    && !is_line_comment_start(bytes, idx)
                    && !is_block_comment_start(bytes, idx)
                {
                    out.multi_statement = true;
                }
                match b {
                    b'\'' => state = State::SingleQuoted,
                    b'"' => state = State::DoubleQuoted,
                    b'`' => state = State::Backtick,
                    _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                    _ if is_block_comment_start(bytes, idx) => {
                        state = State::BlockComment;
                        idx += 1;
                    }
                    b'?' => out.placeholders.push(idx),
                    b';' => statement_ended = true,
                    b'(' => {
                        if awaiting_group && depth == 0 {
                            group_open = Some(idx);
                            awaiting_group = false;
                        }
                        depth += 1;
                    }
                    b')' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0
                            && out.values_group.is_none()
                            && let Some(open) = group_open
                        {
                            out.values_group = Some((open, idx));
                        }
                    }
                    _ if is_word_byte(b) && (idx == 0 || !is_word_byte(bytes[idx - 1])) => {
                        let end = scan_word(bytes, idx);
                        let word = &bytes[idx..end];
                        if first_word {
                            out.is_insert =
                                keyword_eq(word, "INSERT") || keyword_eq(word, "REPLACE");
                            first_word = false;
                        } else if depth == 0
                            && !values_seen
                            && (keyword_eq(word, "VALUES") || keyword_eq(word, "VALUE"))
                        {
                            values_seen = true;
                            awaiting_group = bytes.get(skip_whitespace(bytes, end)) == Some(&b'(');
                        }
                        idx = end - 1;
                    }
                    _ => {}
                }
            }
            State::SingleQuoted | State::DoubleQuoted | State::Backtick => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if b == b'\\' && quote != b'`' && !no_backslash_escapes {
                    idx += 1; // skip escaped character
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    out
}
