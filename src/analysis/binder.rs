//! Parameter binder (component A).
//!
//! Inlines bound parameters into the SQL text so every later stage sees
//! literal values. Downstream analysis then depends on *values*, which is
//! exactly what we want for a per-value-set cache key, while ORM-level
//! placeholder noise (`?`, `$1`, `:name`) disappears before normalization.

use regex::Regex;

use crate::model::ParamValue;

/// A single bound argument: either a scalar or a list (for `IN (...)`
/// expansion). Kept distinct from `model::ConditionValue` because the
/// binder operates on raw call-site arguments, not yet on parsed SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Scalar(ParamValue),
    List(Vec<ParamValue>),
}

impl From<ParamValue> for BindValue {
    fn from(v: ParamValue) -> Self {
        BindValue::Scalar(v)
    }
}

/// Parameters supplied alongside a SQL statement: either positional
/// (`?`/`$N` styles) or named (`:name` style).
#[derive(Debug, Clone)]
pub enum Params {
    Positional(Vec<BindValue>),
    Named(std::collections::HashMap<String, BindValue>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Question,
    Dollar,
    Named,
}

/// Bind `params` into `sql`, returning the SQL with every detected
/// placeholder replaced by its literal rendering. Returns `sql` unchanged
/// when no parameter style is detected or `params` is absent/empty.
pub fn bind_parameters(sql: &str, params: Option<&Params>) -> String {
    let Some(params) = params else {
        return sql.to_string();
    };
    if params.is_empty() {
        return sql.to_string();
    }

    match detect_style(sql) {
        Some(Style::Question) => bind_question_style(sql, params),
        Some(Style::Dollar) => bind_dollar_style(sql, params),
        Some(Style::Named) => bind_named_style(sql, params),
        None => sql.to_string(),
    }
}

fn detect_style(sql: &str) -> Option<Style> {
    let quoted = quoted_ranges(sql);
    if find_unquoted(sql, '?', &quoted).is_some() {
        return Some(Style::Question);
    }
    let dollar_re = Regex::new(r"\$\d+").unwrap();
    if dollar_re
        .find_iter(sql)
        .any(|m| !in_ranges(m.start(), &quoted))
    {
        return Some(Style::Dollar);
    }
    let named_re = Regex::new(r":[A-Za-z_][A-Za-z0-9_]*").unwrap();
    for m in named_re.find_iter(sql) {
        if in_ranges(m.start(), &quoted) {
            continue;
        }
        // Don't treat `::cast` (double colon) as a named placeholder.
        if m.start() > 0 && sql.as_bytes()[m.start() - 1] == b':' {
            continue;
        }
        return Some(Style::Named);
    }
    None
}

/// Byte ranges covered by single-quoted string literals (`''` is the escaped
/// quote inside a literal), so placeholder detection ignores text that is
/// actually SQL string content.
fn quoted_ranges(sql: &str) -> Vec<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            let start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            ranges.push((start, i));
        } else {
            i += 1;
        }
    }
    ranges
}

fn in_ranges(pos: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|(s, e)| pos >= *s && pos < *e)
}

fn find_unquoted(sql: &str, needle: char, quoted: &[(usize, usize)]) -> Option<usize> {
    sql.char_indices()
        .find(|(i, c)| *c == needle && !in_ranges(*i, quoted))
        .map(|(i, _)| i)
}

fn render_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Null => "NULL".to_string(),
        ParamValue::Str(s) => format!("'{}'", s.replace('\'', "''")),
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Float(f) => f.to_string(),
        ParamValue::Bool(b) => b.to_string(),
    }
}

fn render_list_values(values: &[ParamValue]) -> String {
    values.iter().map(render_value).collect::<Vec<_>>().join(",")
}

/// Render a bound value at a placeholder site. `in_in_clause` indicates the
/// placeholder was found inside `IN ( <placeholder> )`, in which case the
/// surrounding parentheses already present in the SQL are reused rather than
/// adding a second pair.
fn render_bind_value(value: &BindValue, in_in_clause: bool) -> String {
    match value {
        BindValue::Scalar(v) => render_value(v),
        BindValue::List(values) => {
            let joined = render_list_values(values);
            if in_in_clause {
                joined
            } else {
                format!("({})", joined)
            }
        }
    }
}

fn bind_question_style(sql: &str, params: &Params) -> String {
    let Params::Positional(values) = params else {
        return sql.to_string();
    };

    let pattern = Regex::new(r"(?i)IN\s*\(\s*\?\s*\)|\?").unwrap();
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0;
    let mut param_idx = 0;

    for m in pattern.find_iter(sql) {
        out.push_str(&sql[last_end..m.start()]);
        let is_in_clause = m.as_str().len() > 1; // matched "IN ( ? )" rather than bare "?"

        if let Some(value) = values.get(param_idx) {
            if is_in_clause {
                let joined = render_bind_value(value, true);
                out.push_str("IN (");
                out.push_str(&joined);
                out.push(')');
            } else {
                out.push_str(&render_bind_value(value, false));
            }
            param_idx += 1;
        } else {
            // Unmatched placeholder remains verbatim.
            out.push_str(m.as_str());
        }
        last_end = m.end();
    }
    out.push_str(&sql[last_end..]);
    out
}

fn bind_dollar_style(sql: &str, params: &Params) -> String {
    let Params::Positional(values) = params else {
        return sql.to_string();
    };

    let pattern = Regex::new(r"(?i)IN\s*\(\s*\$(\d+)\s*\)|\$(\d+)").unwrap();
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0;

    for m in pattern.find_iter(sql) {
        out.push_str(&sql[last_end..m.start()]);
        let is_in_clause = m.as_str().to_uppercase().starts_with("IN");
        let idx_str = m
            .as_str()
            .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '$')
            .trim_matches(|c: char| !c.is_ascii_digit());
        let n: usize = idx_str.parse().unwrap_or(0);

        match n.checked_sub(1).and_then(|i| values.get(i)) {
            Some(value) => {
                if is_in_clause {
                    out.push_str("IN (");
                    out.push_str(&render_bind_value(value, true));
                    out.push(')');
                } else {
                    out.push_str(&render_bind_value(value, false));
                }
            }
            None => out.push_str(m.as_str()),
        }
        last_end = m.end();
    }
    out.push_str(&sql[last_end..]);
    out
}

fn bind_named_style(sql: &str, params: &Params) -> String {
    let Params::Named(map) = params else {
        return sql.to_string();
    };

    let pattern = Regex::new(r"(?i)IN\s*\(\s*:([A-Za-z_][A-Za-z0-9_]*)\s*\)|:([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    let mut out = String::with_capacity(sql.len());
    let mut last_end = 0;

    for m in pattern.find_iter(sql) {
        // Skip `::cast` — not a named placeholder.
        if m.start() > 0 && sql.as_bytes()[m.start() - 1] == b':' {
            continue;
        }
        out.push_str(&sql[last_end..m.start()]);
        let is_in_clause = m.as_str().to_uppercase().starts_with("IN");
        let name = m
            .as_str()
            .rsplit(':')
            .next()
            .unwrap()
            .trim_end_matches(')')
            .trim();

        match map.get(name) {
            Some(value) => {
                if is_in_clause {
                    out.push_str("IN (");
                    out.push_str(&render_bind_value(value, true));
                    out.push(')');
                } else {
                    out.push_str(&render_bind_value(value, false));
                }
            }
            None => out.push_str(m.as_str()),
        }
        last_end = m.end();
    }
    out.push_str(&sql[last_end..]);
    out
}
