//! SQL text normalizer (component D).
//!
//! Grounded on the teacher's `query::cache::normalize_sql`, which collapsed
//! whitespace and lowercased the statement before using it as a cache key.
//! This version keeps that idea but operates on the already
//! parameter-bound SQL text and adds the canonicalizations the design calls
//! for: backtick/bracket identifier quoting stripped, common ORM table
//! aliases rewritten to a stable form, and `IN (...)` literal lists
//! re-ordered into the same canonical order `ConditionValue::sorted` uses.
//!
//! The output is never parsed again; it exists only to feed
//! `CacheKey::normalized_sql`, which distinguishes SQL texts that extract to
//! the same structural fingerprint but weren't written identically.

use std::sync::OnceLock;

use regex::Regex;

/// Normalize bound SQL text for inclusion in a `CacheKey`.
pub fn normalize(sql: &str) -> String {
    let stripped = strip_identifier_quotes(sql);
    let unaliased = rewrite_orm_aliases(&stripped);
    let collapsed = collapse_whitespace(&unaliased);
    let reordered = reorder_in_lists(&collapsed);
    reordered.trim().to_lowercase()
}

/// Rewrites auto-generated ORM aliases matching `t[0-9]+` (e.g. `t0`, `t1`)
/// back to the table name they alias, since these are assigned by ORM query
/// builders in declaration order and carry no information of their own.
fn rewrite_orm_aliases(sql: &str) -> String {
    let mut out = sql.to_string();
    for caps in table_alias_re().captures_iter(sql) {
        let table = caps[1].to_string();
        let alias = caps[2].to_string();
        let word = Regex::new(&format!(r"\b{}\b", regex::escape(&alias))).unwrap();
        out = word.replace_all(&out, table.as_str()).to_string();
    }
    out
}

fn table_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:FROM|JOIN)\s+(\w+)\s+(t[0-9]+)\b").unwrap())
}

fn collapse_whitespace(sql: &str) -> String {
    whitespace_re().replace_all(sql, " ").to_string()
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// MySQL backticks and SQL-Server/Postgres brackets/double-quotes around
/// identifiers are stripped; they don't change the referenced identifier.
fn strip_identifier_quotes(sql: &str) -> String {
    sql.chars()
        .filter(|c| !matches!(c, '`' | '[' | ']'))
        .collect()
}

/// Rewrites literal value lists inside `IN (...)` into the canonical order
/// (numeric ascending if every member parses as a number, lexicographic
/// otherwise), mirroring `ConditionValue::sorted`. Only touches lists of bare
/// literals; an `IN (SELECT ...)` is left untouched.
fn reorder_in_lists(sql: &str) -> String {
    in_list_re()
        .replace_all(sql, |caps: &regex::Captures| {
            let list = &caps[1];
            if list.to_uppercase().contains("SELECT") {
                return caps[0].to_string();
            }
            let mut items: Vec<&str> = list.split(',').map(|s| s.trim()).collect();
            let all_numeric = items.iter().all(|i| i.parse::<f64>().is_ok());
            if all_numeric {
                items.sort_by(|a, b| {
                    a.parse::<f64>()
                        .unwrap()
                        .partial_cmp(&b.parse::<f64>().unwrap())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            } else {
                items.sort();
            }
            format!("IN ({})", items.join(", "))
        })
        .to_string()
}

fn in_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)IN\s*\(([^()]*)\)").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_lowercases() {
        let out = normalize("SELECT   *\nFROM  users\tWHERE id = 1");
        assert_eq!(out, "select * from users where id = 1");
    }

    #[test]
    fn strips_backticks_and_brackets() {
        let out = normalize("SELECT `id` FROM `users`");
        assert_eq!(out, "select id from users");
    }

    #[test]
    fn reorders_numeric_in_list() {
        let out = normalize("SELECT * FROM users WHERE id IN (3, 1, 2)");
        assert_eq!(out, "select * from users where id in (1, 2, 3)");
    }

    #[test]
    fn reorders_string_in_list() {
        let out = normalize("SELECT * FROM users WHERE name IN ('bob', 'alice')");
        assert_eq!(out, "select * from users where name in ('alice', 'bob')");
    }

    #[test]
    fn leaves_in_subquery_untouched() {
        let out = normalize("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)");
        assert_eq!(out, "select * from users where id in (select user_id from orders)");
    }

    #[test]
    fn rewrites_orm_aliases_to_table_name() {
        let out = normalize("SELECT * FROM orders t0 JOIN users t1 ON t0.user_id = t1.id");
        assert_eq!(
            out,
            "select * from orders orders join users users on orders.user_id = users.id"
        );
    }

    #[test]
    fn non_orm_aliases_are_left_alone() {
        let out = normalize("SELECT * FROM orders o JOIN users u ON o.user_id = u.id");
        assert_eq!(out, "select * from orders o join users u on o.user_id = u.id");
    }

    #[test]
    fn equivalent_inputs_normalize_identically() {
        let a = normalize("select  *  from users where id in (2,1)");
        let b = normalize("SELECT * FROM `users` WHERE id IN (1, 2)");
        assert_eq!(a, b);
    }
}
