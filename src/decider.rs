//! Invalidation decider (component G).
//!
//! `should_invalidate` is the one function the cache façade calls on every
//! write. It combines four sub-analyses — column overlap, row overlap
//! against `w.affectedRows`, join-column overlap, and range analysis — per
//! table and per write operation. Range analysis (the one sub-analysis with
//! a genuine "can't tell" outcome) returns a three-valued `Overlap`, and
//! `Overlap::Unknown` is always treated as an overlap: the
//! conservative-invalidation invariant — "when the analyzer cannot prove
//! non-overlap, it invalidates" — is enforced structurally by
//! `Overlap::invalidates`, not by convention at each call site.

use crate::model::{CacheKey, Classification, Condition, ConditionValue, Operator, ParamValue, TableAccess, WriteInfo, WriteOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlap {
    Yes,
    No,
    Unknown,
}

impl Overlap {
    fn invalidates(self) -> bool {
        !matches!(self, Overlap::No)
    }
}

/// Decide whether a cached `CacheKey` must be invalidated by a write
/// described by `WriteInfo`. Four sub-analyses: column overlap, row overlap
/// (against `w.affectedRows`), join-column overlap, and range analysis.
pub fn should_invalidate(key: &CacheKey, write: &WriteInfo) -> bool {
    let Some(table) = key.tables.iter().find(|t| t.table == write.table) else {
        return false;
    };

    // No special-case for `Classification::Complex` here: the four
    // sub-analyses below key off the conditions/columns actually extracted,
    // and a complex query (subquery, set operation, or no id/uuid
    // condition) naturally has little or nothing extracted, so it falls
    // through to the conservative default on its own.
    match write.operation {
        WriteOperation::Insert => true,
        WriteOperation::Delete => should_invalidate_delete(key, write),
        WriteOperation::Update => should_invalidate_update(key, table, write),
    }
}

fn should_invalidate_delete(key: &CacheKey, write: &WriteInfo) -> bool {
    if matches!(key.classification, Classification::Aggregate | Classification::Join) {
        return true;
    }

    let anchor = &key.tables[0];

    if let Some(write_conditions) = &write.conditions {
        if !anchor.conditions.is_empty() && ranges_disjoint(&anchor.conditions, write_conditions) {
            return false;
        }
    }

    if let Some(rows) = &write.affected_rows {
        if has_equality_like(&anchor.conditions) {
            return row_overlap_affected_rows(&anchor.conditions, rows);
        }
    }

    true
}

fn should_invalidate_update(key: &CacheKey, table: &TableAccess, write: &WriteInfo) -> bool {
    let anchor = &key.tables[0];
    let is_join = key.classification == Classification::Join;

    let Some(modified) = &write.modified_columns else {
        // Rare for UPDATE: no column list to reason about, so only range
        // and row-overlap checks apply.
        if let Some(write_conditions) = &write.conditions {
            if !anchor.conditions.is_empty() && ranges_disjoint(&anchor.conditions, write_conditions) {
                return false;
            }
        }
        if let Some(rows) = &write.affected_rows {
            if has_equality_like(&anchor.conditions) {
                return row_overlap_affected_rows(&anchor.conditions, rows);
            }
        }
        return true;
    };

    let column = column_overlap(table, modified);
    let join_column = is_join && join_column_overlap(anchor, modified, &write.table);

    if !column && !join_column {
        return false;
    }

    if let Some(write_conditions) = &write.conditions {
        if !anchor.conditions.is_empty() && ranges_disjoint(&anchor.conditions, write_conditions) {
            return false;
        }
    }

    if is_join {
        if let Some(rows) = &write.affected_rows {
            if !anchor.conditions.is_empty() && !row_overlap_affected_rows(&anchor.conditions, rows) {
                return false;
            }
        }
        return true;
    }

    // Single-table with column overlap.
    if let Some(rows) = &write.affected_rows {
        if !anchor.conditions.is_empty() {
            return row_overlap_affected_rows(&anchor.conditions, rows);
        }
    }
    true
}

/// `selectedColumns` overlaps `modifiedColumns` if the selected list
/// contains `*`, or if stripping an aggregate wrapper `FUNC(col) → col` from
/// any selected entry yields a name exactly matching one of `modified`.
fn column_overlap(table: &TableAccess, modified: &[String]) -> bool {
    if table.columns.iter().any(|c| c == "*") {
        return true;
    }
    modified
        .iter()
        .any(|m| table.columns.iter().any(|c| strip_aggregate_wrapper(c) == m.as_str()))
}

/// Strips a single `FUNC(col)` wrapper, e.g. `SUM(price)` → `price`.
/// Multi-argument calls (`ROUND(price, 2)`) and wildcard calls (`COUNT(*)`)
/// are left as-is since they don't reduce to a bare column name.
fn strip_aggregate_wrapper(column: &str) -> &str {
    if let (Some(open), true) = (column.find('('), column.ends_with(')')) {
        let inner = &column[open + 1..column.len() - 1];
        if !inner.is_empty() && !inner.contains(',') && !inner.contains('(') {
            return inner.trim();
        }
    }
    column
}

/// `true` iff a modified column participates as `leftColumn`/`rightColumn`
/// in a `JoinCondition` whose corresponding side is `write_table` — the
/// extractor already resolves join-condition sides to real table names
/// (not aliases), so no alias lookup is needed here.
fn join_column_overlap(anchor: &TableAccess, modified: &[String], write_table: &str) -> bool {
    anchor.join_conditions.iter().any(|jc| {
        (jc.left_table == write_table && modified.iter().any(|m| m == &jc.left_column))
            || (jc.right_table == write_table && modified.iter().any(|m| m == &jc.right_column))
    })
}

fn has_equality_like(conditions: &[Condition]) -> bool {
    conditions.iter().any(|c| c.operator.is_equality_like())
}

/// The cached table's equality/IN conditions compared against
/// `w.affectedRows`: `true` if an equality value or any member of an `IN`
/// list appears in `affected_rows`, or if there are no equality/IN
/// conditions at all (can't narrow, so assume overlap).
fn row_overlap_affected_rows(conditions: &[Condition], affected_rows: &[String]) -> bool {
    let eq_like: Vec<&Condition> = conditions.iter().filter(|c| c.operator.is_equality_like()).collect();
    if eq_like.is_empty() {
        return true;
    }
    eq_like
        .iter()
        .any(|c| values_of(&c.value).iter().any(|v| affected_rows.iter().any(|r| r == &v.as_str_lossy())))
}

/// Groups cached and write conditions by shared column and runs range
/// analysis on each pair; `true` as soon as one shared column is provably
/// disjoint (conjunctive semantics: a single disjoint column rules out any
/// row satisfying both sides).
fn ranges_disjoint(q_conditions: &[Condition], w_conditions: &[Condition]) -> bool {
    for qc in q_conditions {
        for wc in w_conditions {
            if qc.column == wc.column && !condition_pair_overlap(qc, wc).invalidates() {
                return true;
            }
        }
    }
    false
}

fn condition_pair_overlap(qc: &Condition, wc: &Condition) -> Overlap {
    if qc.operator.is_equality_like() && wc.operator.is_equality_like() {
        let qvals = values_of(&qc.value);
        let wvals = values_of(&wc.value);
        return if qvals.iter().any(|q| wvals.contains(q)) {
            Overlap::Yes
        } else {
            Overlap::No
        };
    }

    if is_range_op(qc.operator) && wc.operator.is_equality_like() {
        return range_vs_values(qc, &values_of(&wc.value));
    }
    if is_range_op(wc.operator) && qc.operator.is_equality_like() {
        return range_vs_values(wc, &values_of(&qc.value));
    }
    if is_range_op(qc.operator) && is_range_op(wc.operator) {
        return range_vs_range(qc, wc);
    }

    Overlap::Unknown
}

fn values_of(value: &ConditionValue) -> Vec<ParamValue> {
    match value {
        ConditionValue::Scalar(v) => vec![v.clone()],
        ConditionValue::List(vs) => vs.clone(),
        _ => Vec::new(),
    }
}

fn is_range_op(op: Operator) -> bool {
    matches!(
        op,
        Operator::Gt | Operator::Lt | Operator::GtEq | Operator::LtEq | Operator::Between
    )
}

/// `(lower, lower_inclusive, upper, upper_inclusive)`, `None` when the bound
/// isn't numeric (we only reason about numeric ranges; anything else stays
/// `Unknown` upstream).
/// Numeric key for a `ParamValue`, falling back to parsing ISO-8601 date or
/// datetime strings (`2024-01-01`, `2024-01-01 12:00:00`) to a day-resolution
/// ordinal, since the decider's range comparisons are otherwise blind to
/// date-typed WHERE clauses such as `created_at >= '2024-01-01'`.
fn numeric_key(v: &ParamValue) -> Option<f64> {
    if let Some(f) = v.as_f64() {
        return Some(f);
    }
    let s = match v {
        ParamValue::Str(s) => s.as_str(),
        _ => return None,
    };
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.num_days_from_ce() as f64);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp() as f64 / 86_400.0);
    }
    None
}

fn interval_of(c: &Condition) -> Option<(f64, bool, f64, bool)> {
    match (c.operator, &c.value) {
        (Operator::Gt, ConditionValue::Scalar(v)) => numeric_key(v).map(|f| (f, false, f64::INFINITY, true)),
        (Operator::GtEq, ConditionValue::Scalar(v)) => numeric_key(v).map(|f| (f, true, f64::INFINITY, true)),
        (Operator::Lt, ConditionValue::Scalar(v)) => numeric_key(v).map(|f| (f64::NEG_INFINITY, true, f, false)),
        (Operator::LtEq, ConditionValue::Scalar(v)) => numeric_key(v).map(|f| (f64::NEG_INFINITY, true, f, true)),
        (Operator::Between, ConditionValue::Range(lo, hi)) => {
            Some((numeric_key(lo)?, true, numeric_key(hi)?, true))
        }
        _ => None,
    }
}

fn in_interval(f: f64, interval: (f64, bool, f64, bool)) -> bool {
    let (lo, lo_incl, hi, hi_incl) = interval;
    let lo_ok = if lo_incl { f >= lo } else { f > lo };
    let hi_ok = if hi_incl { f <= hi } else { f < hi };
    lo_ok && hi_ok
}

fn range_vs_values(range_cond: &Condition, values: &[ParamValue]) -> Overlap {
    let Some(interval) = interval_of(range_cond) else {
        return Overlap::Unknown;
    };
    let numeric: Vec<f64> = values.iter().filter_map(numeric_key).collect();
    if numeric.is_empty() {
        return Overlap::Unknown;
    }
    if numeric.iter().any(|f| in_interval(*f, interval)) {
        Overlap::Yes
    } else {
        Overlap::No
    }
}

fn range_vs_range(a: &Condition, b: &Condition) -> Overlap {
    let (Some((a_lo, _, a_hi, _)), Some((b_lo, _, b_hi, _))) = (interval_of(a), interval_of(b)) else {
        return Overlap::Unknown;
    };
    if a_lo <= b_hi && b_lo <= a_hi {
        Overlap::Yes
    } else {
        Overlap::No
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_select;

    fn write(table: &str, operation: WriteOperation, conditions: Vec<Condition>, modified_columns: Option<Vec<String>>) -> WriteInfo {
        WriteInfo {
            table: table.to_string(),
            operation,
            affected_rows: None,
            modified_columns,
            conditions: if conditions.is_empty() { None } else { Some(conditions) },
        }
    }

    fn eq(col: &str, v: ParamValue) -> Condition {
        Condition { column: col.to_string(), operator: Operator::Eq, value: ConditionValue::Scalar(v) }
    }

    fn write_with_rows(
        table: &str,
        operation: WriteOperation,
        conditions: Vec<Condition>,
        modified_columns: Option<Vec<String>>,
        affected_rows: Vec<&str>,
    ) -> WriteInfo {
        WriteInfo {
            affected_rows: Some(affected_rows.into_iter().map(str::to_string).collect()),
            ..write(table, operation, conditions, modified_columns)
        }
    }

    #[test]
    fn insert_always_invalidates() {
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        let w = write("users", WriteOperation::Insert, vec![], None);
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn unrelated_table_never_invalidates() {
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        let w = write("orders", WriteOperation::Insert, vec![], None);
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn row_non_overlap_for_in_cache_skips_invalidation() {
        let key = analyze_select("SELECT * FROM users WHERE id IN (1, 2, 3)", None).unwrap();
        let w = write("users", WriteOperation::Delete, vec![eq("id", ParamValue::Int(99))], None);
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn row_overlap_for_in_cache_invalidates() {
        let key = analyze_select("SELECT * FROM users WHERE id IN (1, 2, 3)", None).unwrap();
        let w = write("users", WriteOperation::Delete, vec![eq("id", ParamValue::Int(2))], None);
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn column_overlap_skips_update_on_unselected_column() {
        let key = analyze_select("SELECT id, name FROM users WHERE id = 10", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["email".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn column_overlap_invalidates_when_column_selected() {
        let key = analyze_select("SELECT id, email FROM users WHERE id = 10", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["email".to_string()]),
        );
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn update_of_unselected_column_does_not_invalidate() {
        let key = analyze_select("SELECT name FROM users WHERE id = 10", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["email".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn range_non_overlap_skips_invalidation() {
        let key = analyze_select("SELECT age, name FROM users WHERE age > 60", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![Condition { column: "age".to_string(), operator: Operator::Lt, value: ConditionValue::Scalar(ParamValue::Int(18)) }],
            Some(vec!["name".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn range_overlap_invalidates() {
        let key = analyze_select("SELECT age, name FROM users WHERE age > 60", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![Condition { column: "age".to_string(), operator: Operator::Gt, value: ConditionValue::Scalar(ParamValue::Int(70)) }],
            Some(vec!["name".to_string()]),
        );
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn date_range_non_overlap_skips_invalidation() {
        let key = analyze_select(
            "SELECT created_at, name FROM users WHERE created_at >= '2024-01-01'",
            None,
        )
        .unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![Condition {
                column: "created_at".to_string(),
                operator: Operator::Lt,
                value: ConditionValue::Scalar(ParamValue::Str("2023-01-01".to_string())),
            }],
            Some(vec!["name".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn unconditioned_write_always_invalidates() {
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        let w = write("users", WriteOperation::Delete, vec![], None);
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn complex_classification_always_invalidates() {
        let key = analyze_select("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)", None).unwrap();
        let w = write("users", WriteOperation::Update, vec![eq("id", ParamValue::Int(999))], Some(vec!["name".to_string()]));
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn aggregate_count_unaffected_by_unrelated_column_update() {
        let key = analyze_select("SELECT COUNT(*) FROM users WHERE id = 10", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["email".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn aggregate_delete_always_invalidates_even_on_disjoint_range() {
        let key = analyze_select("SELECT COUNT(*) FROM users WHERE age > 60", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Delete,
            vec![Condition {
                column: "age".to_string(),
                operator: Operator::Lt,
                value: ConditionValue::Scalar(ParamValue::Int(18)),
            }],
            None,
        );
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn join_delete_always_invalidates() {
        let key = analyze_select(
            "SELECT * FROM orders o JOIN users u ON o.user_id = u.id WHERE o.id = 1",
            None,
        )
        .unwrap();
        let w = write("orders", WriteOperation::Delete, vec![eq("id", ParamValue::Int(99))], None);
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn column_overlap_is_exact_not_substring() {
        let key = analyze_select("SELECT valid_id, name FROM users WHERE id = 10", None).unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["id".to_string()]),
        );
        assert!(!should_invalidate(&key, &w), "\"valid_id\" must not match modified column \"id\" by substring");
    }

    #[test]
    fn column_overlap_strips_aggregate_wrapper() {
        let key = analyze_select("SELECT SUM(price) FROM orders WHERE id = 10", None).unwrap();
        let w = write(
            "orders",
            WriteOperation::Update,
            vec![eq("id", ParamValue::Int(10))],
            Some(vec!["price".to_string()]),
        );
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn join_column_overlap_invalidates_when_modified_column_is_join_key_only() {
        let key = analyze_select(
            "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id WHERE o.id = 1",
            None,
        )
        .unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![],
            Some(vec!["id".to_string()]),
        );
        assert!(should_invalidate(&key, &w));
    }

    #[test]
    fn join_without_column_or_join_column_overlap_skips_invalidation() {
        let key = analyze_select(
            "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id WHERE o.id = 1",
            None,
        )
        .unwrap();
        let w = write(
            "users",
            WriteOperation::Update,
            vec![],
            Some(vec!["email".to_string()]),
        );
        assert!(!should_invalidate(&key, &w));
    }

    #[test]
    fn row_overlap_checks_affected_rows_not_write_conditions() {
        let key = analyze_select("SELECT * FROM users WHERE id IN (1, 2, 3)", None).unwrap();
        let w = write_with_rows(
            "users",
            WriteOperation::Delete,
            vec![],
            None,
            vec!["2"],
        );
        assert!(should_invalidate(&key, &w));

        let disjoint = write_with_rows("users", WriteOperation::Delete, vec![], None, vec!["99"]);
        assert!(!should_invalidate(&key, &disjoint));
    }
}
