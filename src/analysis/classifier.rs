//! Classification decision tree (component E).
//!
//! Picks one `Classification` per SELECT, in priority order. The order
//! matters: a join with an aggregate is classified `Join` before `Aggregate`
//! is considered, and anything carrying a subquery or set operation is
//! `Complex` regardless of what else is true about it, because the decider
//! has no precision logic for those shapes and must fall back to
//! table-level invalidation.

use crate::model::{Classification, Operator};

use super::extractor::SelectExtract;

pub fn classify(extract: &SelectExtract) -> Classification {
    if extract.has_subquery || extract.set_operation.is_some() {
        return Classification::Complex;
    }

    if extract.tables.len() > 1 {
        return Classification::Join;
    }

    if extract.has_aggregate {
        return Classification::Aggregate;
    }

    if has_primary_key_equality(&extract.tables[0].conditions) {
        return Classification::RowLookup;
    }

    Classification::Complex
}

/// True iff there's an equality or `IN` condition on a column named `id` or
/// `uuid` (case-insensitive) — the shape a fingerprint can address by a
/// single row instead of falling back to table-level invalidation.
fn has_primary_key_equality(conditions: &[crate::model::Condition]) -> bool {
    conditions.iter().any(|c| {
        matches!(c.operator, Operator::Eq | Operator::In)
            && (c.column.eq_ignore_ascii_case("id") || c.column.eq_ignore_ascii_case("uuid"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::{parse_statement, ParsedStatement};
    use crate::analysis::extractor::extract_select;

    fn classify_sql(sql: &str) -> Classification {
        match parse_statement(sql).unwrap() {
            ParsedStatement::Select(q) => classify(&extract_select(&q).unwrap()),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn plain_lookup_is_row_lookup() {
        assert_eq!(classify_sql("SELECT * FROM users WHERE id = 1"), Classification::RowLookup);
    }

    #[test]
    fn uuid_equality_is_row_lookup() {
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE uuid = 'abc'"),
            Classification::RowLookup
        );
    }

    #[test]
    fn id_in_list_is_row_lookup() {
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE id IN (1, 2, 3)"),
            Classification::RowLookup
        );
    }

    #[test]
    fn non_id_condition_is_complex() {
        assert_eq!(
            classify_sql("SELECT name FROM users WHERE status = 'active'"),
            Classification::Complex
        );
    }

    #[test]
    fn unconditioned_select_is_complex() {
        assert_eq!(classify_sql("SELECT * FROM users"), Classification::Complex);
    }

    #[test]
    fn aggregate_function_is_aggregate() {
        assert_eq!(classify_sql("SELECT COUNT(*) FROM users"), Classification::Aggregate);
    }

    #[test]
    fn multi_table_is_join() {
        assert_eq!(
            classify_sql("SELECT * FROM orders o JOIN users u ON o.user_id = u.id"),
            Classification::Join
        );
    }

    #[test]
    fn subquery_is_complex_even_single_table() {
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)"),
            Classification::Complex
        );
    }

    #[test]
    fn union_is_complex() {
        assert_eq!(
            classify_sql("SELECT id FROM users UNION SELECT id FROM archived_users"),
            Classification::Complex
        );
    }

    #[test]
    fn join_with_aggregate_is_join_not_aggregate() {
        assert_eq!(
            classify_sql("SELECT COUNT(*) FROM orders o JOIN users u ON o.user_id = u.id"),
            Classification::Join
        );
    }
}
