//! The analysis façade: binds parameters, parses, normalizes, extracts,
//! classifies, and fingerprints. This is the only module the cache façade
//! (`crate::cache`) and the HTTP handlers call into directly; everything
//! else here is an implementation detail of one of those two steps.

pub mod binder;
pub mod classifier;
pub mod extractor;
pub mod fingerprint;
pub mod normalizer;
pub mod parser;

use crate::error::AnalysisError;
use crate::model::{CacheKey, Condition, ParamValue, WriteInfo, WriteOperation};

use binder::Params;
use fingerprint::CacheKeyBuilder;
use parser::{parse_statement, ParsedStatement, WriteStatement};

/// Bind → parse → normalize → extract → classify → fingerprint.
pub fn analyze_select(sql: &str, params: Option<&Params>) -> Result<CacheKey, AnalysisError> {
    let bound = binder::bind_parameters(sql, params);

    match parse_statement(&bound)? {
        ParsedStatement::Select(query) => {
            let normalized_sql = normalizer::normalize(&bound);
            let extract = extractor::extract_select(&query)?;
            let classification = classifier::classify(&extract);

            let key = CacheKeyBuilder::new(extract.tables, classification, normalized_sql)
                .order_by(extract.order_by)
                .limit(extract.limit)
                .offset(extract.offset)
                .distinct(extract.distinct)
                .has_subquery(extract.has_subquery)
                .set_operation(extract.set_operation)
                .build();

            Ok(key)
        }
        ParsedStatement::Write(_) => Err(AnalysisError::Unsupported(
            "expected a SELECT, got a write statement".into(),
        )),
    }
}

/// Bind → parse → extract, producing the write-side descriptor the decider
/// compares against cached `CacheKey`s.
pub fn analyze_write(sql: &str, params: Option<&Params>) -> Result<WriteInfo, AnalysisError> {
    let bound = binder::bind_parameters(sql, params);

    match parse_statement(&bound)? {
        ParsedStatement::Select(_) => Err(AnalysisError::Unsupported(
            "expected a write statement, got a SELECT".into(),
        )),
        ParsedStatement::Write(write) => Ok(match write {
            WriteStatement::Insert { table } => WriteInfo {
                table,
                operation: WriteOperation::Insert,
                affected_rows: None,
                modified_columns: None,
                conditions: None,
            },
            WriteStatement::Update {
                table,
                assignments,
                selection,
            } => {
                let conditions = extractor::extract_write_conditions(&selection);
                let modified_columns = Some(
                    assignments
                        .iter()
                        .filter_map(|a| a.id.last().map(|i| i.value.clone()))
                        .collect(),
                );
                WriteInfo {
                    table,
                    operation: WriteOperation::Update,
                    affected_rows: affected_rows_from(&conditions),
                    modified_columns,
                    conditions,
                }
            }
            WriteStatement::Delete { table, selection } => {
                let conditions = extractor::extract_write_conditions(&selection);
                WriteInfo {
                    table,
                    operation: WriteOperation::Delete,
                    affected_rows: affected_rows_from(&conditions),
                    modified_columns: None,
                    conditions,
                }
            }
        }),
    }
}

/// Row identifiers recoverable directly from equality/`IN` conditions in the
/// WHERE clause; `None` when no such condition is present (a range-only or
/// unconditioned write can't be narrowed to specific rows this way).
fn affected_rows_from(conditions: &Option<Vec<Condition>>) -> Option<Vec<String>> {
    let conditions = conditions.as_ref()?;
    let mut rows = Vec::new();
    for c in conditions {
        if !c.operator.is_equality_like() {
            continue;
        }
        match &c.value {
            crate::model::ConditionValue::Scalar(v) => rows.push(render_row_id(v)),
            crate::model::ConditionValue::List(vs) => rows.extend(vs.iter().map(render_row_id)),
            _ => {}
        }
    }
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn render_row_id(v: &ParamValue) -> String {
    v.as_str_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use binder::BindValue;

    #[test]
    fn analyze_select_produces_row_lookup_fingerprint() {
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        assert_eq!(key.fingerprint.as_str(), "users:id=10:row-lookup");
    }

    #[test]
    fn analyze_select_binds_positional_params() {
        let params = Params::Positional(vec![ParamValue::Int(10).into()]);
        let key = analyze_select("SELECT * FROM users WHERE id = ?", Some(&params)).unwrap();
        assert_eq!(key.fingerprint.as_str(), "users:id=10:row-lookup");
    }

    #[test]
    fn analyze_write_insert_has_no_conditions() {
        let info = analyze_write("INSERT INTO users (id, name) VALUES (1, 'a')", None).unwrap();
        assert_eq!(info.table, "users");
        assert_eq!(info.operation, WriteOperation::Insert);
        assert!(info.conditions.is_none());
    }

    #[test]
    fn analyze_write_update_collects_modified_columns_and_rows() {
        let info = analyze_write("UPDATE users SET email = 'x@y' WHERE id = 10", None).unwrap();
        assert_eq!(info.operation, WriteOperation::Update);
        assert_eq!(info.modified_columns, Some(vec!["email".to_string()]));
        assert_eq!(info.affected_rows, Some(vec!["10".to_string()]));
    }

    #[test]
    fn analyze_write_delete_with_in_list_collects_all_rows() {
        let info = analyze_write("DELETE FROM users WHERE id IN (1, 2, 3)", None).unwrap();
        assert_eq!(info.operation, WriteOperation::Delete);
        let mut rows = info.affected_rows.unwrap();
        rows.sort();
        assert_eq!(rows, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    }

    #[test]
    fn analyze_select_rejects_write_statement() {
        let result = analyze_select("DELETE FROM users", None);
        assert!(matches!(result, Err(AnalysisError::Unsupported(_))));
    }

    #[test]
    fn analyze_select_is_deterministic() {
        let a = analyze_select("SELECT id, name FROM users WHERE age > 21 ORDER BY name LIMIT 10", None).unwrap();
        let b = analyze_select("SELECT id, name FROM users WHERE age > 21 ORDER BY name LIMIT 10", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn equivalence_invariance_across_case_whitespace_backticks_and_in_permutation() {
        let a = analyze_select("SELECT * FROM `users` WHERE id IN (3, 1, 2)", None).unwrap();
        let b = analyze_select("select   *   from users   where id in (1, 2, 3)", None).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn in_list_binding_matches_literal_equivalent() {
        let params = Params::Positional(vec![BindValue::List(vec![
            ParamValue::Int(3),
            ParamValue::Int(1),
            ParamValue::Int(2),
        ])]);
        let bound = analyze_select("SELECT * FROM users WHERE id IN (?)", Some(&params)).unwrap();
        let literal = analyze_select("SELECT * FROM users WHERE id IN (1, 2, 3)", None).unwrap();
        assert_eq!(bound.fingerprint, literal.fingerprint);
    }

    #[test]
    fn distinguishability_limit_changes_fingerprint() {
        let a = analyze_select("SELECT * FROM users ORDER BY name LIMIT 10", None).unwrap();
        let b = analyze_select("SELECT * FROM users ORDER BY name LIMIT 20", None).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn distinguishability_different_row_lookup_values() {
        let a = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        let b = analyze_select("SELECT * FROM users WHERE id = 11", None).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }
}
