//! Fingerprinting and `CacheKey` construction (component F).
//!
//! Two fingerprint forms, chosen by classification:
//!
//! - `RowLookup` queries whose single condition is an equality or `IN` on
//!   `id`/`uuid` get a human-readable form: `table:col=val:row-lookup`,
//!   `IN` values canonicalized via `ConditionValue::sorted`. This is the
//!   format operators read off a cache dump without decoding anything.
//! - Everything else gets a structural hash: a canonical JSON record (fixed
//!   field order, conditions sorted, `IN`/`BETWEEN` values canonicalized)
//!   run through SHA-256, truncated to the first 16 hex characters (Open
//!   Question #3 in `DESIGN.md` — a deliberate compactness/collision
//!   tradeoff; `Fingerprint` is a newtype so widening this later is a
//!   one-line change).
//!
//! `CacheKeyBuilder` is the only way to produce a `CacheKey`: fields are
//! frozen before the fingerprint is computed from them, so a `CacheKey`
//! can never exist with a fingerprint that doesn't match its own content.

use sha2::{Digest, Sha256};

use crate::model::{
    CacheKey, Classification, ConditionValue, Fingerprint, OrderByClause, SetOperation, TableAccess,
};

pub struct CacheKeyBuilder {
    tables: Vec<TableAccess>,
    classification: Classification,
    normalized_sql: String,
    order_by: Vec<OrderByClause>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
    has_subquery: bool,
    set_operation: Option<SetOperation>,
}

impl CacheKeyBuilder {
    pub fn new(
        tables: Vec<TableAccess>,
        classification: Classification,
        normalized_sql: impl Into<String>,
    ) -> Self {
        Self {
            tables,
            classification,
            normalized_sql: normalized_sql.into(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            has_subquery: false,
            set_operation: None,
        }
    }

    pub fn order_by(mut self, order_by: Vec<OrderByClause>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn has_subquery(mut self, has_subquery: bool) -> Self {
        self.has_subquery = has_subquery;
        self
    }

    pub fn set_operation(mut self, set_operation: Option<SetOperation>) -> Self {
        self.set_operation = set_operation;
        self
    }

    pub fn build(self) -> CacheKey {
        let fingerprint = compute_fingerprint(
            &self.tables,
            self.classification,
            &self.normalized_sql,
            &self.order_by,
            self.limit,
            self.offset,
            self.distinct,
            self.has_subquery,
            self.set_operation,
        );

        CacheKey {
            tables: self.tables,
            classification: self.classification,
            normalized_sql: self.normalized_sql,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            has_subquery: self.has_subquery,
            set_operation: self.set_operation,
            fingerprint,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_fingerprint(
    tables: &[TableAccess],
    classification: Classification,
    normalized_sql: &str,
    order_by: &[OrderByClause],
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
    has_subquery: bool,
    set_operation: Option<SetOperation>,
) -> Fingerprint {
    if classification == Classification::RowLookup {
        if let Some(human) = row_lookup_key(tables) {
            return Fingerprint(human);
        }
    }

    let canonical = CanonicalForm {
        tables: tables.iter().map(canonicalize_table).collect(),
        classification,
        normalized_sql: normalized_sql.to_string(),
        order_by: order_by.to_vec(),
        limit,
        offset,
        distinct,
        has_subquery,
        set_operation,
    };

    let json = serde_json::to_string(&canonical).expect("CanonicalForm is always serializable");
    let digest = Sha256::digest(json.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Fingerprint(hex[..16].to_string())
}

/// Human-readable form for a lookup by primary key: exactly one condition,
/// `=`/`IN` on a column named `id`/`uuid` (case-insensitive). Returns `None`
/// when the shape doesn't fit, in which case the caller falls back to the
/// structural hash even though the classification is `RowLookup`.
fn row_lookup_key(tables: &[TableAccess]) -> Option<String> {
    if tables.len() != 1 {
        return None;
    }
    let table = &tables[0];
    let [condition] = table.conditions.as_slice() else {
        return None;
    };
    if !condition.operator.is_equality_like() {
        return None;
    }
    if !(condition.column.eq_ignore_ascii_case("id") || condition.column.eq_ignore_ascii_case("uuid")) {
        return None;
    }

    let rendered = match condition.value.sorted() {
        ConditionValue::Scalar(v) => v.as_str_lossy(),
        ConditionValue::List(values) => values
            .iter()
            .map(|v| v.as_str_lossy())
            .collect::<Vec<_>>()
            .join(","),
        _ => unreachable!("equality-like conditions only carry Scalar/List values"),
    };

    Some(format!("{}:{}={}:row-lookup", table.table, condition.column, rendered))
}

#[derive(serde::Serialize)]
struct CanonicalForm {
    tables: Vec<CanonicalTable>,
    classification: Classification,
    normalized_sql: String,
    order_by: Vec<OrderByClause>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
    has_subquery: bool,
    set_operation: Option<SetOperation>,
}

#[derive(serde::Serialize)]
struct CanonicalTable {
    table: String,
    alias: Option<String>,
    columns: Vec<String>,
    conditions: Vec<crate::model::Condition>,
    join_conditions: Vec<crate::model::JoinCondition>,
}

/// An alias matching the ORM auto-generated pattern `t[0-9]+` is rewritten to
/// the table name before hashing, so ORM-assigned aliases don't change the
/// fingerprint. A deliberately chosen alias (`o`, `u`, ...) is left as-is.
fn canonical_alias(table: &str, alias: &Option<String>) -> Option<String> {
    match alias {
        Some(a) if is_orm_generated_alias(a) => Some(table.to_string()),
        other => other.clone(),
    }
}

fn is_orm_generated_alias(alias: &str) -> bool {
    alias.len() > 1
        && alias.as_bytes()[0].eq_ignore_ascii_case(&b't')
        && alias.as_bytes()[1..].iter().all(u8::is_ascii_digit)
}

fn canonicalize_table(table: &TableAccess) -> CanonicalTable {
    let mut conditions: Vec<crate::model::Condition> = table
        .conditions
        .iter()
        .map(|c| crate::model::Condition {
            column: c.column.clone(),
            operator: c.operator,
            value: c.value.sorted(),
        })
        .collect();
    conditions.sort_by(|a, b| condition_sort_key(a).cmp(&condition_sort_key(b)));

    let mut join_conditions = table.join_conditions.clone();
    join_conditions.sort_by(|a, b| {
        (
            a.left_table.as_str(),
            a.left_column.as_str(),
            a.right_table.as_str(),
            a.right_column.as_str(),
        )
            .cmp(&(
                b.left_table.as_str(),
                b.left_column.as_str(),
                b.right_table.as_str(),
                b.right_column.as_str(),
            ))
    });

    CanonicalTable {
        table: table.table.clone(),
        alias: canonical_alias(&table.table, &table.alias),
        columns: table.columns.clone(),
        conditions,
        join_conditions,
    }
}

fn condition_sort_key(c: &crate::model::Condition) -> String {
    format!("{}|{}|{:?}", c.column, c.operator.as_str(), c.value)
}
