//! Core data model shared by the analysis, decider, and cache-store layers.
//!
//! These types are the contract described in the design's data model: field
//! names are design identifiers, not keywords. Nothing here talks to SQL or
//! to storage directly; `analysis` builds these values, `decider` reads them,
//! `store` persists them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;

/// A bound SQL parameter or literal value.
///
/// Heterogeneous parameter types (REDESIGN FLAGS: "heterogeneous parameter
/// value types") are modeled as this tagged union rather than as dynamically
/// typed values; the binder and value-formatter are total functions over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

impl ParamValue {
    pub fn as_str_lossy(&self) -> String {
        match self {
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Str(s) => s.clone(),
            ParamValue::Null => "NULL".to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Ordering used to sort `IN (...)` lists canonically: numeric ascending
    /// if every member is numeric, lexicographic otherwise. Callers decide
    /// which comparator applies across the whole list; this is the
    /// per-pair comparator for the lexicographic fallback.
    pub fn cmp_lexicographic(&self, other: &ParamValue) -> CmpOrdering {
        self.as_str_lossy().cmp(&other.as_str_lossy())
    }
}

/// Condition operators, exactly the eleven named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    Exists,
    NotExists,
}

impl Operator {
    pub fn is_equality_like(&self) -> bool {
        matches!(self, Operator::Eq | Operator::In)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT_BETWEEN",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
            Operator::Exists => "EXISTS",
            Operator::NotExists => "NOT_EXISTS",
        }
    }
}

/// The value half of a `Condition`: a scalar, an ordered list (`IN`/`NOT_IN`),
/// a 2-tuple (`BETWEEN`), or absent (null-tests/exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionValue {
    Scalar(ParamValue),
    List(Vec<ParamValue>),
    Range(ParamValue, ParamValue),
    None,
}

impl ConditionValue {
    /// Canonical ordering of list members: numeric ascending if every member
    /// parses as a number, lexicographic ascending otherwise (§4.D, §4.F).
    pub fn sorted(&self) -> ConditionValue {
        match self {
            ConditionValue::List(values) => {
                let mut sorted = values.clone();
                let all_numeric = sorted.iter().all(|v| v.as_f64().is_some());
                if all_numeric {
                    sorted.sort_by(|a, b| {
                        a.as_f64()
                            .unwrap()
                            .partial_cmp(&b.as_f64().unwrap())
                            .unwrap_or(CmpOrdering::Equal)
                    });
                } else {
                    sorted.sort_by(|a, b| a.cmp_lexicographic(b));
                }
                ConditionValue::List(sorted)
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// Only equi-joins of the form `a.x = b.y` are captured structurally; other
/// ON-clauses contribute only to the fingerprint via the normalized SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCondition {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    pub join_type: JoinType,
}

/// A single table's contribution to a query: its projected columns and the
/// conditions/joins attributed to it.
///
/// Invariant: for multi-table SELECTs, all WHERE conditions and all join
/// conditions are attached to `tables[0]` (see Open Question #2 in
/// `DESIGN.md`): the decider only ever reads conditions from the anchor
/// table, so per-table row-overlap precision on non-anchor tables is not
/// supported by this data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAccess {
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub join_conditions: Vec<JoinCondition>,
}

impl TableAccess {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            conditions: Vec::new(),
            join_conditions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    RowLookup,
    Aggregate,
    Join,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByClause {
    pub column: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperation {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// Deterministic short identifier of a `CacheKey`. Newtype around `String` so
/// widening the hex length later (Open Question #3) is a one-line change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full semantic descriptor of a cacheable SELECT.
///
/// Constructed only via `CacheKeyBuilder` (REDESIGN FLAGS: stateful mutable
/// `CacheKey` construction is replaced by a builder that finalizes an
/// immutable value whose fingerprint is computed from the builder's frozen
/// form) — there is no public constructor that allows mutating fields after
/// `fingerprint` has been computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub tables: Vec<TableAccess>,
    pub classification: Classification,
    pub normalized_sql: String,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
    pub has_subquery: bool,
    pub set_operation: Option<SetOperation>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOperation {
    Insert,
    Update,
    Delete,
}

/// The semantic descriptor of an INSERT/UPDATE/DELETE extracted for
/// invalidation analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteInfo {
    pub table: String,
    pub operation: WriteOperation,
    /// Populated only when the analyzer can recover row identifiers
    /// directly from equality or `IN` conditions.
    pub affected_rows: Option<Vec<String>>,
    /// Populated only for UPDATE.
    pub modified_columns: Option<Vec<String>>,
    pub conditions: Option<Vec<Condition>>,
}

/// The persisted row shape for the `cache_entries` tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub fingerprint: Fingerprint,
    pub result_blob: Vec<u8>,
    pub cache_key_json: String,
    pub created_at_secs: u64,
}
