//! AST extractor (component C).
//!
//! Turns the parser adapter's typed AST into the structured descriptors the
//! rest of the analyzer works with: tables, columns, conditions, joins,
//! order/limit/offset/distinct, subquery and set-operation flags.
//!
//! Two simplifications are load-bearing and intentionally *not* "fixed"
//! (`DESIGN.md` Open Questions #1 and #2):
//!
//! - `AND`/`OR` are both flattened to a single condition list by
//!   concatenation; the decider treats every condition as if conjunctive.
//!   This is unsound for disjunctions (`WHERE id = 1 OR id = 2` becomes
//!   indistinguishable from the AND form).
//! - For multi-table SELECTs, all WHERE conditions and all join conditions
//!   are attached to `tables[0]`; only column references are attributed to
//!   their declared table. Downstream analysis (the decider) only ever reads
//!   conditions from the anchor table.

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, GroupByExpr, Join, JoinConstraint,
    JoinOperator, ObjectName, OrderByExpr, Query, Select, SelectItem, SetExpr, SetOperator,
    SetQuantifier, TableFactor, TableWithJoins, Value as SqlValue,
};

use crate::error::AnalysisError;
use crate::model::{
    Condition, ConditionValue, JoinCondition, JoinType, OrderByClause, OrderDirection, ParamValue,
    SetOperation, TableAccess,
};

/// Everything the extractor pulls out of a parsed SELECT.
pub struct SelectExtract {
    pub tables: Vec<TableAccess>,
    pub has_aggregate: bool,
    pub order_by: Vec<OrderByClause>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub distinct: bool,
    pub has_subquery: bool,
    pub set_operation: Option<SetOperation>,
}

pub fn extract_select(query: &Query) -> Result<SelectExtract, AnalysisError> {
    let set_operation = detect_set_operation(&query.body);
    let select = first_select(&query.body)?;

    let mut tables = extract_tables(&select.from)?;
    if tables.is_empty() {
        return Err(AnalysisError::Unsupported("missing FROM table".into()));
    }

    let (mut conditions, subquery_in_where) = match &select.selection {
        Some(expr) => flatten_conditions(expr),
        None => (Vec::new(), false),
    };

    let has_aggregate = assign_columns(&mut tables, &select.projection)?;

    // Per the data-model invariant, the anchor table (tables[0]) owns the
    // full aggregated conditions and join-condition sets.
    tables[0].conditions.append(&mut conditions);

    let has_subquery = subquery_in_where
        || contains_subquery_in_from(&select.from)
        || contains_group_by_subquery(&select.group_by);

    let order_by = extract_order_by(order_by_source(query));
    let limit = extract_limit(limit_source(query))?;
    let offset = extract_offset(offset_source(query))?;
    let distinct = select.distinct.is_some();

    Ok(SelectExtract {
        tables,
        has_aggregate,
        order_by,
        limit,
        offset,
        distinct,
        has_subquery,
        set_operation,
    })
}

/// For set-operation queries, ORDER BY/LIMIT/OFFSET are drawn from the
/// trailing tail (the outer `Query`) rather than the first branch.
fn order_by_source(query: &Query) -> &[OrderByExpr] {
    &query.order_by
}
fn limit_source(query: &Query) -> &Option<Expr> {
    &query.limit
}
fn offset_source(query: &Query) -> &Option<sqlparser::ast::Offset> {
    &query.offset
}

fn detect_set_operation(body: &SetExpr) -> Option<SetOperation> {
    match body {
        SetExpr::SetOperation {
            op, set_quantifier, ..
        } => Some(map_set_operation(op, set_quantifier)),
        SetExpr::Query(inner) => detect_set_operation(&inner.body),
        _ => None,
    }
}

fn map_set_operation(op: &SetOperator, quantifier: &SetQuantifier) -> SetOperation {
    match op {
        SetOperator::Union => {
            if matches!(quantifier, SetQuantifier::All) {
                SetOperation::UnionAll
            } else {
                SetOperation::Union
            }
        }
        SetOperator::Intersect => SetOperation::Intersect,
        SetOperator::Except => SetOperation::Except,
    }
}

/// Recurse into a set-operation tree and return the leftmost SELECT, which
/// anchors table/column extraction for the whole query.
fn first_select(body: &SetExpr) -> Result<&Select, AnalysisError> {
    match body {
        SetExpr::Select(select) => Ok(select),
        SetExpr::SetOperation { left, .. } => first_select(left),
        SetExpr::Query(inner) => first_select(&inner.body),
        _ => Err(AnalysisError::Unsupported(
            "only SELECT queries are supported".into(),
        )),
    }
}

// ---------------------------------------------------------------------
// Tables and joins
// ---------------------------------------------------------------------

fn extract_tables(from: &[TableWithJoins]) -> Result<Vec<TableAccess>, AnalysisError> {
    let mut tables = Vec::new();
    let mut join_conditions = Vec::new();

    for (i, item) in from.iter().enumerate() {
        let base = table_access_from_factor(&item.relation)?;
        let base_name = base.table.clone();
        let base_alias = base.alias.clone();
        tables.push(base);

        for join in &item.joins {
            let joined = table_access_from_factor(&join.relation)?;
            let joined_name = joined.table.clone();
            let joined_alias = joined.alias.clone();
            let join_type = join_type_of(join);

            if let Some(jc) = structural_join_condition(
                join,
                &base_name,
                base_alias.as_deref(),
                &joined_name,
                joined_alias.as_deref(),
                join_type,
            ) {
                join_conditions.push(jc);
            }

            tables.push(joined);
        }

        if i > 0 && !join_conditions.is_empty() {
            // Additional comma-separated FROM items with no ON clause are an
            // implicit cross join; nothing structural to record.
        }
    }

    if let Some(anchor) = tables.get_mut(0) {
        anchor.join_conditions.append(&mut join_conditions);
    }

    Ok(tables)
}

fn table_access_from_factor(factor: &TableFactor) -> Result<TableAccess, AnalysisError> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let mut access = TableAccess::new(object_name_to_string(name));
            access.alias = alias.as_ref().map(|a| a.name.value.clone());
            Ok(access)
        }
        TableFactor::Derived { .. } => {
            // A derived (subquery) table contributes only to the subquery
            // flag; it has no analyzable name of its own.
            let mut access = TableAccess::new("<derived>");
            access.alias = None;
            Ok(access)
        }
        other => Err(AnalysisError::Unsupported(format!(
            "unsupported table expression: {:?}",
            other
        ))),
    }
}

fn join_type_of(join: &Join) -> JoinType {
    match &join.join_operator {
        JoinOperator::Inner(_) => JoinType::Inner,
        JoinOperator::LeftOuter(_) => JoinType::Left,
        JoinOperator::RightOuter(_) => JoinType::Right,
        JoinOperator::FullOuter(_) => JoinType::Full,
        JoinOperator::CrossJoin => JoinType::Cross,
        _ => JoinType::Inner,
    }
}

fn join_constraint_of(join: &Join) -> Option<&JoinConstraint> {
    match &join.join_operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => Some(c),
        _ => None,
    }
}

/// If the ON clause is a plain equality between two column references, emit
/// a structural `JoinCondition`; otherwise the ON clause contributes only to
/// the fingerprint via the normalized SQL text.
fn structural_join_condition(
    join: &Join,
    left_table: &str,
    left_alias: Option<&str>,
    right_table: &str,
    right_alias: Option<&str>,
    join_type: JoinType,
) -> Option<JoinCondition> {
    let constraint = join_constraint_of(join)?;
    let JoinConstraint::On(expr) = constraint else {
        return None;
    };

    let Expr::BinaryOp {
        left,
        op: BinaryOperator::Eq,
        right,
    } = expr
    else {
        return None;
    };

    let (left_col, left_ref) = compound_ref(left)?;
    let (right_col, right_ref) = compound_ref(right)?;

    let resolve = |ref_name: &str| -> Option<&str> {
        if ref_name == left_table || Some(ref_name) == left_alias {
            Some(left_table)
        } else if ref_name == right_table || Some(ref_name) == right_alias {
            Some(right_table)
        } else {
            None
        }
    };

    let left_table_resolved = resolve(&left_ref)?;
    let right_table_resolved = resolve(&right_ref)?;

    Some(JoinCondition {
        left_table: left_table_resolved.to_string(),
        left_column: left_col,
        right_table: right_table_resolved.to_string(),
        right_column: right_col,
        join_type,
    })
}

/// Extract `(column, table_or_alias)` from a `t.col` style reference.
fn compound_ref(expr: &Expr) -> Option<(String, String)> {
    match expr {
        Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
            let table = idents[idents.len() - 2].value.clone();
            let column = idents[idents.len() - 1].value.clone();
            Some((column, table))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Column / projection assignment
// ---------------------------------------------------------------------

/// Assigns each projected column/aggregate expression to its owning table.
/// Single-table SELECTs attach everything to the sole table; multi-table
/// SELECTs attribute qualified references by alias/name and fall back to the
/// anchor table (`tables[0]`) for anything unattributed. Returns whether any
/// aggregate function appeared in the select list.
fn assign_columns(
    tables: &mut [TableAccess],
    projection: &[SelectItem],
) -> Result<bool, AnalysisError> {
    let single_table = tables.len() == 1;
    let mut has_aggregate = false;

    for item in projection {
        match item {
            SelectItem::Wildcard(_) => {
                tables[0].columns.push("*".to_string());
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let owner = object_name_to_string(name);
                let idx = resolve_table_index(tables, &owner).unwrap_or(0);
                tables[idx].columns.push("*".to_string());
            }
            SelectItem::UnnamedExpr(expr) => {
                let (rendered, is_agg) = render_projection_expr(expr);
                has_aggregate |= is_agg;
                let idx = if single_table {
                    0
                } else {
                    owning_table_index(tables, expr).unwrap_or(0)
                };
                tables[idx].columns.push(rendered);
            }
            SelectItem::ExprWithAlias { expr, .. } => {
                let (rendered, is_agg) = render_projection_expr(expr);
                has_aggregate |= is_agg;
                let idx = if single_table {
                    0
                } else {
                    owning_table_index(tables, expr).unwrap_or(0)
                };
                tables[idx].columns.push(rendered);
            }
        }
    }

    Ok(has_aggregate)
}

fn resolve_table_index(tables: &[TableAccess], name: &str) -> Option<usize> {
    tables
        .iter()
        .position(|t| t.table == name || t.alias.as_deref() == Some(name))
}

fn owning_table_index(tables: &[TableAccess], expr: &Expr) -> Option<usize> {
    match expr {
        Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
            let owner = idents[idents.len() - 2].value.clone();
            resolve_table_index(tables, &owner)
        }
        Expr::Function(func) => func
            .args
            .iter()
            .find_map(|arg| function_arg_expr(arg).and_then(|e| owning_table_index(tables, e))),
        _ => None,
    }
}

fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Some(e),
        FunctionArg::Named {
            arg: FunctionArgExpr::Expr(e),
            ..
        } => Some(e),
        _ => None,
    }
}

/// Render a projection expression as the string form the data model expects:
/// a plain column name, or an aggregate-expression string like `SUM(price)`.
fn render_projection_expr(expr: &Expr) -> (String, bool) {
    match expr {
        Expr::Identifier(ident) => (ident.value.clone(), false),
        Expr::CompoundIdentifier(idents) => (
            idents.iter().map(|i| i.value.clone()).collect::<Vec<_>>().join("."),
            false,
        ),
        Expr::Function(func) => {
            let is_agg = is_aggregate_function(func);
            (render_function(func), is_agg)
        }
        other => (format!("{}", other), false),
    }
}

fn is_aggregate_function(func: &Function) -> bool {
    matches!(
        func.name.to_string().to_uppercase().as_str(),
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "PERCENTILE" | "GROUP_CONCAT" | "ARRAY_AGG"
    )
}

fn render_function(func: &Function) -> String {
    let name = func.name.to_string().to_uppercase();
    let args = func
        .args
        .iter()
        .map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => "*".to_string(),
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => render_projection_expr(e).0,
            FunctionArg::Named {
                arg: FunctionArgExpr::Expr(e),
                ..
            } => render_projection_expr(e).0,
            _ => "?".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{}({})", name, args)
}

// ---------------------------------------------------------------------
// WHERE conditions
// ---------------------------------------------------------------------

/// Flattens `AND`/`OR` by concatenation (see module doc for the
/// unsoundness this implies) and returns `(conditions, saw_subquery)`.
fn flatten_conditions(expr: &Expr) -> (Vec<Condition>, bool) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        }
        | Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            let (mut lc, ls) = flatten_conditions(left);
            let (mut rc, rs) = flatten_conditions(right);
            lc.append(&mut rc);
            (lc, ls || rs)
        }

        Expr::Nested(inner) => flatten_conditions(inner),

        Expr::BinaryOp { left, op, right } => {
            if let Some(operator) = binary_operator(op) {
                if let Some(column) = column_name(left) {
                    if let Ok(value) = extract_scalar(right) {
                        return (
                            vec![Condition {
                                column,
                                operator,
                                value: ConditionValue::Scalar(value),
                            }],
                            false,
                        );
                    }
                }
            }
            (Vec::new(), false)
        }

        Expr::Like {
            negated,
            expr: target,
            pattern,
            ..
        } => {
            if let (Some(column), Ok(value)) = (column_name(target), extract_scalar(pattern)) {
                let operator = if *negated {
                    crate::model::Operator::NotLike
                } else {
                    crate::model::Operator::Like
                };
                return (
                    vec![Condition {
                        column,
                        operator,
                        value: ConditionValue::Scalar(value),
                    }],
                    false,
                );
            }
            (Vec::new(), false)
        }

        Expr::Between {
            expr: target,
            negated,
            low,
            high,
        } => {
            if let Some(column) = column_name(target) {
                if let (Ok(lo), Ok(hi)) = (extract_scalar(low), extract_scalar(high)) {
                    let operator = if *negated {
                        crate::model::Operator::NotBetween
                    } else {
                        crate::model::Operator::Between
                    };
                    return (
                        vec![Condition {
                            column,
                            operator,
                            value: ConditionValue::Range(lo, hi),
                        }],
                        false,
                    );
                }
            }
            (Vec::new(), false)
        }

        Expr::IsNull(target) => {
            if let Some(column) = column_name(target) {
                return (
                    vec![Condition {
                        column,
                        operator: crate::model::Operator::IsNull,
                        value: ConditionValue::None,
                    }],
                    false,
                );
            }
            (Vec::new(), false)
        }

        Expr::IsNotNull(target) => {
            if let Some(column) = column_name(target) {
                return (
                    vec![Condition {
                        column,
                        operator: crate::model::Operator::IsNotNull,
                        value: ConditionValue::None,
                    }],
                    false,
                );
            }
            (Vec::new(), false)
        }

        Expr::InList {
            expr: target,
            list,
            negated,
        } => {
            if let Some(column) = column_name(target) {
                let values: Vec<ParamValue> = list.iter().filter_map(|e| extract_scalar(e).ok()).collect();
                if values.len() == list.len() {
                    let operator = if *negated {
                        crate::model::Operator::NotIn
                    } else {
                        crate::model::Operator::In
                    };
                    return (
                        vec![Condition {
                            column,
                            operator,
                            value: ConditionValue::List(values),
                        }],
                        false,
                    );
                }
            }
            (Vec::new(), false)
        }

        Expr::InSubquery { .. } => (Vec::new(), true),

        Expr::Exists { negated, .. } => {
            let operator = if *negated {
                crate::model::Operator::NotExists
            } else {
                crate::model::Operator::Exists
            };
            (
                vec![Condition {
                    column: "EXISTS".to_string(),
                    operator,
                    value: ConditionValue::None,
                }],
                true,
            )
        }

        _ => (Vec::new(), false),
    }
}

fn binary_operator(op: &BinaryOperator) -> Option<crate::model::Operator> {
    match op {
        BinaryOperator::Eq => Some(crate::model::Operator::Eq),
        BinaryOperator::NotEq => Some(crate::model::Operator::NotEq),
        BinaryOperator::Gt => Some(crate::model::Operator::Gt),
        BinaryOperator::Lt => Some(crate::model::Operator::Lt),
        BinaryOperator::GtEq => Some(crate::model::Operator::GtEq),
        BinaryOperator::LtEq => Some(crate::model::Operator::LtEq),
        _ => None,
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => Some(idents.last()?.value.clone()),
        _ => None,
    }
}

fn extract_scalar(expr: &Expr) -> Result<ParamValue, AnalysisError> {
    match expr {
        Expr::Value(v) => sql_value_to_param(v),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr,
        } => {
            if let Expr::Value(SqlValue::Number(n, _)) = expr.as_ref() {
                let negated = format!("-{}", n);
                if let Ok(i) = negated.parse::<i64>() {
                    return Ok(ParamValue::Int(i));
                }
                if let Ok(f) = negated.parse::<f64>() {
                    return Ok(ParamValue::Float(f));
                }
            }
            Err(AnalysisError::Unsupported("unsupported negative literal".into()))
        }
        _ => Err(AnalysisError::Unsupported("expected a literal value".into())),
    }
}

fn sql_value_to_param(v: &SqlValue) -> Result<ParamValue, AnalysisError> {
    match v {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(ParamValue::Int(i))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(ParamValue::Float(f))
            } else {
                Err(AnalysisError::Unsupported(format!("invalid number: {}", n)))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Ok(ParamValue::Str(s.clone()))
        }
        SqlValue::Boolean(b) => Ok(ParamValue::Bool(*b)),
        SqlValue::Null => Ok(ParamValue::Null),
        _ => Err(AnalysisError::Unsupported("unsupported literal type".into())),
    }
}

// ---------------------------------------------------------------------
// ORDER BY / LIMIT / OFFSET
// ---------------------------------------------------------------------

fn extract_order_by(order_by: &[OrderByExpr]) -> Vec<OrderByClause> {
    order_by
        .iter()
        .filter_map(|o| {
            let column = column_name(&o.expr)?;
            let direction = if o.asc.unwrap_or(true) {
                OrderDirection::Asc
            } else {
                OrderDirection::Desc
            };
            Some(OrderByClause { column, direction })
        })
        .collect()
}

fn extract_limit(limit: &Option<Expr>) -> Result<Option<usize>, AnalysisError> {
    let Some(expr) = limit else { return Ok(None) };
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<usize>()
            .map(Some)
            .map_err(|_| AnalysisError::Unsupported("invalid LIMIT value".into())),
        _ => Err(AnalysisError::Unsupported("unsupported LIMIT expression".into())),
    }
}

fn extract_offset(offset: &Option<sqlparser::ast::Offset>) -> Result<Option<usize>, AnalysisError> {
    let Some(offset) = offset else { return Ok(None) };
    match &offset.value {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<usize>()
            .map(Some)
            .map_err(|_| AnalysisError::Unsupported("invalid OFFSET value".into())),
        _ => Err(AnalysisError::Unsupported("unsupported OFFSET expression".into())),
    }
}

// ---------------------------------------------------------------------
// Subquery detection
// ---------------------------------------------------------------------

fn contains_subquery_in_from(from: &[TableWithJoins]) -> bool {
    from.iter().any(|item| {
        matches!(item.relation, TableFactor::Derived { .. })
            || item
                .joins
                .iter()
                .any(|j| matches!(j.relation, TableFactor::Derived { .. }))
    })
}

fn contains_group_by_subquery(group_by: &GroupByExpr) -> bool {
    // GROUP BY is not structurally tracked (see module doc), but a
    // subquery inside it should still raise the flag.
    match group_by {
        GroupByExpr::Expressions(exprs) => exprs.iter().any(expr_contains_subquery),
        GroupByExpr::All => false,
    }
}

fn expr_contains_subquery(expr: &Expr) -> bool {
    match expr {
        Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => true,
        Expr::BinaryOp { left, right, .. } => {
            expr_contains_subquery(left) || expr_contains_subquery(right)
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::IsNull(expr) | Expr::IsNotNull(expr) => {
            expr_contains_subquery(expr)
        }
        Expr::Between { expr, low, high, .. } => {
            expr_contains_subquery(expr) || expr_contains_subquery(low) || expr_contains_subquery(high)
        }
        Expr::InList { expr, list, .. } => {
            expr_contains_subquery(expr) || list.iter().any(expr_contains_subquery)
        }
        _ => false,
    }
}

pub fn object_name_to_string(name: &ObjectName) -> String {
    super::parser::object_name_to_string(name)
}

/// Extracts the flattened condition list from an UPDATE/DELETE WHERE clause,
/// reusing the same AND/OR-flattening rules the SELECT path uses.
pub(crate) fn extract_write_conditions(selection: &Option<Expr>) -> Option<Vec<Condition>> {
    let expr = selection.as_ref()?;
    let (conditions, _) = flatten_conditions(expr);
    if conditions.is_empty() {
        None
    } else {
        Some(conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::{parse_statement, ParsedStatement};

    fn extract(sql: &str) -> SelectExtract {
        match parse_statement(sql).unwrap() {
            ParsedStatement::Select(q) => extract_select(&q).unwrap(),
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn single_table_wildcard() {
        let e = extract("SELECT * FROM users WHERE id = 10");
        assert_eq!(e.tables.len(), 1);
        assert_eq!(e.tables[0].table, "users");
        assert_eq!(e.tables[0].columns, vec!["*".to_string()]);
        assert_eq!(e.tables[0].conditions.len(), 1);
        assert_eq!(e.tables[0].conditions[0].column, "id");
    }

    #[test]
    fn in_list_condition() {
        let e = extract("SELECT * FROM users WHERE id IN (3,1,2)");
        let cond = &e.tables[0].conditions[0];
        assert_eq!(cond.operator, crate::model::Operator::In);
        assert!(matches!(cond.value, ConditionValue::List(_)));
    }

    #[test]
    fn between_condition() {
        let e = extract("SELECT * FROM users WHERE age BETWEEN 18 AND 65");
        let cond = &e.tables[0].conditions[0];
        assert_eq!(cond.operator, crate::model::Operator::Between);
        assert!(matches!(cond.value, ConditionValue::Range(_, _)));
    }

    #[test]
    fn aggregate_detected() {
        let e = extract("SELECT COUNT(*) FROM users");
        assert!(e.has_aggregate);
    }

    #[test]
    fn join_condition_extracted() {
        let e = extract(
            "SELECT * FROM orders o JOIN users u ON o.user_id = u.id WHERE o.status = 'paid'",
        );
        assert_eq!(e.tables.len(), 2);
        assert_eq!(e.tables[0].join_conditions.len(), 1);
        let jc = &e.tables[0].join_conditions[0];
        assert_eq!(jc.left_column, "user_id");
        assert_eq!(jc.right_column, "id");
    }

    #[test]
    fn order_by_limit_offset() {
        let e = extract("SELECT * FROM users ORDER BY created_at DESC LIMIT 10 OFFSET 5");
        assert_eq!(e.order_by.len(), 1);
        assert_eq!(e.order_by[0].direction, OrderDirection::Desc);
        assert_eq!(e.limit, Some(10));
        assert_eq!(e.offset, Some(5));
    }

    #[test]
    fn exists_sets_subquery_flag() {
        let e = extract("SELECT * FROM users WHERE EXISTS (SELECT 1 FROM orders WHERE orders.user_id = users.id)");
        assert!(e.has_subquery);
    }

    #[test]
    fn set_operation_detected() {
        match parse_statement("SELECT id FROM users UNION ALL SELECT id FROM archived_users").unwrap() {
            ParsedStatement::Select(q) => {
                let e = extract_select(&q).unwrap();
                assert_eq!(e.set_operation, Some(SetOperation::UnionAll));
            }
            _ => panic!("expected select"),
        }
    }
}
