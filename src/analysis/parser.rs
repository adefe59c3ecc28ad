//! SQL parser adapter (component B).
//!
//! The only place that knows the shape of the external parser library
//! (`sqlparser`, pinned to `GenericDialect` as a MySQL-compatible subset).
//! Everything downstream receives either a borrowed SELECT query or a small
//! first-class `WriteStatement`, never a raw `sqlparser::ast::Statement`
//! (REDESIGN FLAGS: dynamic AST walking over untyped nodes is replaced with
//! exhaustive matches over a concrete sum type at the one place that must
//! know the parser's shape).

use sqlparser::ast::{Assignment, Expr, ObjectName, Query, Statement, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::AnalysisError;

/// A parsed SELECT, or the parsed subset of an INSERT/UPDATE/DELETE that
/// component C needs.
pub enum ParsedStatement {
    Select(Box<Query>),
    Write(WriteStatement),
}

pub enum WriteStatement {
    Insert {
        table: String,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
}

/// Parse `sql` (already parameter-bound) and adapt it to `ParsedStatement`.
/// When the parser returns a batch, the first statement is taken.
pub fn parse_statement(sql: &str) -> Result<ParsedStatement, AnalysisError> {
    let dialect = GenericDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql)?;

    if statements.is_empty() {
        return Err(AnalysisError::ParseFailed("empty query".into()));
    }

    let statement = statements.remove(0);
    adapt(statement)
}

fn adapt(statement: Statement) -> Result<ParsedStatement, AnalysisError> {
    match statement {
        Statement::Query(query) => Ok(ParsedStatement::Select(query)),

        Statement::Insert { table_name, .. } => Ok(ParsedStatement::Write(WriteStatement::Insert {
            table: object_name_to_string(&table_name),
        })),

        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table_name = table_with_joins_name(&table)?;
            Ok(ParsedStatement::Write(WriteStatement::Update {
                table: table_name,
                assignments,
                selection,
            }))
        }

        Statement::Delete {
            from, selection, ..
        } => {
            let table_name = delete_from_name(&from)?;
            Ok(ParsedStatement::Write(WriteStatement::Delete {
                table: table_name,
                selection,
            }))
        }

        other => Err(AnalysisError::Unsupported(format!(
            "statement type not supported: {}",
            statement_kind(&other)
        ))),
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::AlterTable { .. } => "ALTER TABLE",
        _ => "unrecognized statement",
    }
}

pub fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

fn table_with_joins_name(table: &TableWithJoins) -> Result<String, AnalysisError> {
    match &table.relation {
        sqlparser::ast::TableFactor::Table { name, .. } => Ok(object_name_to_string(name)),
        _ => Err(AnalysisError::Unsupported(
            "unsupported UPDATE target expression".into(),
        )),
    }
}

fn delete_from_name(from: &sqlparser::ast::FromTable) -> Result<String, AnalysisError> {
    let tables = match from {
        sqlparser::ast::FromTable::WithFromKeyword(t) => t,
        sqlparser::ast::FromTable::WithoutKeyword(t) => t,
    };
    let first = tables
        .first()
        .ok_or_else(|| AnalysisError::Unsupported("DELETE missing FROM table".into()))?;
    table_with_joins_name(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select() {
        let parsed = parse_statement("SELECT * FROM users").unwrap();
        assert!(matches!(parsed, ParsedStatement::Select(_)));
    }

    #[test]
    fn parses_insert_table_name() {
        let parsed = parse_statement("INSERT INTO users (id, name) VALUES (1, 'a')").unwrap();
        match parsed {
            ParsedStatement::Write(WriteStatement::Insert { table }) => {
                assert_eq!(table, "users");
            }
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn parses_update_table_and_assignments() {
        let parsed = parse_statement("UPDATE users SET email = 'x@y' WHERE id = 10").unwrap();
        match parsed {
            ParsedStatement::Write(WriteStatement::Update {
                table,
                assignments,
                selection,
            }) => {
                assert_eq!(table, "users");
                assert_eq!(assignments.len(), 1);
                assert!(selection.is_some());
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn parses_delete_table_and_selection() {
        let parsed = parse_statement("DELETE FROM users WHERE id = 10").unwrap();
        match parsed {
            ParsedStatement::Write(WriteStatement::Delete { table, selection }) => {
                assert_eq!(table, "users");
                assert!(selection.is_some());
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn multiple_statements_takes_first() {
        let parsed = parse_statement("SELECT * FROM users; SELECT * FROM orders").unwrap();
        assert!(matches!(parsed, ParsedStatement::Select(_)));
    }

    #[test]
    fn empty_query_is_parse_failed() {
        let result = parse_statement("   ");
        assert!(matches!(result, Err(AnalysisError::ParseFailed(_))));
    }
}
