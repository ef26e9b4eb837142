//! Parameter binding utilities for database statements.
//!
//! Statements carry `@name` placeholders. Before execution the text is rewritten
//! to the backend's positional form (`?` for MySQL and SQLite, `$n` for
//! PostgreSQL) and the values are collected in occurrence order, then packed
//! into the driver's argument buffer.

use crate::error::{DbError, DbResult};
use crate::models::{CommandKind, DatabaseType, Statement, Value};
use crate::sql::generator::is_identifier;
use sqlx::Arguments;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use std::collections::HashMap;

/// Statement text in positional form plus values in binding order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite a statement for the given backend.
pub(crate) fn render(stmt: &Statement, db_type: DatabaseType) -> DbResult<RenderedStatement> {
    match stmt.kind {
        CommandKind::Text => rewrite_placeholders(&stmt.sql, stmt.params(), db_type),
        CommandKind::StoredProcedure => {
            let call = procedure_call(stmt, db_type)?;
            rewrite_placeholders(&call, stmt.params(), db_type)
        }
    }
}

fn procedure_call(stmt: &Statement, db_type: DatabaseType) -> DbResult<String> {
    if db_type == DatabaseType::SQLite {
        return Err(DbError::invalid_input(
            "SQLite does not support stored procedures",
        ));
    }
    let name = stmt.sql.trim();
    if name.is_empty() || !name.split('.').all(is_identifier) {
        return Err(DbError::invalid_input(format!(
            "Invalid stored procedure name: '{}'",
            name
        )));
    }
    let args: Vec<String> = stmt.params().iter().map(|(n, _)| format!("@{}", n)).collect();
    Ok(format!("CALL {}({})", name, args.join(", ")))
}

/// Replace `@name` placeholders outside quotes and comments.
///
/// `@@name` is passed through untouched (MySQL system variables). Repeated
/// names are bound once per occurrence.
fn rewrite_placeholders(
    sql: &str,
    params: &[(String, Value)],
    db_type: DatabaseType,
) -> DbResult<RenderedStatement> {
    let lookup: HashMap<&str, &Value> = params.iter().map(|(n, v)| (n.as_str(), v)).collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::with_capacity(params.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    out.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '@' if chars.peek() == Some(&'@') => {
                out.push_str("@@");
                chars.next();
            }
            '@' if chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = lookup
                    .get(name.as_str())
                    .map(|&v| v.clone())
                    .ok_or_else(|| {
                        DbError::invalid_input(format!("No value bound for parameter @{}", name))
                    })?;
                values.push(value);
                match db_type {
                    DatabaseType::PostgreSQL => {
                        out.push('$');
                        out.push_str(&values.len().to_string());
                    }
                    DatabaseType::MySQL | DatabaseType::SQLite => out.push('?'),
                }
            }
            _ => out.push(c),
        }
    }

    Ok(RenderedStatement { sql: out, values })
}

fn bind_error(err: sqlx::error::BoxDynError) -> DbError {
    DbError::invalid_input(format!("Cannot bind parameter: {}", err))
}

/// Pack values into a MySQL argument buffer.
pub(crate) fn mysql_arguments(values: Vec<Value>) -> DbResult<MySqlArguments> {
    let mut args = MySqlArguments::default();
    for value in values {
        match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::String(v) => args.add(v),
            Value::Bytes(v) => args.add(v),
            Value::Json(v) => args.add(Json(v)),
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

/// Pack values into a PostgreSQL argument buffer.
pub(crate) fn postgres_arguments(values: Vec<Value>) -> DbResult<PgArguments> {
    let mut args = PgArguments::default();
    for value in values {
        match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::String(v) => args.add(v),
            Value::Bytes(v) => args.add(v),
            Value::Json(v) => args.add(Json(v)),
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

/// Pack values into a SQLite argument buffer.
pub(crate) fn sqlite_arguments<'q>(values: Vec<Value>) -> DbResult<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();
    for value in values {
        match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::String(v) => args.add(v),
            Value::Bytes(v) => args.add(v),
            // SQLite doesn't have native JSON type, store as string
            Value::Json(v) => args.add(v.to_string()),
        }
        .map_err(bind_error)?;
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt() -> Statement {
        Statement::new("UPDATE t SET a = @a, b = @b WHERE id = @id")
            .bind("id", 1)
            .bind("a", "x")
            .bind("b", 2.5)
    }

    #[test]
    fn test_question_mark_placeholders_follow_text_order() {
        let rendered = render(&stmt(), DatabaseType::SQLite).unwrap();
        assert_eq!(rendered.sql, "UPDATE t SET a = ?, b = ? WHERE id = ?");
        assert_eq!(
            rendered.values,
            vec![Value::String("x".into()), Value::Float(2.5), Value::Int(1)]
        );
    }

    #[test]
    fn test_postgres_numbered_placeholders() {
        let rendered = render(&stmt(), DatabaseType::PostgreSQL).unwrap();
        assert_eq!(rendered.sql, "UPDATE t SET a = $1, b = $2 WHERE id = $3");
    }

    #[test]
    fn test_repeated_parameter_binds_twice() {
        let s = Statement::new("SELECT * FROM t WHERE a = @v OR b = @v").bind("v", 3);
        let rendered = render(&s, DatabaseType::MySQL).unwrap();
        assert_eq!(rendered.sql, "SELECT * FROM t WHERE a = ? OR b = ?");
        assert_eq!(rendered.values.len(), 2);
    }

    #[test]
    fn test_quotes_comments_and_system_variables_untouched() {
        let s = Statement::new(
            "SELECT '@literal', \"@ident\", @@version -- @comment\nFROM t /* @block */ WHERE x = @x",
        )
        .bind("x", 1);
        let rendered = render(&s, DatabaseType::MySQL).unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT '@literal', \"@ident\", @@version -- @comment\nFROM t /* @block */ WHERE x = ?"
        );
        assert_eq!(rendered.values, vec![Value::Int(1)]);
    }

    #[test]
    fn test_missing_parameter_is_invalid_input() {
        let s = Statement::new("DELETE FROM t WHERE id = @id");
        let err = render(&s, DatabaseType::SQLite).unwrap_err();
        assert!(err.to_string().contains("@id"));
    }

    #[test]
    fn test_stored_procedure_call() {
        let s = Statement::procedure("billing.close_period")
            .bind("period", 7)
            .bind("force", true);
        let rendered = render(&s, DatabaseType::PostgreSQL).unwrap();
        assert_eq!(rendered.sql, "CALL billing.close_period($1, $2)");
        assert!(render(&s, DatabaseType::SQLite).is_err());
    }

    #[test]
    fn test_argument_buffers_accept_all_values() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(1),
            Value::Float(1.5),
            Value::String("s".into()),
            Value::Bytes(vec![1, 2]),
            Value::Json(serde_json::json!({"a": 1})),
        ];
        assert!(mysql_arguments(values.clone()).is_ok());
        assert!(postgres_arguments(values.clone()).is_ok());
        assert!(sqlite_arguments(values).is_ok());
    }
}
