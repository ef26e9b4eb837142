//! SQL statement generation from record shapes.
//!
//! All builders are pure: they produce a [`Statement`] with `@name`
//! placeholders and never touch a connection. Column lists always follow the
//! record shape's field order, and placeholders are emitted in the same order
//! as their columns.

use crate::error::{DbError, DbResult};
use crate::models::{RecordShape, Statement, Value};

/// Build `INSERT INTO table (cols) VALUES (@cols)` for all non-key fields.
pub fn build_insert(table: &str, shape: &RecordShape, key_field: &str) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let columns = insert_columns("INSERT", table, shape, key_field)?;

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders(&columns, None)
    );
    Ok(Statement::new(sql).bind_all(
        shape
            .non_key_fields(key_field)
            .map(|(n, v)| (n.to_string(), v.clone())),
    ))
}

/// Build `UPDATE table SET col = @col, .. WHERE key = @key`.
pub fn build_update(table: &str, shape: &RecordShape, key_field: &str) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let key_field = checked_key(key_field)?;
    let columns = insert_columns("UPDATE", table, shape, key_field)?;

    let key_value = shape.key_value(key_field).ok_or_else(|| {
        DbError::generation(
            "UPDATE",
            table,
            format!("record has no value for key field '{}'", key_field),
        )
    })?;

    let assignments: Vec<String> = columns.iter().map(|c| format!("{} = @{}", c, c)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = @{}",
        table,
        assignments.join(", "),
        key_field,
        key_field
    );

    Ok(Statement::new(sql)
        .bind_all(
            shape
                .non_key_fields(key_field)
                .map(|(n, v)| (n.to_string(), v.clone())),
        )
        .bind(key_field, key_value.clone()))
}

/// Build `DELETE FROM table WHERE key = @key`; the caller binds the key value.
pub fn build_delete_by_key(table: &str, key_field: &str) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let key_field = checked_key(key_field)?;
    Ok(Statement::new(format!(
        "DELETE FROM {} WHERE {} = @{}",
        table, key_field, key_field
    )))
}

/// Build `DELETE FROM table WHERE <predicate>` from a trusted predicate fragment.
///
/// A leading `WHERE` keyword in the fragment is accepted and dropped.
pub fn build_delete_where(table: &str, where_clause: &str) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let predicate = strip_where_keyword(where_clause.trim());
    if predicate.is_empty() {
        return Err(DbError::invalid_input(
            "WHERE clause cannot be empty for a conditional delete",
        ));
    }
    Ok(Statement::new(format!(
        "DELETE FROM {} WHERE {}",
        table, predicate
    )))
}

/// Build `SELECT * FROM table WHERE key = @key`; the caller binds the key value.
pub fn build_select_by_key(table: &str, key_field: &str) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let key_field = checked_key(key_field)?;
    Ok(Statement::new(format!(
        "SELECT * FROM {} WHERE {} = @{}",
        table, key_field, key_field
    )))
}

/// Build one multi-row INSERT covering every shape.
///
/// Every shape must carry the same non-key columns in the same order. Row `i`
/// binds its values as `@<column>__<i>`.
pub fn build_bulk_insert(
    table: &str,
    shapes: &[RecordShape],
    key_field: &str,
) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let Some(first) = shapes.first() else {
        return Err(DbError::generation("INSERT", table, "no records supplied"));
    };
    let columns = insert_columns("INSERT", table, first, key_field)?;

    let mut rows = Vec::with_capacity(shapes.len());
    let mut params: Vec<(String, Value)> = Vec::with_capacity(shapes.len() * columns.len());
    for (index, shape) in shapes.iter().enumerate() {
        let names = shape.non_key_names(key_field);
        if names != columns {
            return Err(DbError::generation(
                "INSERT",
                table,
                format!(
                    "record {} has fields [{}] but the first record has [{}]",
                    index,
                    names.join(", "),
                    columns.join(", ")
                ),
            ));
        }
        rows.push(format!("({})", placeholders(&columns, Some(index))));
        params.extend(
            shape
                .non_key_fields(key_field)
                .map(|(n, v)| (indexed_name(n, index), v.clone())),
        );
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        rows.join(", ")
    );
    Ok(Statement::new(sql).bind_all(params))
}

/// Build `DELETE FROM table WHERE key IN (@key__0, ..)` for a set of key values.
pub fn build_bulk_delete(table: &str, key_field: &str, keys: &[Value]) -> DbResult<Statement> {
    let table = checked_table(table)?;
    let key_field = checked_key(key_field)?;
    if keys.is_empty() {
        return Err(DbError::generation("DELETE", table, "no keys supplied"));
    }

    let names: Vec<String> = (0..keys.len())
        .map(|i| indexed_name(key_field, i))
        .collect();
    let list: Vec<String> = names.iter().map(|n| format!("@{}", n)).collect();
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        table,
        key_field,
        list.join(", ")
    );
    Ok(Statement::new(sql).bind_all(names.into_iter().zip(keys.iter().cloned())))
}

/// True for names usable both as a bare column and as an `@name` placeholder.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn checked_table(table: &str) -> DbResult<&str> {
    let table = table.trim();
    if table.is_empty() {
        return Err(DbError::invalid_input("Table name cannot be empty"));
    }
    Ok(table)
}

fn checked_key(key_field: &str) -> DbResult<&str> {
    let key_field = key_field.trim();
    if !is_identifier(key_field) {
        return Err(DbError::invalid_input(format!(
            "Key field '{}' is not a valid column identifier",
            key_field
        )));
    }
    Ok(key_field)
}

/// Non-key column names, rejecting shapes that would yield an empty list.
fn insert_columns<'a>(
    statement: &'static str,
    table: &str,
    shape: &'a RecordShape,
    key_field: &str,
) -> DbResult<Vec<&'a str>> {
    let columns = shape.non_key_names(key_field);
    if columns.is_empty() {
        return Err(DbError::generation(
            statement,
            table,
            format!("record has no fields besides the key field '{}'", key_field),
        ));
    }
    if let Some(bad) = columns.iter().find(|c| !is_identifier(c)) {
        return Err(DbError::generation(
            statement,
            table,
            format!("field '{}' is not a valid column identifier", bad),
        ));
    }
    Ok(columns)
}

fn placeholders(columns: &[&str], row: Option<usize>) -> String {
    columns
        .iter()
        .map(|c| match row {
            Some(i) => format!("@{}", indexed_name(c, i)),
            None => format!("@{}", c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn indexed_name(name: &str, index: usize) -> String {
    format!("{}__{}", name, index)
}

fn strip_where_keyword(clause: &str) -> &str {
    match clause.get(..6) {
        Some(head) if head.eq_ignore_ascii_case("where ") => clause[6..].trim_start(),
        _ => clause,
    }
}
