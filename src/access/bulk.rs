//! Bulk and chunked operations.
//!
//! Plain bulk operations issue one round of statements on the given
//! executor. The `_in_batches` variants split the input into consecutive
//! chunks and run the bulk operation per chunk, in input order; the
//! `_in_transaction` variants additionally wrap all chunks in one
//! transaction so the whole input applies atomically.

use super::DataAccess;
use crate::db::{DbConnection, SqlExecutor, run_in_transaction};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, RecordShape, Statement, Value};
use crate::sql::generator;
use serde::Serialize;
use tracing::{debug, info};

/// Split `items` into consecutive chunks of at most `batch_size` items.
///
/// Yields `ceil(len / batch_size)` chunks; a size of 0 is treated as 1.
pub fn batches<T>(items: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(batch_size.max(1))
}

impl DataAccess {
    /// Insert all records with one multi-row INSERT.
    ///
    /// Every record must have the same fields. Input that would exceed the
    /// backend's bind parameter limit is split into several INSERTs, run in
    /// order on the same executor. Returns 0 without touching the database
    /// when `records` is empty.
    pub async fn bulk_insert<E, R>(&self, exec: &mut E, table: &str, records: &[R]) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize,
    {
        if records.is_empty() {
            return Ok(0);
        }
        let shapes = inspect_all(records)?;
        let columns = shapes
            .first()
            .map(|shape| shape.non_key_names(self.key_field()).len())
            .unwrap_or(0);
        let rows = rows_per_statement(exec.db_type(), columns);
        let statements = shapes
            .chunks(rows)
            .map(|chunk| generator::build_bulk_insert(table, chunk, self.key_field()))
            .collect::<DbResult<Vec<_>>>()?;

        debug!(
            table = %table,
            records = records.len(),
            statements = statements.len(),
            "Bulk inserting records"
        );
        self.execute_all(exec, &statements).await
    }

    /// Update each record by key. All statements are generated before the
    /// first one runs, so a malformed record fails the call without I/O.
    pub async fn bulk_update<E, R>(&self, exec: &mut E, table: &str, records: &[R]) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize,
    {
        if records.is_empty() {
            return Ok(0);
        }
        let statements = inspect_all(records)?
            .iter()
            .map(|shape| generator::build_update(table, shape, self.key_field()))
            .collect::<DbResult<Vec<_>>>()?;

        debug!(table = %table, records = records.len(), "Bulk updating records");
        self.execute_all(exec, &statements).await
    }

    /// Delete every row whose key is in `keys`. Key lists longer than the
    /// backend's bind parameter limit are split into several DELETEs.
    pub async fn bulk_delete<E: SqlExecutor>(
        &self,
        exec: &mut E,
        table: &str,
        keys: &[Value],
    ) -> DbResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let statements = keys
            .chunks(rows_per_statement(exec.db_type(), 1))
            .map(|chunk| generator::build_bulk_delete(table, self.key_field(), chunk))
            .collect::<DbResult<Vec<_>>>()?;

        debug!(
            table = %table,
            keys = keys.len(),
            statements = statements.len(),
            "Bulk deleting records"
        );
        self.execute_all(exec, &statements).await
    }

    /// [`bulk_insert`](Self::bulk_insert) per chunk of `batch_size` records
    /// (configured size when `None` or 0). Chunks run in order; a failing
    /// chunk stops the call and earlier chunks stay applied.
    pub async fn bulk_insert_in_batches<E, R>(
        &self,
        exec: &mut E,
        table: &str,
        records: &[R],
        batch_size: Option<usize>,
    ) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize,
    {
        let size = self.options.effective_batch_size(batch_size);
        let mut total = 0;
        for (index, chunk) in batches(records, size).enumerate() {
            let affected = self.bulk_insert(exec, table, chunk).await?;
            debug!(table = %table, chunk = index, rows = chunk.len(), affected, "Chunk inserted");
            total += affected;
        }
        info!(table = %table, records = records.len(), batch_size = size, total, "Batched insert finished");
        Ok(total)
    }

    /// [`bulk_update`](Self::bulk_update) per chunk of `batch_size` records.
    pub async fn bulk_update_in_batches<E, R>(
        &self,
        exec: &mut E,
        table: &str,
        records: &[R],
        batch_size: Option<usize>,
    ) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize,
    {
        let size = self.options.effective_batch_size(batch_size);
        let mut total = 0;
        for (index, chunk) in batches(records, size).enumerate() {
            let affected = self.bulk_update(exec, table, chunk).await?;
            debug!(table = %table, chunk = index, rows = chunk.len(), affected, "Chunk updated");
            total += affected;
        }
        info!(table = %table, records = records.len(), batch_size = size, total, "Batched update finished");
        Ok(total)
    }

    /// Chunked insert inside one transaction at the configured isolation
    /// level. Any failure rolls back every chunk.
    pub async fn bulk_insert_in_transaction<R: Serialize>(
        &self,
        conn: &mut DbConnection,
        table: &str,
        records: &[R],
        batch_size: Option<usize>,
    ) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        run_in_transaction(conn, self.options.isolation_level, async |tx| {
            self.bulk_insert_in_batches(tx, table, records, batch_size).await
        })
        .await
    }

    /// Chunked update inside one transaction at the configured isolation
    /// level. Any failure rolls back every chunk.
    pub async fn bulk_update_in_transaction<R: Serialize>(
        &self,
        conn: &mut DbConnection,
        table: &str,
        records: &[R],
        batch_size: Option<usize>,
    ) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        run_in_transaction(conn, self.options.isolation_level, async |tx| {
            self.bulk_update_in_batches(tx, table, records, batch_size).await
        })
        .await
    }
}

impl DataAccess {
    async fn execute_all<E: SqlExecutor>(
        &self,
        exec: &mut E,
        statements: &[Statement],
    ) -> DbResult<u64> {
        let mut total = 0;
        for stmt in statements {
            total += self.executor.execute(exec, stmt).await?;
        }
        Ok(total)
    }
}

/// Rows of `columns` parameters each that fit in one statement.
fn rows_per_statement(db_type: DatabaseType, columns: usize) -> usize {
    (db_type.max_parameters() / columns.max(1)).max(1)
}

fn inspect_all<R: Serialize>(records: &[R]) -> DbResult<Vec<RecordShape>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            RecordShape::inspect(record).map_err(|e| {
                DbError::invalid_input(format!("Record {} cannot be inspected: {}", index, e))
            })
        })
        .collect()
}
