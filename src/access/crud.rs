//! Single-record operations and raw statement passthroughs.

use super::DataAccess;
use crate::db::{AnyScalar, FromAnyRow, SqlExecutor};
use crate::error::DbResult;
use crate::models::{RecordShape, Statement, Value};
use crate::sql::generator;
use serde::Serialize;
use tracing::debug;

impl DataAccess {
    /// Insert one record. The key field is omitted so the database can
    /// assign it.
    pub async fn insert<E, R>(&self, exec: &mut E, table: &str, record: &R) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize + ?Sized,
    {
        let shape = RecordShape::inspect(record)?;
        let stmt = generator::build_insert(table, &shape, self.key_field())?;
        debug!(table = %table, "Inserting record");
        self.executor.execute(exec, &stmt).await
    }

    /// Update every non-key field of the record matching its key value.
    pub async fn update<E, R>(&self, exec: &mut E, table: &str, record: &R) -> DbResult<u64>
    where
        E: SqlExecutor,
        R: Serialize + ?Sized,
    {
        let shape = RecordShape::inspect(record)?;
        let stmt = generator::build_update(table, &shape, self.key_field())?;
        debug!(table = %table, "Updating record");
        self.executor.execute(exec, &stmt).await
    }

    /// Delete the row whose key equals `key`.
    pub async fn delete_by_key<E: SqlExecutor>(
        &self,
        exec: &mut E,
        table: &str,
        key: impl Into<Value>,
    ) -> DbResult<u64> {
        let stmt = generator::build_delete_by_key(table, self.key_field())?.bind(self.key_field(), key);
        self.executor.execute(exec, &stmt).await
    }

    /// Delete rows matching a caller-supplied predicate.
    ///
    /// The predicate is trusted SQL; values belong in `params` and are
    /// referenced as `@name`.
    pub async fn delete_where<E, I, K, V>(
        &self,
        exec: &mut E,
        table: &str,
        where_clause: &str,
        params: I,
    ) -> DbResult<u64>
    where
        E: SqlExecutor,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let stmt = generator::build_delete_where(table, where_clause)?.bind_all(params);
        self.executor.execute(exec, &stmt).await
    }

    /// Fetch the row whose key equals `key`.
    pub async fn get_by_key<T: FromAnyRow, E: SqlExecutor>(
        &self,
        exec: &mut E,
        table: &str,
        key: impl Into<Value>,
    ) -> DbResult<Option<T>> {
        let stmt =
            generator::build_select_by_key(table, self.key_field())?.bind(self.key_field(), key);
        self.executor.query_first(exec, &stmt).await
    }

    /// Execute an arbitrary statement and return the affected row count.
    pub async fn execute<E: SqlExecutor>(&self, exec: &mut E, stmt: &Statement) -> DbResult<u64> {
        self.executor.execute(exec, stmt).await
    }

    /// Run an arbitrary query and map its rows.
    pub async fn query<T: FromAnyRow, E: SqlExecutor>(
        &self,
        exec: &mut E,
        stmt: &Statement,
    ) -> DbResult<Vec<T>> {
        self.executor.query(exec, stmt).await
    }

    /// First column of the first row, or `None` for an empty result.
    pub async fn query_scalar<T: AnyScalar, E: SqlExecutor>(
        &self,
        exec: &mut E,
        stmt: &Statement,
    ) -> DbResult<Option<T>> {
        self.executor.scalar(exec, stmt).await
    }
}
