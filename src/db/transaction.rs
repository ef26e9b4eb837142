//! Transaction scopes.
//!
//! A [`DbTransaction`] mutably borrows its [`DbConnection`] for its whole
//! lifetime, so at most one scope can be active per connection and the
//! connection cannot be used outside the scope until it ends. A handle that
//! is dropped while still open schedules a rollback, which the connection
//! issues before its next use.

use crate::db::connection::{ConnRef, DbConnection};
use crate::db::executor::{QueryExecutor, SqlExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Statement};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    /// Statements that open a transaction at this level.
    ///
    /// SQLite has no per-transaction isolation levels. Read-uncommitted maps to
    /// the `read_uncommitted` pragma (only meaningful with a shared cache) and
    /// serializable takes the write lock up front with `BEGIN IMMEDIATE`.
    fn begin_statements(&self, db_type: DatabaseType) -> Vec<String> {
        match db_type {
            DatabaseType::PostgreSQL => vec![format!("BEGIN ISOLATION LEVEL {}", self.as_sql())],
            DatabaseType::MySQL => vec![
                format!("SET TRANSACTION ISOLATION LEVEL {}", self.as_sql()),
                "START TRANSACTION".to_string(),
            ],
            DatabaseType::SQLite => {
                let pragma = match self {
                    Self::ReadUncommitted => "PRAGMA read_uncommitted = 1",
                    _ => "PRAGMA read_uncommitted = 0",
                };
                let begin = match self {
                    Self::Serializable => "BEGIN IMMEDIATE",
                    _ => "BEGIN",
                };
                vec![pragma.to_string(), begin.to_string()]
            }
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// An open transaction on a borrowed connection.
pub struct DbTransaction<'c> {
    conn: &'c mut DbConnection,
    id: String,
    isolation_level: IsolationLevel,
    open: bool,
}

impl DbTransaction<'_> {
    /// Identifier used in logs and transaction errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn db_type(&self) -> DatabaseType {
        self.conn.db_type()
    }

    /// Commit. See [`commit_safe`].
    pub async fn commit(self) -> DbResult<()> {
        commit_safe(self).await
    }

    /// Roll back and end the scope.
    pub async fn rollback(mut self) -> DbResult<()> {
        self.finish("ROLLBACK").await?;
        info!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    async fn finish(&mut self, sql: &str) -> DbResult<()> {
        let mut conn = self.conn.backend().await?;
        conn.execute_raw(sql).await?;
        self.open = false;
        Ok(())
    }
}

impl SqlExecutor for DbTransaction<'_> {
    fn db_type(&self) -> DatabaseType {
        self.conn.db_type()
    }

    fn connection(&mut self) -> impl Future<Output = DbResult<ConnRef<'_>>> + Send {
        self.conn.backend()
    }

    fn transaction_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Drop for DbTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            warn!(
                transaction_id = %self.id,
                "Transaction dropped without commit or rollback, scheduling rollback"
            );
            self.conn.mark_rollback_pending();
        }
    }
}

impl std::fmt::Debug for DbTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbTransaction")
            .field("id", &self.id)
            .field("isolation_level", &self.isolation_level)
            .field("open", &self.open)
            .finish()
    }
}

/// Open the connection if needed and begin a transaction at `level`.
///
/// Fails with the connection or database error when the connection cannot be
/// opened or the server refuses to start the transaction. No scope exists in
/// that case.
pub async fn begin_safe(
    conn: &mut DbConnection,
    level: IsolationLevel,
) -> DbResult<DbTransaction<'_>> {
    let db_type = conn.db_type();
    {
        let mut backend = conn.backend().await?;
        for sql in level.begin_statements(db_type) {
            backend.execute_raw(&sql).await?;
        }
    }

    let id = generate_transaction_id();
    info!(
        transaction_id = %id,
        db_type = %db_type,
        isolation_level = %level,
        "Transaction started"
    );

    Ok(DbTransaction {
        conn,
        id,
        isolation_level: level,
        open: true,
    })
}

/// Commit the transaction, consuming the handle.
///
/// If the commit fails a rollback is attempted and the commit failure is
/// returned unchanged. A failed rollback leaves the rollback pending on the connection.
pub async fn commit_safe(mut tx: DbTransaction<'_>) -> DbResult<()> {
    match tx.finish("COMMIT").await {
        Ok(()) => {
            info!(transaction_id = %tx.id, "Transaction committed");
            Ok(())
        }
        Err(e) => {
            warn!(transaction_id = %tx.id, error = %e, "Commit failed, rolling back");
            if let Err(rollback_err) = tx.finish("ROLLBACK").await {
                warn!(
                    transaction_id = %tx.id,
                    error = %rollback_err,
                    "Rollback after failed commit also failed"
                );
            }
            Err(e)
        }
    }
}

/// Run `work` inside a transaction.
///
/// Commits when `work` returns `Ok` and returns its value. When `work` fails
/// the transaction is rolled back and the original error is returned
/// unchanged; a failing rollback is only logged.
pub async fn run_in_transaction<T, E, F>(
    conn: &mut DbConnection,
    level: IsolationLevel,
    work: F,
) -> Result<T, E>
where
    F: AsyncFnOnce(&mut DbTransaction<'_>) -> Result<T, E>,
    E: From<DbError>,
{
    let mut tx = begin_safe(conn, level).await?;
    let outcome = work(&mut tx).await;

    match outcome {
        Ok(value) => {
            commit_safe(tx).await?;
            Ok(value)
        }
        Err(err) => {
            debug!(transaction_id = %tx.id, "Unit of work failed, rolling back");
            let id = tx.id.clone();
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    transaction_id = %id,
                    error = %rollback_err,
                    "Rollback after failed unit of work failed"
                );
            }
            Err(err)
        }
    }
}

/// Execute statements in order inside one transaction.
///
/// Returns the summed affected row count. Either every statement takes effect
/// or none does.
pub async fn run_statements_in_transaction(
    conn: &mut DbConnection,
    level: IsolationLevel,
    executor: &QueryExecutor,
    statements: &[Statement],
) -> DbResult<u64> {
    run_in_transaction(conn, level, async |tx| {
        let mut total = 0;
        for stmt in statements {
            total += executor.execute(tx, stmt).await?;
        }
        Ok(total)
    })
    .await
}

fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> DbConnection {
        let mut conn = DbConnection::from_descriptor("Driver=sqlite;Data Source=:memory:").unwrap();
        let executor = QueryExecutor::new();
        executor
            .execute(
                &mut conn,
                &Statement::new("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"),
            )
            .await
            .unwrap();
        conn
    }

    async fn count(conn: &mut DbConnection) -> i64 {
        QueryExecutor::new()
            .scalar::<i64, _>(conn, &Statement::new("SELECT COUNT(*) FROM t"))
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_generate_transaction_id() {
        let id = generate_transaction_id();
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), 35);
    }

    #[test]
    fn test_begin_statements() {
        assert_eq!(
            IsolationLevel::Serializable.begin_statements(DatabaseType::PostgreSQL),
            vec!["BEGIN ISOLATION LEVEL SERIALIZABLE"]
        );
        assert_eq!(
            IsolationLevel::RepeatableRead.begin_statements(DatabaseType::MySQL),
            vec![
                "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                "START TRANSACTION"
            ]
        );
        assert_eq!(
            IsolationLevel::Serializable.begin_statements(DatabaseType::SQLite),
            vec!["PRAGMA read_uncommitted = 0", "BEGIN IMMEDIATE"]
        );
    }

    #[test]
    fn test_isolation_level_serde() {
        let level: IsolationLevel = serde_json::from_str("\"repeatable_read\"").unwrap();
        assert_eq!(level, IsolationLevel::RepeatableRead);
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }

    #[tokio::test]
    async fn test_begin_opens_closed_connection() {
        let mut conn = DbConnection::from_descriptor("Driver=sqlite;Data Source=:memory:").unwrap();
        let tx = begin_safe(&mut conn, IsolationLevel::ReadCommitted).await.unwrap();
        assert_eq!(tx.isolation_level(), IsolationLevel::ReadCommitted);
        tx.rollback().await.unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let mut conn = memory().await;
        let mut tx = begin_safe(&mut conn, IsolationLevel::Serializable).await.unwrap();
        QueryExecutor::new()
            .execute(&mut tx, &Statement::new("INSERT INTO t (v) VALUES ('a')"))
            .await
            .unwrap();
        commit_safe(tx).await.unwrap();
        assert_eq!(count(&mut conn).await, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let mut conn = memory().await;
        {
            let mut tx = begin_safe(&mut conn, IsolationLevel::ReadCommitted).await.unwrap();
            QueryExecutor::new()
                .execute(&mut tx, &Statement::new("INSERT INTO t (v) VALUES ('a')"))
                .await
                .unwrap();
        }
        assert_eq!(count(&mut conn).await, 0);

        // The connection is usable for a new scope afterwards
        let tx = begin_safe(&mut conn, IsolationLevel::ReadCommitted).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_in_transaction_returns_value() {
        let mut conn = memory().await;
        let executor = QueryExecutor::new();
        let inserted = run_in_transaction(&mut conn, IsolationLevel::ReadCommitted, async |tx| {
            executor
                .execute(tx, &Statement::new("INSERT INTO t (v) VALUES ('a'), ('b')"))
                .await
        })
        .await
        .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(count(&mut conn).await, 2);
    }

    #[tokio::test]
    async fn test_run_in_transaction_rolls_back_and_keeps_error() {
        let mut conn = memory().await;
        let executor = QueryExecutor::new();
        let result: DbResult<()> =
            run_in_transaction(&mut conn, IsolationLevel::ReadCommitted, async |tx| {
                executor
                    .execute(tx, &Statement::new("INSERT INTO t (v) VALUES ('a')"))
                    .await?;
                Err(DbError::invalid_input("caller gave up"))
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert_eq!(count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_run_in_transaction_surfaces_commit_error_unchanged() {
        let mut conn = memory().await;
        let executor = QueryExecutor::new();
        executor
            .execute(
                &mut conn,
                &Statement::new(
                    "CREATE TABLE refs (id INTEGER PRIMARY KEY, t_id INTEGER \
                     REFERENCES t(id) DEFERRABLE INITIALLY DEFERRED)",
                ),
            )
            .await
            .unwrap();

        let result: DbResult<u64> =
            run_in_transaction(&mut conn, IsolationLevel::ReadCommitted, async |tx| {
                executor
                    .execute(tx, &Statement::new("INSERT INTO refs (t_id) VALUES (404)"))
                    .await
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::Database { .. }), "got {:?}", err);

        let refs: Option<i64> = executor
            .scalar(&mut conn, &Statement::new("SELECT COUNT(*) FROM refs"))
            .await
            .unwrap();
        assert_eq!(refs, Some(0));
    }

    #[tokio::test]
    async fn test_statement_batch_is_atomic() {
        let mut conn = memory().await;
        let executor = QueryExecutor::new();
        let statements = vec![
            Statement::new("INSERT INTO t (id, v) VALUES (1, 'a')"),
            Statement::new("INSERT INTO t (id, v) VALUES (1, 'duplicate')"),
        ];
        let result = run_statements_in_transaction(
            &mut conn,
            IsolationLevel::ReadCommitted,
            &executor,
            &statements,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(count(&mut conn).await, 0);
    }
}
