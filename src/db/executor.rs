//! Statement execution engine.
//!
//! This module runs [`Statement`]s against anything implementing
//! [`SqlExecutor`]: a bare [`DbConnection`] (opened on demand) or an open
//! [`DbTransaction`](crate::db::DbTransaction). Every call renders the
//! statement's `@name` placeholders for the target backend and enforces the
//! statement timeout.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific execution
//! - `postgres`: PostgreSQL-specific execution
//! - `sqlite`: SQLite-specific execution
//!
//! Each submodule provides identical functionality adapted to the database's
//! argument and row types.

use crate::config::DEFAULT_COMMAND_TIMEOUT_SECS;
use crate::db::connection::{ConnRef, DbConnection};
use crate::db::params::render;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Statement, Value};
use sqlx::mysql::{MySql, MySqlRow};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Decode, FromRow, Type};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Something statements can run against.
pub trait SqlExecutor {
    fn db_type(&self) -> DatabaseType;

    /// Borrow the live driver connection, opening it if needed.
    fn connection(&mut self) -> impl Future<Output = DbResult<ConnRef<'_>>> + Send;

    /// Id of the enclosing transaction, if any.
    fn transaction_id(&self) -> Option<&str> {
        None
    }
}

impl SqlExecutor for DbConnection {
    fn db_type(&self) -> DatabaseType {
        DbConnection::db_type(self)
    }

    fn connection(&mut self) -> impl Future<Output = DbResult<ConnRef<'_>>> + Send {
        self.backend()
    }
}

/// Row types decodable from every supported backend.
///
/// Blanket-implemented for anything deriving `sqlx::FromRow`.
pub trait FromAnyRow:
    Send
    + Unpin
    + for<'r> FromRow<'r, MySqlRow>
    + for<'r> FromRow<'r, PgRow>
    + for<'r> FromRow<'r, SqliteRow>
{
}

impl<T> FromAnyRow for T where
    T: Send
        + Unpin
        + for<'r> FromRow<'r, MySqlRow>
        + for<'r> FromRow<'r, PgRow>
        + for<'r> FromRow<'r, SqliteRow>
{
}

/// Single-column values decodable from every supported backend.
pub trait AnyScalar:
    Send
    + Unpin
    + for<'r> Decode<'r, MySql>
    + Type<MySql>
    + for<'r> Decode<'r, Postgres>
    + Type<Postgres>
    + for<'r> Decode<'r, Sqlite>
    + Type<Sqlite>
{
}

impl<T> AnyScalar for T where
    T: Send
        + Unpin
        + for<'r> Decode<'r, MySql>
        + Type<MySql>
        + for<'r> Decode<'r, Postgres>
        + Type<Postgres>
        + for<'r> Decode<'r, Sqlite>
        + Type<Sqlite>
{
}

/// Statement executor that handles timeouts and backend dispatch.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    default_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Create a new query executor with a custom default timeout.
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute a statement and return the affected row count.
    pub async fn execute<E: SqlExecutor>(&self, exec: &mut E, stmt: &Statement) -> DbResult<u64> {
        let start = Instant::now();
        let (sql, values, query_timeout) = self.prepare(exec, stmt, "Executing statement")?;

        let rows_affected = dispatch_conn!(exec.connection().await?, {
            MySql(c) => mysql::execute(c, &sql, values, query_timeout).await?,
            Postgres(c) => postgres::execute(c, &sql, values, query_timeout).await?,
            SQLite(c) => sqlite::execute(c, &sql, values, query_timeout).await?,
        });

        debug!(
            rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(rows_affected)
    }

    /// Run a query and map every row to `T`.
    pub async fn query<T: FromAnyRow, E: SqlExecutor>(
        &self,
        exec: &mut E,
        stmt: &Statement,
    ) -> DbResult<Vec<T>> {
        let start = Instant::now();
        let (sql, values, query_timeout) = self.prepare(exec, stmt, "Executing query")?;

        let rows = dispatch_conn!(exec.connection().await?, {
            MySql(c) => mysql::fetch_all(c, &sql, values, query_timeout).await?,
            Postgres(c) => postgres::fetch_all(c, &sql, values, query_timeout).await?,
            SQLite(c) => sqlite::fetch_all(c, &sql, values, query_timeout).await?,
        });

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(rows)
    }

    /// Run a query and map the first row, if any.
    pub async fn query_first<T: FromAnyRow, E: SqlExecutor>(
        &self,
        exec: &mut E,
        stmt: &Statement,
    ) -> DbResult<Option<T>> {
        let (sql, values, query_timeout) = self.prepare(exec, stmt, "Executing query")?;

        dispatch_conn!(exec.connection().await?, {
            MySql(c) => mysql::fetch_optional(c, &sql, values, query_timeout).await,
            Postgres(c) => postgres::fetch_optional(c, &sql, values, query_timeout).await,
            SQLite(c) => sqlite::fetch_optional(c, &sql, values, query_timeout).await,
        })
    }

    /// Run a query and return the first column of the first row.
    ///
    /// `None` when the query returns no rows.
    pub async fn scalar<T: AnyScalar, E: SqlExecutor>(
        &self,
        exec: &mut E,
        stmt: &Statement,
    ) -> DbResult<Option<T>> {
        let (sql, values, query_timeout) = self.prepare(exec, stmt, "Executing scalar query")?;

        dispatch_conn!(exec.connection().await?, {
            MySql(c) => mysql::fetch_scalar(c, &sql, values, query_timeout).await,
            Postgres(c) => postgres::fetch_scalar(c, &sql, values, query_timeout).await,
            SQLite(c) => sqlite::fetch_scalar(c, &sql, values, query_timeout).await,
        })
    }

    fn prepare<E: SqlExecutor>(
        &self,
        exec: &E,
        stmt: &Statement,
        message: &'static str,
    ) -> DbResult<(String, Vec<Value>, Duration)> {
        let rendered = render(stmt, exec.db_type())?;
        let query_timeout = stmt.timeout.unwrap_or(self.default_timeout);

        debug!(
            sql = %rendered.sql,
            params = rendered.values.len(),
            timeout_secs = query_timeout.as_secs(),
            transaction_id = ?exec.transaction_id(),
            "{}",
            message
        );
        Ok((rendered.sql, rendered.values, query_timeout))
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use crate::db::params::mysql_arguments;
    use sqlx::{MySqlConnection, Row};

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let args = mysql_arguments(values)?;
        match timeout(query_timeout, sqlx::query_with::<MySql, _>(sql, args).execute(conn)).await {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("statement execution", query_timeout)),
        }
    }

    pub async fn fetch_all<T: FromAnyRow>(
        conn: &mut MySqlConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Vec<T>> {
        let args = mysql_arguments(values)?;
        let query = sqlx::query_as_with::<MySql, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_all(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_optional<T: FromAnyRow>(
        conn: &mut MySqlConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = mysql_arguments(values)?;
        let query = sqlx::query_as_with::<MySql, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_scalar<T: AnyScalar>(
        conn: &mut MySqlConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = mysql_arguments(values)?;
        let query = sqlx::query_with::<MySql, _>(sql, args);
        let row = match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("scalar query", query_timeout)),
        };
        row.map(|r| r.try_get::<T, _>(0)).transpose().map_err(DbError::from)
    }
}

mod postgres {
    use super::*;
    use crate::db::params::postgres_arguments;
    use sqlx::{PgConnection, Row};

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let args = postgres_arguments(values)?;
        match timeout(query_timeout, sqlx::query_with::<Postgres, _>(sql, args).execute(conn)).await {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("statement execution", query_timeout)),
        }
    }

    pub async fn fetch_all<T: FromAnyRow>(
        conn: &mut PgConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Vec<T>> {
        let args = postgres_arguments(values)?;
        let query = sqlx::query_as_with::<Postgres, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_all(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_optional<T: FromAnyRow>(
        conn: &mut PgConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = postgres_arguments(values)?;
        let query = sqlx::query_as_with::<Postgres, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_scalar<T: AnyScalar>(
        conn: &mut PgConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = postgres_arguments(values)?;
        let query = sqlx::query_with::<Postgres, _>(sql, args);
        let row = match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("scalar query", query_timeout)),
        };
        row.map(|r| r.try_get::<T, _>(0)).transpose().map_err(DbError::from)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::sqlite_arguments;
    use sqlx::{Row, SqliteConnection};

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let args = sqlite_arguments(values)?;
        match timeout(query_timeout, sqlx::query_with::<Sqlite, _>(sql, args).execute(conn)).await {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("statement execution", query_timeout)),
        }
    }

    pub async fn fetch_all<T: FromAnyRow>(
        conn: &mut SqliteConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Vec<T>> {
        let args = sqlite_arguments(values)?;
        let query = sqlx::query_as_with::<Sqlite, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_all(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_optional<T: FromAnyRow>(
        conn: &mut SqliteConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = sqlite_arguments(values)?;
        let query = sqlx::query_as_with::<Sqlite, T, _>(sql, args);
        match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn fetch_scalar<T: AnyScalar>(
        conn: &mut SqliteConnection,
        sql: &str,
        values: Vec<Value>,
        query_timeout: Duration,
    ) -> DbResult<Option<T>> {
        let args = sqlite_arguments(values)?;
        let query = sqlx::query_with::<Sqlite, _>(sql, args);
        let row = match timeout(query_timeout, query.fetch_optional(conn)).await {
            Ok(result) => result?,
            Err(_) => return Err(timeout_error("scalar query", query_timeout)),
        };
        row.map(|r| r.try_get::<T, _>(0)).transpose().map_err(DbError::from)
    }
}
