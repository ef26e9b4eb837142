//! Backend dispatch macro.
//!
//! Expands to a `match` over [`ConnRef`](crate::db::ConnRef) variants so each
//! backend arm stays on one line at the call site.

/// Dispatch over a borrowed backend connection.
///
/// # Example
///
/// ```ignore
/// dispatch_conn!(conn, {
///     MySql(c) => mysql::execute(c, sql).await,
///     Postgres(c) => postgres::execute(c, sql).await,
///     SQLite(c) => sqlite::execute(c, sql).await,
/// })
/// ```
#[macro_export]
macro_rules! dispatch_conn {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::ConnRef::$variant($c) => $body,
            )+
        }
    };
}

pub use dispatch_conn;
