//! db-toolkit library
//!
//! Relational database access for SQLite, PostgreSQL and MySQL: CRUD
//! statements generated from record shapes, transaction scopes, bulk and
//! chunked writes, pagination, and protection of connection secrets.

pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod protect;
pub mod sql;

pub use access::DataAccess;
pub use config::AccessOptions;
pub use db::{ConnectionProvider, DbConnection, DbTransaction, IsolationLevel};
pub use error::{DbError, DbResult};
pub use models::{Page, Statement, Value};
