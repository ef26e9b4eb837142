//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The connection primitive and its lifecycle
//! - Connection provisioning from protected descriptors
//! - Statement execution with placeholder rendering and timeouts
//! - Transaction scopes
//! - Backend dispatch macro

#[macro_use]
pub mod macros;
pub mod connection;
pub mod executor;
pub(crate) mod params;
pub mod provider;
pub mod transaction;

pub use connection::{ConnRef, ConnectionState, DbConnection};
pub use executor::{AnyScalar, FromAnyRow, QueryExecutor, SqlExecutor};
pub use provider::ConnectionProvider;
pub use transaction::{
    DbTransaction, IsolationLevel, begin_safe, commit_safe, run_in_transaction,
    run_statements_in_transaction,
};
