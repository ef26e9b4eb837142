//! Composed data access operations.
//!
//! [`DataAccess`] combines statement generation, execution and transaction
//! scopes into record-level operations. Every operation takes the executor to
//! run on, so the same call works on a bare connection or inside an open
//! transaction:
//!
//! ```ignore
//! let access = DataAccess::new(AccessOptions::default());
//! let mut conn = provider.connection(descriptor)?;
//! access.insert(&mut conn, "users", &user).await?;
//!
//! run_in_transaction(&mut conn, IsolationLevel::ReadCommitted, async |tx| {
//!     access.update(tx, "users", &user).await?;
//!     access.delete_by_key(tx, "sessions", user.id).await
//! })
//! .await?;
//! ```

mod bulk;
mod crud;
mod paging;

pub use bulk::batches;

use crate::config::AccessOptions;
use crate::db::QueryExecutor;
use crate::sql::PaginationPlanner;

/// Record-level operations configured by [`AccessOptions`].
#[derive(Debug, Clone)]
pub struct DataAccess {
    options: AccessOptions,
    executor: QueryExecutor,
    planner: PaginationPlanner,
}

impl DataAccess {
    pub fn new(options: AccessOptions) -> Self {
        let executor = QueryExecutor::with_timeout(options.command_timeout());
        let planner = PaginationPlanner::new(options.page_size, options.key_field.clone());
        Self {
            options,
            executor,
            planner,
        }
    }

    pub fn options(&self) -> &AccessOptions {
        &self.options
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// A copy of this instance using a different key field, for calls on
    /// tables whose key is not the configured default.
    pub fn keyed(&self, key_field: impl Into<String>) -> Self {
        Self::new(self.options.clone().with_key_field(key_field))
    }

    fn key_field(&self) -> &str {
        &self.options.key_field
    }
}

impl Default for DataAccess {
    fn default() -> Self {
        Self::new(AccessOptions::default())
    }
}
