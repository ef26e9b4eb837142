use super::DataAccess;
use crate::db::{FromAnyRow, SqlExecutor};
use crate::error::DbResult;
use crate::models::{Page, Statement};
use tracing::debug;

impl DataAccess {
    /// Fetch one page of `base`'s result set.
    ///
    /// Runs a count over the whole base query and a windowed data query,
    /// both with `base`'s parameters. Page numbers below 1 become 1, page
    /// sizes below 1 use the configured page size, and `order_by` falls back
    /// to the key field.
    pub async fn paginate<T: FromAnyRow, E: SqlExecutor>(
        &self,
        exec: &mut E,
        base: &Statement,
        page_number: i64,
        page_size: i64,
        order_by: Option<&str>,
    ) -> DbResult<Page<T>> {
        let plan = self
            .planner
            .plan(&base.sql, page_number, page_size, order_by)?;

        let count_stmt = Statement::new(plan.count_sql).with_params_of(base);
        let total: Option<i64> = self.executor.scalar(exec, &count_stmt).await?;
        let total_count = total.unwrap_or(0).max(0) as u64;

        let data_stmt = Statement::new(plan.data_sql).with_params_of(base);
        let items: Vec<T> = self.executor.query(exec, &data_stmt).await?;

        debug!(
            page_number = plan.page_number,
            page_size = plan.page_size,
            offset = plan.offset,
            total_count,
            rows = items.len(),
            "Page fetched"
        );

        Ok(Page {
            items,
            total_count,
            page_number: plan.page_number,
            page_size: plan.page_size,
        })
    }
}
