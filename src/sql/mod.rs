//! SQL text generation.
//!
//! - `generator`: INSERT / UPDATE / DELETE / SELECT-by-key from record shapes
//! - `pagination`: count and windowed queries for paged reads

pub mod generator;
pub mod pagination;

pub use pagination::{PagePlan, PaginationPlanner};
