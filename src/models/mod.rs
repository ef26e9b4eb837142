//! Data models for the database toolkit.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod page;
pub mod record;
pub mod statement;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionDescriptor, DatabaseType, DescriptorFields, DescriptorSource};
pub use page::Page;
pub use record::RecordShape;
pub use statement::{CommandKind, Statement};
pub use value::Value;
