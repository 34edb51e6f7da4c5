//! Data models for the database template.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod params;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use connection::Vendor;
pub use params::Params;
pub use query::{Argument, QueryRequest};
pub use value::{FromSqlValue, RequiredType, Row, SqlValue};
