//! SQL Template Library
//!
//! This library provides a blocking database template for SQL databases
//! (MySQL, PostgreSQL, SQLite): one call runs one statement with bound
//! parameters, translating placeholders for the target driver and mapping
//! result rows through caller-supplied row handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod testing;

pub use config::{Config, DataSourceConfig, FactoryOptions};
pub use db::{ConnectionFactory, DatabaseTemplate, RowHandler, RowMapper};
pub use error::{DbError, DbResult, ErrorKind};
pub use models::{Params, QueryRequest, RequiredType, Row, SqlValue};
