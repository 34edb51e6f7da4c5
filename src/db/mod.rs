//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The blocking connection and cursor contract
//! - Connection factories per vendor, a shared-connection decorator and a registry
//! - Placeholder dialect translation
//! - The row handler protocol
//! - The database template tying them together
//! - sqlx-backed adapters, type mappings and parameter binding

pub mod connection;
pub mod factory;
#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
pub(crate) mod macros;
pub(crate) mod params;
pub mod registry;
pub mod row_handler;
pub mod single_connection;
#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
pub mod sqlx_adapter;
pub mod template;
pub mod translator;
pub mod types;

pub use connection::{Connection, Cursor};
pub use factory::{
    ConnectionFactory, MySqlConnectionFactory, OracleConnectionFactory, PgdbConnectionFactory,
    SqliteConnectionFactory,
};
pub use registry::{FactoryConstructor, FactoryRegistry};
pub use row_handler::{RowHandler, RowMapper, TupleRowHandler};
pub use single_connection::SingleConnectionFactory;
#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
pub use sqlx_adapter::SqlxConnection;
pub use template::DatabaseTemplate;
pub use translator::{BoundParams, Dialect, SqlSyntax, Statement, translate, translate_with};
