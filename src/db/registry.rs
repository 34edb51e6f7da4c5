//! Named factory constructors.
//!
//! The registry maps vendor names to functions that build a factory from
//! [`FactoryOptions`]. Constructing a factory never loads a driver, so every
//! vendor can be registered regardless of which cargo features are enabled.

use super::factory::{
    ConnectionFactory, MySqlConnectionFactory, OracleConnectionFactory, PgdbConnectionFactory,
    SqliteConnectionFactory,
};
use crate::config::{FactoryOptions, options_from_url};
use crate::error::{DbError, DbResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type FactoryConstructor =
    Arc<dyn Fn(FactoryOptions) -> DbResult<Arc<dyn ConnectionFactory>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FactoryRegistry {
    constructors: BTreeMap<String, FactoryConstructor>,
}

impl FactoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in vendor under its usual names.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_all(&["mysql", "mariadb"], |options| {
            Ok(Arc::new(MySqlConnectionFactory::from_options(options)?))
        });
        registry.register_all(&["postgres", "postgresql", "pgdb"], |options| {
            Ok(Arc::new(PgdbConnectionFactory::from_options(options)?))
        });
        registry.register_all(&["sqlite", "sqlite3"], |options| {
            Ok(Arc::new(SqliteConnectionFactory::from_options(options)?))
        });
        registry.register_all(&["oracle", "cxora"], |options| {
            Ok(Arc::new(OracleConnectionFactory::from_options(options)?))
        });
        registry
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(FactoryOptions) -> DbResult<Arc<dyn ConnectionFactory>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_ascii_lowercase(), Arc::new(constructor));
    }

    fn register_all<F>(&mut self, names: &[&str], constructor: F)
    where
        F: Fn(FactoryOptions) -> DbResult<Arc<dyn ConnectionFactory>> + Send + Sync + 'static,
    {
        let constructor: FactoryConstructor = Arc::new(constructor);
        for name in names {
            self.constructors
                .insert(name.to_string(), Arc::clone(&constructor));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build the factory registered under `name`.
    pub fn create(
        &self,
        name: &str,
        options: FactoryOptions,
    ) -> DbResult<Arc<dyn ConnectionFactory>> {
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| {
                DbError::configuration(
                    name,
                    format!(
                        "unknown vendor; registered: {}",
                        self.names().collect::<Vec<_>>().join(", ")
                    ),
                )
            })?;
        debug!(vendor = name, options = ?options, "Building connection factory");
        constructor(options)
    }

    /// Build a factory from a connection URL.
    pub fn from_url(&self, url: &str) -> DbResult<Arc<dyn ConnectionFactory>> {
        let (vendor, options) = options_from_url(url)?;
        self.create(vendor.name(), options)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
