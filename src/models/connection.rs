//! Connection-related data models.
//!
//! This module defines the supported database vendors and their fixed
//! characteristics (placeholder dialect, quoting rules, count type).

use super::value::RequiredType;
use crate::db::translator::{Dialect, SqlSyntax};
use serde::{Deserialize, Serialize};

/// Supported database vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Includes MariaDB
    MySql,
    #[serde(alias = "postgresql", alias = "pgdb")]
    Postgres,
    Sqlite,
    #[serde(alias = "cxora")]
    Oracle,
}

impl Vendor {
    /// Parse a vendor from its registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" | "pgdb" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "oracle" | "cxora" => Some(Self::Oracle),
            _ => None,
        }
    }

    /// Parse the vendor from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if lower.starts_with("oracle://") {
            Some(Self::Oracle)
        } else {
            None
        }
    }

    /// Canonical registry name, also the cargo feature name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
        }
    }

    /// Get the display name for this vendor.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
            Self::Oracle => "Oracle",
        }
    }

    /// Placeholder syntax the vendor's driver expects.
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::MySql | Self::Sqlite => Dialect::Question,
            Self::Postgres => Dialect::Numbered,
            Self::Oracle => Dialect::Named,
        }
    }

    /// Quote and comment rules of the vendor's SQL.
    pub fn syntax(&self) -> SqlSyntax {
        match self {
            Self::MySql => SqlSyntax::MySql,
            Self::Postgres | Self::Sqlite | Self::Oracle => SqlSyntax::Standard,
        }
    }

    /// Native type of `COUNT(*)` results.
    pub fn count_type(&self) -> RequiredType {
        match self {
            Self::Sqlite => RequiredType::Int,
            Self::MySql | Self::Postgres | Self::Oracle => RequiredType::Long,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
