//! Connection factories.
//!
//! A factory captures the connection parameters of one vendor at construction
//! and opens a fresh [`Connection`] on every `connect()`; it never caches or
//! pools. Each vendor accepts its own option key names. Drivers are only
//! touched inside `connect()`, so a vendor whose cargo feature is disabled
//! still constructs and fails with `DriverUnavailable` when used.

use super::connection::Connection;
use super::translator::{Dialect, SqlSyntax};
use crate::config::{FactoryOptions, OptionReader, SessionOptions};
use crate::error::{DbError, DbResult};
use crate::models::{RequiredType, Vendor};
use std::fmt;
use tracing::debug;

/// Produces connections for the template.
pub trait ConnectionFactory: Send + Sync + fmt::Debug {
    /// Registry name of the vendor behind this factory.
    fn name(&self) -> &str;

    /// Placeholder dialect the vendor's driver expects.
    fn dialect(&self) -> Dialect;

    /// Quote and comment rules used when scanning for placeholders.
    fn syntax(&self) -> SqlSyntax {
        SqlSyntax::Standard
    }

    /// Native type of `COUNT(*)` results for this vendor.
    fn count_type(&self) -> RequiredType;

    /// Open a new connection. Driver failures are returned as-is.
    fn connect(&self) -> DbResult<Box<dyn Connection>>;
}

const MYSQL_SSL_MODES: &[&str] = &[
    "disabled",
    "preferred",
    "required",
    "verify_ca",
    "verify_identity",
];

const PG_SSL_MODES: &[&str] = &[
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

/// Host, credentials and database of a networked vendor.
#[derive(Clone, PartialEq, Eq)]
struct ServerSettings {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    database: String,
}

impl ServerSettings {
    fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            password: (!password.is_empty()).then_some(password),
            database: database.into(),
        }
    }
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// MySQL / MariaDB factory.
///
/// Options: `username` (or `user`), `password`, `hostname` (or `host`),
/// `db` (or `database`), `port`, `charset`, `ssl_mode`, `autocommit`,
/// `connect_timeout`.
#[derive(Debug, Clone)]
pub struct MySqlConnectionFactory {
    server: ServerSettings,
    charset: Option<String>,
    ssl_mode: Option<String>,
    session: SessionOptions,
}

impl MySqlConnectionFactory {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        db: impl Into<String>,
    ) -> Self {
        Self {
            server: ServerSettings::new(username, password, hostname, db),
            charset: None,
            ssl_mode: None,
            session: SessionOptions::default(),
        }
    }

    pub fn from_options(options: FactoryOptions) -> DbResult<Self> {
        let mut reader = OptionReader::new(Vendor::MySql.name(), options);
        let server = ServerSettings {
            user: reader.require(&["username", "user"])?,
            password: reader.take(&["password"])?,
            host: reader.require(&["hostname", "host"])?,
            database: reader.require(&["db", "database"])?,
            port: reader.take_parsed(&["port"])?,
        };
        let charset = reader.take(&["charset"])?;
        let ssl_mode = reader.take_one_of(&["ssl_mode", "ssl-mode"], MYSQL_SSL_MODES)?;
        let session = SessionOptions::read(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            server,
            charset,
            ssl_mode,
            session,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = Some(port);
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }
}

impl ConnectionFactory for MySqlConnectionFactory {
    fn name(&self) -> &str {
        Vendor::MySql.name()
    }

    fn dialect(&self) -> Dialect {
        Vendor::MySql.dialect()
    }

    fn syntax(&self) -> SqlSyntax {
        Vendor::MySql.syntax()
    }

    fn count_type(&self) -> RequiredType {
        Vendor::MySql.count_type()
    }

    #[cfg(feature = "mysql")]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
        use std::str::FromStr;

        debug!(host = %self.server.host, database = %self.server.database, "Connecting to MySQL");
        let mut options = MySqlConnectOptions::new()
            .host(&self.server.host)
            .username(&self.server.user)
            .database(&self.server.database);
        if let Some(port) = self.server.port {
            options = options.port(port);
        }
        if let Some(password) = &self.server.password {
            options = options.password(password);
        }
        if let Some(charset) = &self.charset {
            options = options.charset(charset);
        }
        if let Some(mode) = &self.ssl_mode {
            let mode = MySqlSslMode::from_str(mode)
                .map_err(|e| DbError::configuration(self.name(), e.to_string()))?;
            options = options.ssl_mode(mode);
        }
        let conn = super::sqlx_adapter::SqlxConnection::connect_mysql(&options, self.session)?;
        Ok(Box::new(conn))
    }

    #[cfg(not(feature = "mysql"))]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        Err(DbError::driver_unavailable(self.name()))
    }
}

/// PostgreSQL factory.
///
/// Options: `user` (or `username`), `password`, `host` (or `hostname`),
/// `database` (or `db`), `port`, `sslmode`, `application_name`,
/// `autocommit`, `connect_timeout`.
#[derive(Debug, Clone)]
pub struct PgdbConnectionFactory {
    server: ServerSettings,
    ssl_mode: Option<String>,
    application_name: Option<String>,
    session: SessionOptions,
}

impl PgdbConnectionFactory {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            server: ServerSettings::new(user, password, host, database),
            ssl_mode: None,
            application_name: None,
            session: SessionOptions::default(),
        }
    }

    pub fn from_options(options: FactoryOptions) -> DbResult<Self> {
        let mut reader = OptionReader::new(Vendor::Postgres.name(), options);
        let server = ServerSettings {
            user: reader.require(&["user", "username"])?,
            password: reader.take(&["password"])?,
            host: reader.require(&["host", "hostname"])?,
            database: reader.require(&["database", "db"])?,
            port: reader.take_parsed(&["port"])?,
        };
        let ssl_mode = reader.take_one_of(&["sslmode", "ssl_mode"], PG_SSL_MODES)?;
        let application_name = reader.take(&["application_name"])?;
        let session = SessionOptions::read(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            server,
            ssl_mode,
            application_name,
            session,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = Some(port);
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }
}

impl ConnectionFactory for PgdbConnectionFactory {
    fn name(&self) -> &str {
        Vendor::Postgres.name()
    }

    fn dialect(&self) -> Dialect {
        Vendor::Postgres.dialect()
    }

    fn count_type(&self) -> RequiredType {
        Vendor::Postgres.count_type()
    }

    #[cfg(feature = "postgres")]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        use sqlx::postgres::{PgConnectOptions, PgSslMode};
        use std::str::FromStr;

        debug!(host = %self.server.host, database = %self.server.database, "Connecting to PostgreSQL");
        let mut options = PgConnectOptions::new()
            .host(&self.server.host)
            .username(&self.server.user)
            .database(&self.server.database);
        if let Some(port) = self.server.port {
            options = options.port(port);
        }
        if let Some(password) = &self.server.password {
            options = options.password(password);
        }
        if let Some(mode) = &self.ssl_mode {
            let mode = PgSslMode::from_str(mode)
                .map_err(|e| DbError::configuration(self.name(), e.to_string()))?;
            options = options.ssl_mode(mode);
        }
        if let Some(name) = &self.application_name {
            options = options.application_name(name);
        }
        let conn = super::sqlx_adapter::SqlxConnection::connect_postgres(&options, self.session)?;
        Ok(Box::new(conn))
    }

    #[cfg(not(feature = "postgres"))]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        Err(DbError::driver_unavailable(self.name()))
    }
}

/// SQLite factory.
///
/// Options: `db` (or `database`) naming the file, or `:memory:`;
/// `create_if_missing` (default true), `read_only`, `autocommit`,
/// `connect_timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConnectionFactory {
    db: String,
    create_if_missing: bool,
    read_only: bool,
    session: SessionOptions,
}

impl SqliteConnectionFactory {
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            create_if_missing: true,
            read_only: false,
            session: SessionOptions::default(),
        }
    }

    pub fn from_options(options: FactoryOptions) -> DbResult<Self> {
        let mut reader = OptionReader::new(Vendor::Sqlite.name(), options);
        let db = reader.require(&["db", "database"])?;
        let create_if_missing = reader.take_bool(&["create_if_missing"])?.unwrap_or(true);
        let read_only = reader.take_bool(&["read_only"])?.unwrap_or(false);
        let session = SessionOptions::read(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            db,
            create_if_missing,
            read_only,
            session,
        })
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    /// Path of the database file.
    pub fn db(&self) -> &str {
        &self.db
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn name(&self) -> &str {
        Vendor::Sqlite.name()
    }

    fn dialect(&self) -> Dialect {
        Vendor::Sqlite.dialect()
    }

    fn count_type(&self) -> RequiredType {
        Vendor::Sqlite.count_type()
    }

    #[cfg(feature = "sqlite")]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        debug!(db = %self.db, read_only = self.read_only, "Opening SQLite database");
        let options = if self.db == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.db)
                .create_if_missing(self.create_if_missing && !self.read_only)
        };
        let options = options.read_only(self.read_only);
        let conn = super::sqlx_adapter::SqlxConnection::connect_sqlite(&options, self.session)?;
        Ok(Box::new(conn))
    }

    #[cfg(not(feature = "sqlite"))]
    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        Err(DbError::driver_unavailable(self.name()))
    }
}

/// Oracle factory.
///
/// Options: `username` (or `user`), `password`, `hostname` (or `host`),
/// `db` (or `database`), `port`. Statements use `:name` placeholders with
/// mapping parameters. No Oracle driver is linked into this crate, so
/// `connect()` always reports the driver as unavailable; argument validation
/// still runs before that point.
#[derive(Debug, Clone)]
pub struct OracleConnectionFactory {
    server: ServerSettings,
}

impl OracleConnectionFactory {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        db: impl Into<String>,
    ) -> Self {
        Self {
            server: ServerSettings::new(username, password, hostname, db),
        }
    }

    pub fn from_options(options: FactoryOptions) -> DbResult<Self> {
        let mut reader = OptionReader::new(Vendor::Oracle.name(), options);
        let server = ServerSettings {
            user: reader.require(&["username", "user"])?,
            password: reader.take(&["password"])?,
            host: reader.require(&["hostname", "host"])?,
            database: reader.require(&["db", "database"])?,
            port: reader.take_parsed(&["port"])?,
        };
        reader.finish()?;
        Ok(Self { server })
    }
}

impl ConnectionFactory for OracleConnectionFactory {
    fn name(&self) -> &str {
        Vendor::Oracle.name()
    }

    fn dialect(&self) -> Dialect {
        Vendor::Oracle.dialect()
    }

    fn count_type(&self) -> RequiredType {
        Vendor::Oracle.count_type()
    }

    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        debug!(host = %self.server.host, database = %self.server.database, "Oracle connection requested");
        Err(DbError::driver_unavailable(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_count_types_per_vendor() {
        let mysql = MySqlConnectionFactory::new("foo", "bar", "localhost", "mock");
        let pg = PgdbConnectionFactory::new("foo", "bar", "localhost", "mock");
        let sqlite = SqliteConnectionFactory::new(":memory:");
        let oracle = OracleConnectionFactory::new("foo", "bar", "localhost", "mock");

        assert_eq!(mysql.count_type(), RequiredType::Long);
        assert_eq!(pg.count_type(), RequiredType::Long);
        assert_eq!(sqlite.count_type(), RequiredType::Int);
        assert_eq!(oracle.count_type(), RequiredType::Long);
    }

    #[test]
    fn test_dialects_per_vendor() {
        assert_eq!(
            MySqlConnectionFactory::new("u", "p", "h", "d").dialect(),
            Dialect::Question
        );
        assert_eq!(
            PgdbConnectionFactory::new("u", "p", "h", "d").dialect(),
            Dialect::Numbered
        );
        assert_eq!(SqliteConnectionFactory::new("x.db").dialect(), Dialect::Question);
        assert_eq!(
            OracleConnectionFactory::new("u", "p", "h", "d").dialect(),
            Dialect::Named
        );
    }

    #[test]
    fn test_mysql_options_use_native_keys() {
        let factory = MySqlConnectionFactory::from_options(FactoryOptions::from([
            ("username", "foo"),
            ("password", "bar"),
            ("hostname", "localhost"),
            ("db", "mock"),
            ("port", "3307"),
            ("ssl_mode", "REQUIRED"),
            ("autocommit", "false"),
        ]))
        .unwrap();

        assert_eq!(factory.server.user, "foo");
        assert_eq!(factory.server.port, Some(3307));
        assert_eq!(factory.ssl_mode.as_deref(), Some("required"));
        assert!(!factory.session.autocommit);
    }

    #[test]
    fn test_pgdb_options_accept_aliases() {
        let factory = PgdbConnectionFactory::from_options(FactoryOptions::from([
            ("username", "foo"),
            ("hostname", "localhost"),
            ("db", "mock"),
        ]))
        .unwrap();
        assert_eq!(factory.server.user, "foo");
        assert_eq!(factory.server.database, "mock");
        assert!(factory.server.password.is_none());
    }

    #[test]
    fn test_options_reject_unknown_and_missing_keys() {
        let err = MySqlConnectionFactory::from_options(FactoryOptions::from([
            ("username", "foo"),
            ("hostname", "localhost"),
            ("db", "mock"),
            ("dbname", "mock"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("dbname"));

        let err = PgdbConnectionFactory::from_options(FactoryOptions::from([("user", "foo")]))
            .unwrap_err();
        assert!(err.to_string().contains("host"));

        let err = SqliteConnectionFactory::from_options(FactoryOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_ssl_mode_rejected_at_construction() {
        let err = PgdbConnectionFactory::from_options(FactoryOptions::from([
            ("user", "foo"),
            ("host", "localhost"),
            ("database", "mock"),
            ("sslmode", "sometimes"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("sslmode"));
    }

    #[test]
    fn test_debug_masks_password() {
        let factory = MySqlConnectionFactory::new("foo", "hunter2", "localhost", "mock");
        let shown = format!("{factory:?}");
        assert!(shown.contains("foo"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_oracle_connect_reports_missing_driver() {
        let factory = OracleConnectionFactory::new("foo", "bar", "localhost", "mock");
        let err = factory.connect().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DriverUnavailable);
    }
}
