//! Blocking connection adapter over sqlx.
//!
//! Each [`SqlxConnection`] owns a single sqlx connection plus a current-thread
//! tokio runtime, and drives every driver future to completion inside the
//! call that issued it. Calls must not be made from within an async context.
//!
//! Sessions run in autocommit mode unless the factory was configured with
//! `autocommit = false`, in which case a transaction is opened lazily before
//! the first statement and closed by `commit`/`rollback`.

use super::connection::{Connection, Cursor};
use super::macros::{fetch_or_execute, impl_conn_dispatch};
use super::translator::{BoundParams, Statement};
use super::types::RowToValues;
use crate::config::SessionOptions;
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue, Vendor};
use sqlx::ConnectOptions;
use sqlx::Connection as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// A live sqlx connection of one of the compiled-in vendors.
pub(crate) enum VendorConnection {
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlConnection),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqliteConnection),
}

/// Result of running one statement.
pub(crate) enum Outcome {
    Rows(Vec<Row>),
    Affected(u64),
}

impl Outcome {
    /// Decode every row; the first column that fails to decode fails the
    /// statement.
    pub(crate) fn from_rows<R: RowToValues>(rows: &[R]) -> Result<Self, sqlx::Error> {
        let columns: Arc<[String]> = rows
            .first()
            .map(RowToValues::column_names)
            .unwrap_or_default()
            .into();
        let rows = rows
            .iter()
            .map(|r| Ok(Row::new(Arc::clone(&columns), r.to_values()?)))
            .collect::<Result<_, sqlx::Error>>()?;
        Ok(Self::Rows(rows))
    }
}

pub struct SqlxConnection {
    // Declared before the runtime so it is dropped while the runtime is alive.
    inner: Option<VendorConnection>,
    runtime: Runtime,
    vendor: Vendor,
    autocommit: bool,
    in_transaction: bool,
}

impl SqlxConnection {
    #[cfg(feature = "mysql")]
    pub(crate) fn connect_mysql(
        options: &sqlx::mysql::MySqlConnectOptions,
        session: SessionOptions,
    ) -> DbResult<Self> {
        Self::open(Vendor::MySql, session, options.connect(), VendorConnection::MySql)
    }

    #[cfg(feature = "postgres")]
    pub(crate) fn connect_postgres(
        options: &sqlx::postgres::PgConnectOptions,
        session: SessionOptions,
    ) -> DbResult<Self> {
        Self::open(Vendor::Postgres, session, options.connect(), VendorConnection::Postgres)
    }

    #[cfg(feature = "sqlite")]
    pub(crate) fn connect_sqlite(
        options: &sqlx::sqlite::SqliteConnectOptions,
        session: SessionOptions,
    ) -> DbResult<Self> {
        Self::open(Vendor::Sqlite, session, options.connect(), VendorConnection::Sqlite)
    }

    fn open<C>(
        vendor: Vendor,
        session: SessionOptions,
        connect: impl Future<Output = Result<C, sqlx::Error>>,
        wrap: impl FnOnce(C) -> VendorConnection,
    ) -> DbResult<Self> {
        let runtime = build_runtime()?;
        // The timer must be created inside the runtime.
        let conn = runtime
            .block_on(async { tokio::time::timeout(session.connect_timeout, connect).await })
            .map_err(|_| timed_out(vendor, session.connect_timeout))??;
        Ok(Self::new(runtime, wrap(conn), vendor, session.autocommit))
    }

    fn new(runtime: Runtime, inner: VendorConnection, vendor: Vendor, autocommit: bool) -> Self {
        info!(vendor = %vendor, autocommit, "Opened connection");
        Self {
            inner: Some(inner),
            runtime,
            vendor,
            autocommit,
            in_transaction: false,
        }
    }

    /// Run a transaction-control statement without parameters.
    fn control(&mut self, sql: &'static str) -> DbResult<()> {
        debug!(vendor = %self.vendor, statement = sql, "Transaction control");
        let Self { runtime, inner, .. } = self;
        let conn = inner.as_mut().ok_or_else(closed)?;
        runtime.block_on(async {
            impl_conn_dispatch!(conn, c => sqlx::raw_sql(sql).execute(&mut *c).await.map(|_| ()))
        })?;
        Ok(())
    }

    fn run(&mut self, statement: &Statement<'_>) -> DbResult<Outcome> {
        let values: &[SqlValue] = match &statement.params {
            BoundParams::None => &[],
            BoundParams::Positional(values) => values,
            BoundParams::Named(_) => {
                return Err(DbError::invalid_argument_type(format!(
                    "the {} driver binds positionally; named parameters are not supported",
                    self.vendor
                )));
            }
        };

        if !self.autocommit && !self.in_transaction {
            self.control("BEGIN")?;
            self.in_transaction = true;
        }

        let returns_rows = returns_rows(&statement.sql);
        let Self { runtime, inner, .. } = self;
        let conn = inner.as_mut().ok_or_else(closed)?;
        let outcome = runtime.block_on(execute_on(conn, &statement.sql, values, returns_rows))?;
        Ok(outcome)
    }
}

impl Connection for SqlxConnection {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        if self.inner.is_none() {
            return Err(closed());
        }
        Ok(Box::new(SqlxCursor {
            connection: self,
            rows: None,
            rowcount: None,
        }))
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            debug!(vendor = %self.vendor, "Commit with no open transaction");
            return Ok(());
        }
        // Still open if the statement fails, so close() can roll back.
        self.control("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            debug!(vendor = %self.vendor, "Rollback with no open transaction");
            return Ok(());
        }
        // Still open if the statement fails, so close() can roll back.
        self.control("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        let rolled_back = if self.in_transaction {
            warn!(vendor = %self.vendor, "Closing connection with an open transaction; rolling back");
            self.rollback()
        } else {
            Ok(())
        };
        if let Some(conn) = self.inner.take() {
            self.in_transaction = false;
            self.runtime
                .block_on(async { impl_conn_dispatch!(conn, c => c.close().await) })?;
            info!(vendor = %self.vendor, "Closed connection");
        }
        rolled_back
    }
}

/// Cursor over a [`SqlxConnection`]; results are buffered in full.
pub struct SqlxCursor<'c> {
    connection: &'c mut SqlxConnection,
    rows: Option<Vec<Row>>,
    rowcount: Option<u64>,
}

impl Cursor for SqlxCursor<'_> {
    fn execute(&mut self, statement: &Statement<'_>) -> DbResult<()> {
        self.rows = None;
        self.rowcount = None;
        match self.connection.run(statement)? {
            Outcome::Rows(rows) => {
                self.rowcount = Some(rows.len() as u64);
                self.rows = Some(rows);
            }
            Outcome::Affected(count) => self.rowcount = Some(count),
        }
        Ok(())
    }

    fn fetchall(&mut self) -> DbResult<Vec<Row>> {
        Ok(self.rows.take().unwrap_or_default())
    }

    fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }
}

async fn execute_on(
    conn: &mut VendorConnection,
    sql: &str,
    values: &[SqlValue],
    returns_rows: bool,
) -> Result<Outcome, sqlx::Error> {
    // Unparameterized statements go through the simple query protocol
    // untouched.
    if values.is_empty() {
        let outcome = impl_conn_dispatch!(conn, c => {
            let query = sqlx::raw_sql(sql);
            fetch_or_execute!(query, c, returns_rows)
        });
        return Ok(outcome);
    }

    let outcome = match conn {
        #[cfg(feature = "mysql")]
        VendorConnection::MySql(c) => {
            let query = values
                .iter()
                .fold(sqlx::query(sql), super::params::bind_mysql_param);
            fetch_or_execute!(query, c, returns_rows)
        }
        #[cfg(feature = "postgres")]
        VendorConnection::Postgres(c) => {
            let query = values
                .iter()
                .fold(sqlx::query(sql), super::params::bind_postgres_param);
            fetch_or_execute!(query, c, returns_rows)
        }
        #[cfg(feature = "sqlite")]
        VendorConnection::Sqlite(c) => {
            let query = values
                .iter()
                .fold(sqlx::query(sql), super::params::bind_sqlite_param);
            fetch_or_execute!(query, c, returns_rows)
        }
    };
    Ok(outcome)
}

fn build_runtime() -> DbResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbError::Driver(sqlx::Error::Io(e)))
}

fn timed_out(vendor: Vendor, after: Duration) -> DbError {
    DbError::Driver(sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("connecting to {vendor} timed out after {}s", after.as_secs()),
    )))
}

fn closed() -> DbError {
    DbError::Driver(sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "connection already closed",
    )))
}

/// Whether a statement produces a result set, judged by its leading keyword.
pub(crate) fn returns_rows(sql: &str) -> bool {
    let keyword: String = skip_leading_noise(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "SHOW" | "PRAGMA" | "VALUES" | "EXPLAIN" | "DESCRIBE" | "DESC" | "TABLE"
    ) {
        return true;
    }
    // Even-indexed pieces lie outside single-quoted literals.
    sql.split('\'')
        .step_by(2)
        .flat_map(|piece| piece.split(|c: char| !c.is_ascii_alphanumeric() && c != '_'))
        .any(|word| word.eq_ignore_ascii_case("RETURNING"))
}

fn skip_leading_noise(mut sql: &str) -> &str {
    loop {
        let trimmed = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(rest) = trimmed.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return trimmed;
        }
    }
}
