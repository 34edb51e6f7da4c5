//! The database template.
//!
//! [`DatabaseTemplate`] runs one statement per call against connections
//! obtained from its [`ConnectionFactory`]. Every public operation funnels
//! through the same primitive: validate the arguments, translate the
//! placeholders for the factory's dialect, then acquire a connection and a
//! cursor, execute, optionally fetch, and release everything before any row
//! mapping happens. The template never commits; transaction control belongs
//! to the caller (see [`SingleConnectionFactory`](super::SingleConnectionFactory)).

use super::connection::Connection;
use super::factory::ConnectionFactory;
use super::row_handler::{self, RowHandler, TupleRowHandler};
use super::translator::{self, Statement};
use crate::error::{DbError, DbResult};
use crate::models::{Argument, Params, QueryRequest, RequiredType, Row, SqlValue};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows and row count of one executed statement.
struct Execution {
    rows: Vec<Row>,
    rowcount: Option<u64>,
}

/// Blocking SQL façade over a connection factory.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use sqltemplate::db::{DatabaseTemplate, SqliteConnectionFactory};
///
/// let template = DatabaseTemplate::new(Arc::new(SqliteConnectionFactory::new("animals.db")));
/// let renamed = template.update((
///     "UPDATE animal SET name = ? WHERE category = ?",
///     ("python", "reptile"),
/// ))?;
/// # Ok::<(), sqltemplate::error::DbError>(())
/// ```
#[derive(Clone, Default)]
pub struct DatabaseTemplate {
    factory: Option<Arc<dyn ConnectionFactory>>,
}

impl DatabaseTemplate {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory: Some(factory),
        }
    }

    /// A template with no factory. Every operation on it fails with
    /// `MissingCollaborator` until one is set.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn set_connection_factory(&mut self, factory: Arc<dyn ConnectionFactory>) {
        self.factory = Some(factory);
    }

    pub fn connection_factory(&self) -> Option<&Arc<dyn ConnectionFactory>> {
        self.factory.as_ref()
    }

    /// Run a query and map every row through the request's row handler.
    ///
    /// The handler must be supplied with [`QueryRequest::row_handler`]; one
    /// given positionally, or none at all, is `ArgumentMustBeNamed`.
    pub fn query<H: RowHandler>(&self, request: QueryRequest<H>) -> DbResult<Vec<H::Output>> {
        let (factory, statement) = self.prepare(&request)?;
        let handler = request
            .row_handler
            .as_ref()
            .ok_or_else(|| DbError::argument_must_be_named("rowhandler"))?;
        let execution = run(factory, "query", &statement, true)?;
        row_handler::map_rows(handler, execution.rows)
    }

    /// Run a query and return its rows as fetched.
    pub fn query_for_list(&self, request: impl Into<QueryRequest>) -> DbResult<Vec<Row>> {
        let request = request.into();
        let (factory, statement) = self.prepare(&request)?;
        let execution = run(factory, "query_for_list", &statement, true)?;
        row_handler::map_rows(&TupleRowHandler, execution.rows)
    }

    /// Run a single-value query and coerce the value to a 32-bit integer.
    pub fn query_for_int(&self, request: impl Into<QueryRequest>) -> DbResult<i32> {
        let request = request.into();
        match self.single_value(&request, "query_for_int", Some(RequiredType::Int))? {
            SqlValue::Int(value) => Ok(value),
            other => Err(DbError::coercion(other, RequiredType::Int)),
        }
    }

    /// Run a single-value query and coerce the value to a 64-bit integer.
    pub fn query_for_long(&self, request: impl Into<QueryRequest>) -> DbResult<i64> {
        let request = request.into();
        match self.single_value(&request, "query_for_long", Some(RequiredType::Long))? {
            SqlValue::Long(value) => Ok(value),
            other => Err(DbError::coercion(other, RequiredType::Long)),
        }
    }

    /// Run a single-value query and coerce the value to the request's
    /// required type, which must be supplied with
    /// [`QueryRequest::required_type`].
    pub fn query_for_object(&self, request: impl Into<QueryRequest>) -> DbResult<SqlValue> {
        let request = request.into();
        self.single_value(&request, "query_for_object", request.required_type)
    }

    /// Run a DML statement and return the driver's affected-row count.
    pub fn update(&self, request: impl Into<QueryRequest>) -> DbResult<u64> {
        self.execute_for_count(request.into(), "update")
    }

    /// Run any statement (DDL included) and return the driver's row count.
    pub fn execute(&self, request: impl Into<QueryRequest>) -> DbResult<u64> {
        self.execute_for_count(request.into(), "execute")
    }

    fn execute_for_count(&self, request: QueryRequest, operation: &'static str) -> DbResult<u64> {
        let (factory, statement) = self.prepare(&request)?;
        let execution = run(factory, operation, &statement, false)?;
        Ok(execution.rowcount.unwrap_or(0))
    }

    /// Fetch exactly one column of at most one row, coerced to `required`.
    ///
    /// An empty result reads as NULL, which never coerces.
    fn single_value<H>(
        &self,
        request: &QueryRequest<H>,
        operation: &'static str,
        required: Option<RequiredType>,
    ) -> DbResult<SqlValue> {
        let (factory, statement) = self.prepare(request)?;
        let required =
            required.ok_or_else(|| DbError::argument_must_be_named("required_type"))?;
        let execution = run(factory, operation, &statement, true)?;
        let mut rows = execution.rows;
        if rows.len() > 1 {
            return Err(DbError::incorrect_result_size(
                "1 row",
                format!("{} rows", rows.len()),
            ));
        }
        let value = match rows.pop() {
            None => SqlValue::Null,
            Some(row) if row.len() == 1 => row.into_values().swap_remove(0),
            Some(row) => {
                return Err(DbError::incorrect_result_size(
                    "1 column",
                    format!("{} columns", row.len()),
                ));
            }
        };
        value.coerce(required)
    }

    /// Validate arguments and translate the statement. No driver call happens
    /// before this succeeds.
    fn prepare<'r, H>(
        &self,
        request: &'r QueryRequest<H>,
    ) -> DbResult<(&Arc<dyn ConnectionFactory>, Statement<'r>)> {
        let factory = self.factory.as_ref().ok_or(DbError::MissingCollaborator)?;
        let params = positional_params(&request.args)?;
        let statement =
            translator::translate_with(&request.sql, params, factory.dialect(), factory.syntax())?;
        Ok((factory, statement))
    }
}

impl fmt::Debug for DatabaseTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTemplate")
            .field("factory", &self.factory)
            .finish()
    }
}

/// The parameter collection among the positional arguments.
///
/// Only the first positional slot may hold one. A row handler or required
/// type anywhere in the list is `ArgumentMustBeNamed`.
fn positional_params(args: &[Argument]) -> DbResult<Option<&Params>> {
    for arg in args {
        match arg {
            Argument::RowHandler(_) => return Err(DbError::argument_must_be_named("rowhandler")),
            Argument::RequiredType(_) => {
                return Err(DbError::argument_must_be_named("required_type"));
            }
            Argument::Params(_) => {}
        }
    }
    match args {
        [] => Ok(None),
        [Argument::Params(params)] => Ok(Some(params)),
        _ => Err(DbError::invalid_argument_type(format!(
            "expected at most one parameter collection, got {} positional arguments",
            args.len()
        ))),
    }
}

/// Acquire a connection, run `statement` and release the connection.
///
/// The first error wins; a failure to close after an earlier error is only
/// logged.
fn run(
    factory: &Arc<dyn ConnectionFactory>,
    operation: &'static str,
    statement: &Statement<'_>,
    fetch: bool,
) -> DbResult<Execution> {
    debug!(
        operation,
        dialect = %factory.dialect(),
        params = statement.params.len(),
        sql = %statement.sql,
        "Executing statement"
    );
    let mut conn = factory.connect()?;
    let result = execute_statement(conn.as_mut(), statement, fetch);
    let closed = conn.close();
    match (result, closed) {
        (Ok(execution), Ok(())) => Ok(execution),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_error)) => {
            warn!(operation, error = %close_error, "Failed to close connection after error");
            Err(e)
        }
    }
}

fn execute_statement(
    conn: &mut dyn Connection,
    statement: &Statement<'_>,
    fetch: bool,
) -> DbResult<Execution> {
    let mut cursor = conn.cursor()?;
    cursor.execute(statement)?;
    let rows = if fetch { cursor.fetchall()? } else { Vec::new() };
    Ok(Execution {
        rows,
        rowcount: cursor.rowcount(),
    })
}
