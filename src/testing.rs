//! Scripted connection factory for tests.
//!
//! [`StubConnectionFactory`] stands in for a real vendor: every statement a
//! cursor executes is recorded, and results are served from a FIFO queue of
//! [`StubResponse`]s. Session lifecycle calls are counted so tests can check
//! that connections are released and that nothing commits behind their back.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use sqltemplate::db::DatabaseTemplate;
//! use sqltemplate::testing::{StubConnectionFactory, StubResponse};
//!
//! let stub = Arc::new(StubConnectionFactory::new());
//! stub.push_response(StubResponse::new().columns(["population"]).row([1]));
//!
//! let template = DatabaseTemplate::new(stub.clone());
//! assert_eq!(template.query_for_int("select population from animal").unwrap(), 1);
//! assert_eq!(stub.close_count(), 1);
//! ```

use crate::db::connection::{Connection, Cursor};
use crate::db::factory::ConnectionFactory;
use crate::db::translator::{BoundParams, Dialect, SqlSyntax, Statement};
use crate::error::DbResult;
use crate::models::{RequiredType, Row, SqlValue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A statement as the stub driver received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: BoundParams,
}

/// The scripted result of one `execute`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StubResponse {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    rowcount: Option<u64>,
    error: Option<String>,
}

impl StubResponse {
    /// An empty result with no row count.
    pub fn new() -> Self {
        Self::default()
    }

    /// A response whose `execute` fails with a driver protocol error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Row count reported after `execute`. Defaults to the number of rows
    /// when rows are scripted.
    pub fn rowcount(mut self, rowcount: u64) -> Self {
        self.rowcount = Some(rowcount);
        self
    }

    fn reported_rowcount(&self) -> Option<u64> {
        self.rowcount
            .or_else(|| (!self.rows.is_empty()).then_some(self.rows.len() as u64))
    }

    fn into_rows(self) -> Vec<Row> {
        let columns: Arc<[String]> = self.columns.into();
        self.rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect()
    }
}

#[derive(Debug, Default)]
struct StubState {
    responses: VecDeque<StubResponse>,
    statements: Vec<RecordedStatement>,
    connect_error: Option<String>,
    connects: usize,
    closes: usize,
    commits: usize,
    rollbacks: usize,
}

/// A connection factory backed by scripted responses.
#[derive(Debug)]
pub struct StubConnectionFactory {
    state: Arc<Mutex<StubState>>,
    dialect: Dialect,
    syntax: SqlSyntax,
    count_type: RequiredType,
}

impl StubConnectionFactory {
    /// A `?`-dialect stub whose count type is `Int`.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            dialect: Dialect::Question,
            syntax: SqlSyntax::Standard,
            count_type: RequiredType::Int,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_syntax(mut self, syntax: SqlSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_count_type(mut self, count_type: RequiredType) -> Self {
        self.count_type = count_type;
        self
    }

    /// Queue the response for the next executed statement.
    pub fn push_response(&self, response: StubResponse) {
        self.lock().responses.push_back(response);
    }

    /// Make every later `connect()` fail with a driver error.
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.lock().connect_error = Some(message.into());
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.lock().statements.clone()
    }

    pub fn last_statement(&self) -> Option<RecordedStatement> {
        self.lock().statements.last().cloned()
    }

    pub fn pending_responses(&self) -> usize {
        self.lock().responses.len()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.lock().rollbacks
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        lock_state(&self.state)
    }
}

impl Default for StubConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for StubConnectionFactory {
    fn name(&self) -> &str {
        "stub"
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn syntax(&self) -> SqlSyntax {
        self.syntax
    }

    fn count_type(&self) -> RequiredType {
        self.count_type
    }

    fn connect(&self) -> DbResult<Box<dyn Connection>> {
        let mut state = self.lock();
        if let Some(message) = &state.connect_error {
            return Err(sqlx::Error::Protocol(message.clone()).into());
        }
        state.connects += 1;
        Ok(Box::new(StubConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubConnection {
    state: Arc<Mutex<StubState>>,
}

impl Connection for StubConnection {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(StubCursor {
            state: &self.state,
            rows: Vec::new(),
            rowcount: None,
        }))
    }

    fn commit(&mut self) -> DbResult<()> {
        lock_state(&self.state).commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        lock_state(&self.state).rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> DbResult<()> {
        lock_state(&self.state).closes += 1;
        Ok(())
    }
}

struct StubCursor<'c> {
    state: &'c Mutex<StubState>,
    rows: Vec<Row>,
    rowcount: Option<u64>,
}

impl Cursor for StubCursor<'_> {
    fn execute(&mut self, statement: &Statement<'_>) -> DbResult<()> {
        let mut state = lock_state(self.state);
        state.statements.push(RecordedStatement {
            sql: statement.sql.to_string(),
            params: statement.params.clone(),
        });
        let response = state.responses.pop_front().unwrap_or_default();
        drop(state);

        if let Some(message) = response.error {
            return Err(sqlx::Error::Protocol(message).into());
        }
        self.rowcount = response.reported_rowcount();
        self.rows = response.into_rows();
        Ok(())
    }

    fn fetchall(&mut self) -> DbResult<Vec<Row>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }
}

fn lock_state(state: &Mutex<StubState>) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_are_served_in_order() {
        let stub = StubConnectionFactory::new();
        stub.push_response(StubResponse::new().columns(["n"]).row([1]));
        stub.push_response(StubResponse::new().rowcount(3));

        let mut conn = stub.connect().unwrap();
        let mut cursor = conn.cursor().unwrap();
        let select = Statement {
            sql: "select n from t".into(),
            params: BoundParams::None,
        };
        cursor.execute(&select).unwrap();
        assert_eq!(cursor.rowcount(), Some(1));
        assert_eq!(cursor.fetchall().unwrap()[0].columns(), ["n"]);

        let update = Statement {
            sql: "update t set n = ?".into(),
            params: BoundParams::Positional(vec![SqlValue::Int(2)]),
        };
        cursor.execute(&update).unwrap();
        assert_eq!(cursor.rowcount(), Some(3));
        assert!(cursor.fetchall().unwrap().is_empty());
        drop(cursor);

        assert_eq!(stub.statements().len(), 2);
        assert_eq!(stub.last_statement().unwrap().params, update.params);
        assert_eq!(stub.pending_responses(), 0);
    }

    #[test]
    fn test_failing_response_is_driver_error() {
        let stub = StubConnectionFactory::new();
        stub.push_response(StubResponse::failing("boom"));
        let mut conn = stub.connect().unwrap();
        let mut cursor = conn.cursor().unwrap();
        let err = cursor
            .execute(&Statement {
                sql: "select 1".into(),
                params: BoundParams::None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
