//! Blocking connection and cursor contract.
//!
//! This is the whole driver boundary the template relies on: a connection
//! hands out cursors and delegates `commit`/`rollback`; a cursor executes one
//! statement, returns its rows and reports a row count. Any driver shaped
//! like this can sit behind a [`ConnectionFactory`](super::ConnectionFactory).

use super::translator::Statement;
use crate::error::DbResult;
use crate::models::Row;

/// Execution context for exactly one statement.
///
/// A cursor borrows its connection, so it can neither outlive it nor be
/// shared with another logical operation.
pub trait Cursor {
    /// Execute `statement` with its bound parameters.
    fn execute(&mut self, statement: &Statement<'_>) -> DbResult<()>;

    /// Drain the rows produced by the last `execute`.
    ///
    /// Statements that produce no result set yield no rows.
    fn fetchall(&mut self) -> DbResult<Vec<Row>>;

    /// Rows affected (or returned) by the last `execute`; `None` if unknown.
    fn rowcount(&self) -> Option<u64>;
}

/// A live driver session.
pub trait Connection: Send {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Release the session. Called once per template operation.
    fn close(&mut self) -> DbResult<()>;
}
