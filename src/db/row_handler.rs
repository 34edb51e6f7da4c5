//! Row handler protocol.
//!
//! A row handler turns one fetched [`Row`] into a caller-defined value. The
//! template invokes it once per row, in driver order, and collects the
//! outputs. Handlers are borrowed for one call only.

use crate::error::{DbError, DbResult, RowHandlerError};
use crate::models::Row;
use std::marker::PhantomData;

/// Maps a single result row to a domain value.
///
/// `process_row` has a provided body that reports the capability as absent,
/// so a handler type that never overrides it fails with an attribute-kind
/// error on the first row.
pub trait RowHandler {
    type Output;

    fn process_row(&self, row: &Row) -> Result<Self::Output, RowHandlerError> {
        let _ = row;
        Err(RowHandlerError::MissingCapability)
    }

    /// Number of columns `process_row` expects, if fixed.
    ///
    /// A row of a different width is rejected before `process_row` runs.
    fn expected_columns(&self) -> Option<usize> {
        None
    }

    /// Name used in error messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<H: RowHandler + ?Sized> RowHandler for &H {
    type Output = H::Output;

    fn process_row(&self, row: &Row) -> Result<Self::Output, RowHandlerError> {
        (**self).process_row(row)
    }

    fn expected_columns(&self) -> Option<usize> {
        (**self).expected_columns()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<H: RowHandler + ?Sized> RowHandler for Box<H> {
    type Output = H::Output;

    fn process_row(&self, row: &Row) -> Result<Self::Output, RowHandlerError> {
        (**self).process_row(row)
    }

    fn expected_columns(&self) -> Option<usize> {
        (**self).expected_columns()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// The "plain tuples" path: every row is returned as fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleRowHandler;

impl RowHandler for TupleRowHandler {
    type Output = Row;

    fn process_row(&self, row: &Row) -> Result<Row, RowHandlerError> {
        Ok(row.clone())
    }
}

/// Adapts a closure into a [`RowHandler`].
///
/// ```
/// use sqltemplate::db::RowMapper;
///
/// let names = RowMapper::new(|row| row.get::<String>(0));
/// ```
pub struct RowMapper<F, T> {
    f: F,
    columns: Option<usize>,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> RowMapper<F, T>
where
    F: Fn(&Row) -> Result<T, RowHandlerError>,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            columns: None,
            _output: PhantomData,
        }
    }

    /// Require rows to have exactly `columns` columns.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }
}

impl<F, T> RowHandler for RowMapper<F, T>
where
    F: Fn(&Row) -> Result<T, RowHandlerError>,
{
    type Output = T;

    fn process_row(&self, row: &Row) -> Result<T, RowHandlerError> {
        (self.f)(row)
    }

    fn expected_columns(&self) -> Option<usize> {
        self.columns
    }

    fn name(&self) -> &'static str {
        "RowMapper"
    }
}

/// Map every row through `handler`, stopping at the first failure.
///
/// Rows are consumed; on failure nothing mapped so far is returned.
pub(crate) fn map_rows<H: RowHandler>(handler: &H, rows: Vec<Row>) -> DbResult<Vec<H::Output>> {
    let total = rows.len();
    let mut out = Vec::with_capacity(total);
    for (index, row) in rows.iter().enumerate() {
        let mapped = check_shape(handler, row).and_then(|()| handler.process_row(row));
        match mapped {
            Ok(value) => out.push(value),
            Err(source) => {
                if !out.is_empty() {
                    tracing::warn!(
                        handler = handler.name(),
                        row = index,
                        mapped = out.len(),
                        total,
                        "Discarding partially mapped result after row handler failure"
                    );
                }
                return Err(DbError::row_handler(handler.name(), index, source));
            }
        }
    }
    Ok(out)
}

fn check_shape<H: RowHandler>(handler: &H, row: &Row) -> Result<(), RowHandlerError> {
    match handler.expected_columns() {
        Some(expected) if expected != row.len() => Err(RowHandlerError::ShapeMismatch {
            expected,
            actual: row.len(),
        }),
        _ => Ok(()),
    }
}
