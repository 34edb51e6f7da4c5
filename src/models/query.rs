//! Query request model.
//!
//! A `QueryRequest` is the per-call bundle of SQL text, positional arguments,
//! an optional row handler and an optional required result type. Row handlers
//! and required types are accepted only through their named setters; the
//! positional argument list exists so that a misplaced one can be reported
//! instead of silently bound as parameters.

use super::params::Params;
use super::value::RequiredType;
use crate::db::row_handler::{RowHandler, TupleRowHandler};

/// A positionally supplied argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A parameter collection, the only argument allowed positionally.
    Params(Params),
    /// A row handler, identified by its name.
    RowHandler(&'static str),
    /// A required result type.
    RequiredType(RequiredType),
}

impl Argument {
    /// Describe a row handler passed positionally.
    pub fn row_handler<H: RowHandler>(handler: &H) -> Self {
        Self::RowHandler(handler.name())
    }
}

impl From<Params> for Argument {
    fn from(params: Params) -> Self {
        Self::Params(params)
    }
}

impl From<RequiredType> for Argument {
    fn from(required: RequiredType) -> Self {
        Self::RequiredType(required)
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest<H = TupleRowHandler> {
    pub sql: String,
    pub args: Vec<Argument>,
    pub row_handler: Option<H>,
    pub required_type: Option<RequiredType>,
}

impl QueryRequest {
    /// Create a request with no arguments.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            row_handler: None,
            required_type: None,
        }
    }
}

impl<H> QueryRequest<H> {
    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Supply the parameter collection.
    pub fn params(self, params: impl Into<Params>) -> Self {
        self.arg(Argument::Params(params.into()))
    }

    /// Supply the row handler by name.
    pub fn row_handler<R: RowHandler>(self, handler: R) -> QueryRequest<R> {
        QueryRequest {
            sql: self.sql,
            args: self.args,
            row_handler: Some(handler),
            required_type: self.required_type,
        }
    }

    /// Supply the required result type by name.
    pub fn required_type(mut self, required: RequiredType) -> Self {
        self.required_type = Some(required);
        self
    }
}

impl From<&str> for QueryRequest {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for QueryRequest {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// `(sql, params)` shorthand for the common parameterized call.
impl<S: Into<String>, P: Into<Params>> From<(S, P)> for QueryRequest {
    fn from((sql, params): (S, P)) -> Self {
        Self::new(sql).params(params)
    }
}
