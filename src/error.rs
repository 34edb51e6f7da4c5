//! Error types for the database template.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Argument and row-handler contract violations are raised by the template itself,
//! before or after the driver round trip; driver failures are carried through as
//! their original `sqlx::Error` without reinterpretation.

use crate::models::{RequiredType, SqlValue};
use thiserror::Error;

/// Stable classification of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation invoked on a template without a connection factory.
    MissingCollaborator,
    /// A type-overloaded argument was supplied positionally.
    ArgumentMustBeNamed,
    /// A parameter collection was supplied as a bare scalar, or in a shape the driver cannot take.
    InvalidArgumentType,
    /// Row handler lacks the row-processing capability.
    Attribute,
    /// Row handler capability exists but does not fit the row.
    Type,
    /// Row handler ran and rejected the row with its own error.
    Mapping,
    /// A single value could not be converted to the required type.
    Coercion,
    /// A single-value query returned the wrong number of rows or columns.
    IncorrectResultSize,
    /// Placeholders and parameters do not line up.
    ParameterMismatch,
    /// Factory options are missing or unrecognized.
    Configuration,
    /// The vendor driver is not compiled into this build.
    DriverUnavailable,
    /// A shared single connection was requested while already in use.
    ConnectionBusy,
    /// Anything the underlying driver raised.
    Driver,
}

/// Why a row handler failed on a row.
///
/// `Attribute` and `Type` break the handler contract; `Mapping` is the
/// handler's own rejection of a row it read successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFailure {
    /// The handler does not provide `process_row`.
    Attribute,
    /// The handler's `process_row` does not match the row shape.
    Type,
    /// The handler returned [`RowHandlerError::Mapping`].
    Mapping,
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attribute => write!(f, "attribute error"),
            Self::Type => write!(f, "type error"),
            Self::Mapping => write!(f, "mapping error"),
        }
    }
}

/// Failure raised by a row handler while mapping one row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowHandlerError {
    #[error("row handler does not implement process_row")]
    MissingCapability,

    #[error("row handler expects {expected} column(s), row has {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("column index {index} out of bounds (len: {len})")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column {index} holds {found}, expected {expected}")]
    ColumnType {
        index: usize,
        found: &'static str,
        expected: RequiredType,
    },

    #[error("{0}")]
    Mapping(String),
}

impl RowHandlerError {
    /// Create a free-form mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Classify this failure.
    pub fn failure(&self) -> RowFailure {
        match self {
            Self::MissingCapability => RowFailure::Attribute,
            Self::Mapping(_) => RowFailure::Mapping,
            Self::ShapeMismatch { .. }
            | Self::ColumnIndexOutOfBounds { .. }
            | Self::ColumnNotFound(_)
            | Self::ColumnType { .. } => RowFailure::Type,
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error(
        "No connection factory configured: this template is an unconfigured placeholder. Supply a connection factory before issuing queries."
    )]
    MissingCollaborator,

    #[error("Argument '{argument}' must be supplied by name, not positionally")]
    ArgumentMustBeNamed { argument: &'static str },

    #[error("Invalid argument type: {message}")]
    InvalidArgumentType { message: String },

    #[error("Row handler {handler} failed on row {row} ({kind}): {source}")]
    RowHandler {
        handler: &'static str,
        row: usize,
        kind: RowFailure,
        #[source]
        source: RowHandlerError,
    },

    #[error("Cannot coerce {value:?} to {required}")]
    Coercion {
        value: SqlValue,
        required: RequiredType,
    },

    #[error("Incorrect result size: expected {expected}, got {actual}")]
    IncorrectResultSize { expected: String, actual: String },

    #[error("Parameter mismatch: {message}")]
    ParameterMismatch { message: String },

    #[error("Configuration error for {vendor}: {message}")]
    Configuration { vendor: String, message: String },

    #[error("Driver for {vendor} is not available in this build (enable the '{vendor}' feature)")]
    DriverUnavailable { vendor: String },

    #[error("Connection busy: {message}")]
    ConnectionBusy { message: String },

    #[error(transparent)]
    Driver(#[from] sqlx::Error),
}

impl DbError {
    /// Create an argument-must-be-named error.
    pub fn argument_must_be_named(argument: &'static str) -> Self {
        Self::ArgumentMustBeNamed { argument }
    }

    /// Create an invalid argument type error.
    pub fn invalid_argument_type(message: impl Into<String>) -> Self {
        Self::InvalidArgumentType {
            message: message.into(),
        }
    }

    /// Create a row-handler failure for the given (zero-based) row.
    pub fn row_handler(handler: &'static str, row: usize, source: RowHandlerError) -> Self {
        Self::RowHandler {
            handler,
            row,
            kind: source.failure(),
            source,
        }
    }

    /// Create a coercion error.
    pub fn coercion(value: SqlValue, required: RequiredType) -> Self {
        Self::Coercion { value, required }
    }

    /// Create an incorrect result size error.
    pub fn incorrect_result_size(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IncorrectResultSize {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a parameter mismatch error.
    pub fn parameter_mismatch(message: impl Into<String>) -> Self {
        Self::ParameterMismatch {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(vendor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            vendor: vendor.into(),
            message: message.into(),
        }
    }

    /// Create a driver unavailable error.
    pub fn driver_unavailable(vendor: impl Into<String>) -> Self {
        Self::DriverUnavailable {
            vendor: vendor.into(),
        }
    }

    /// Create a connection busy error.
    pub fn connection_busy(message: impl Into<String>) -> Self {
        Self::ConnectionBusy {
            message: message.into(),
        }
    }

    /// Get the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCollaborator => ErrorKind::MissingCollaborator,
            Self::ArgumentMustBeNamed { .. } => ErrorKind::ArgumentMustBeNamed,
            Self::InvalidArgumentType { .. } => ErrorKind::InvalidArgumentType,
            Self::RowHandler { kind, .. } => match kind {
                RowFailure::Attribute => ErrorKind::Attribute,
                RowFailure::Type => ErrorKind::Type,
                RowFailure::Mapping => ErrorKind::Mapping,
            },
            Self::Coercion { .. } => ErrorKind::Coercion,
            Self::IncorrectResultSize { .. } => ErrorKind::IncorrectResultSize,
            Self::ParameterMismatch { .. } => ErrorKind::ParameterMismatch,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::DriverUnavailable { .. } => ErrorKind::DriverUnavailable,
            Self::ConnectionBusy { .. } => ErrorKind::ConnectionBusy,
            Self::Driver(_) => ErrorKind::Driver,
        }
    }

    /// Check if this error was raised by the template before any driver call.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingCollaborator
                | ErrorKind::ArgumentMustBeNamed
                | ErrorKind::InvalidArgumentType
                | ErrorKind::ParameterMismatch
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
