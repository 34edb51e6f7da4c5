//! Column values, required result types and result rows.
//!
//! `SqlValue` is the driver-agnostic representation of one column value, used
//! both for bound parameters and for fetched rows. `RequiredType` names the
//! target of a single-value coercion (`query_for_object`, `count_type`).

use crate::error::{DbError, DbResult, RowHandlerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use std::sync::Arc;

/// A single column value or bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Floating point value
    Double(f64),
    /// String value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

/// Target type of a single-value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredType {
    Int,
    Long,
    Double,
    Text,
    Bool,
    Bytes,
}

impl RequiredType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for RequiredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RequiredType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" | "i32" => Ok(Self::Int),
            "long" | "bigint" | "i64" => Ok(Self::Long),
            "double" | "float" | "real" | "f64" => Ok(Self::Double),
            "text" | "string" | "str" => Ok(Self::Text),
            "bool" | "boolean" => Ok(Self::Bool),
            "bytes" | "binary" | "blob" => Ok(Self::Bytes),
            other => Err(format!("unknown required type '{other}'")),
        }
    }
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Bool(v) => Some(i32::from(*v)),
            Self::Int(v) => Some(*v),
            Self::Long(v) => i32::try_from(*v).ok(),
            Self::Double(v) => float_to_integer(*v).and_then(|v| i32::try_from(v).ok()),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Null | Self::Bytes(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Double(v) => float_to_integer(*v),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Null | Self::Bytes(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(f64::from(*v)),
            Self::Long(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Null | Self::Bytes(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            Self::Long(v) => Some(*v != 0),
            Self::Double(v) => Some(*v != 0.0),
            Self::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(true),
                "false" | "f" | "0" | "no" => Some(false),
                _ => None,
            },
            Self::Null | Self::Bytes(_) => None,
        }
    }

    /// Borrow the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Render as text. Bytes must be valid UTF-8.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(v) => Some(v.to_string()),
            Self::Int(v) => Some(v.to_string()),
            Self::Long(v) => Some(v.to_string()),
            Self::Double(v) => Some(v.to_string()),
            Self::Text(v) => Some(v.clone()),
            Self::Bytes(v) => String::from_utf8(v.clone()).ok(),
        }
    }

    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(v) => Some(v.clone()),
            Self::Text(v) => Some(v.as_bytes().to_vec()),
            _ => None,
        }
    }

    /// Coerce this value to the required type.
    ///
    /// Integer narrowing is range-checked and floats are truncated toward zero;
    /// NULL never coerces.
    pub fn coerce(&self, required: RequiredType) -> DbResult<SqlValue> {
        let coerced = match required {
            RequiredType::Int => self.as_i32().map(SqlValue::Int),
            RequiredType::Long => self.as_i64().map(SqlValue::Long),
            RequiredType::Double => self.as_f64().map(SqlValue::Double),
            RequiredType::Text => self.to_text().map(SqlValue::Text),
            RequiredType::Bool => self.as_bool().map(SqlValue::Bool),
            RequiredType::Bytes => self.to_bytes().map(SqlValue::Bytes),
        };
        coerced.ok_or_else(|| DbError::coercion(self.clone(), required))
    }
}

fn float_to_integer(v: f64) -> Option<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Long(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Bytes(value.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Conversion out of a column value, used by [`Row::get`].
pub trait FromSqlValue: Sized {
    const REQUIRED: RequiredType;

    fn from_sql_value(value: &SqlValue) -> Option<Self>;
}

impl FromSqlValue for i32 {
    const REQUIRED: RequiredType = RequiredType::Int;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.as_i32()
    }
}

impl FromSqlValue for i64 {
    const REQUIRED: RequiredType = RequiredType::Long;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromSqlValue for f64 {
    const REQUIRED: RequiredType = RequiredType::Double;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromSqlValue for bool {
    const REQUIRED: RequiredType = RequiredType::Bool;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromSqlValue for String {
    const REQUIRED: RequiredType = RequiredType::Text;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.to_text()
    }
}

impl FromSqlValue for Vec<u8> {
    const REQUIRED: RequiredType = RequiredType::Bytes;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        value.to_bytes()
    }
}

impl FromSqlValue for SqlValue {
    const REQUIRED: RequiredType = RequiredType::Text;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        Some(value.clone())
    }
}

/// A fetched result row: column values in driver order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from shared column names and values.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Creates a row without column names.
    pub fn from_values(values: Vec<SqlValue>) -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            values,
        }
    }

    /// Gets a column by position, converted to `T`.
    ///
    /// `Option<T>` is not supported; read nullable columns with [`Row::value`].
    pub fn get<T: FromSqlValue>(&self, index: usize) -> Result<T, RowHandlerError> {
        let value = self
            .values
            .get(index)
            .ok_or(RowHandlerError::ColumnIndexOutOfBounds {
                index,
                len: self.values.len(),
            })?;
        T::from_sql_value(value).ok_or(RowHandlerError::ColumnType {
            index,
            found: value.type_name(),
            expected: T::REQUIRED,
        })
    }

    /// Gets a column by name, converted to `T`.
    pub fn get_by_name<T: FromSqlValue>(&self, name: &str) -> Result<T, RowHandlerError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| RowHandlerError::ColumnNotFound(name.to_string()))?;
        self.get(index)
    }

    /// Borrows the raw value at `index`.
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Returns column names; empty when the driver supplied none.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = SqlValue;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
