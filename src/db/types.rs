//! Driver row decoding.
//!
//! This module maps sqlx rows onto [`SqlValue`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is the exception: its columns are dynamically typed, so values are
//! classified by their runtime storage class instead of the declared type.

use crate::models::{SqlValue, Vendor};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// 32 bits or narrower
    Integer,
    /// 64-bit or unsigned 32-bit
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    /// PostgreSQL `uuid`
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, vendor: Vendor) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if vendor == Vendor::Sqlite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "int8" || lower.contains("bigint") || lower == "bigserial" {
        return TypeCategory::BigInteger;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        if lower.contains("unsigned") && !lower.contains("tiny") && !lower.contains("small") {
            return TypeCategory::BigInteger;
        }
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.starts_with("timestamp")
        || lower == "datetime"
        || lower == "date"
        || lower.starts_with("time")
    {
        return TypeCategory::Temporal;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Conversion of a driver row into template values.
///
/// A column that cannot be decoded is an error, never a NULL.
pub trait RowToValues {
    fn column_names(&self) -> Vec<String>;
    fn to_values(&self) -> Result<Vec<SqlValue>, sqlx::Error>;
}

fn narrow(v: i64) -> SqlValue {
    i32::try_from(v).map_or(SqlValue::Long(v), SqlValue::Int)
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[cfg(any(feature = "mysql", feature = "postgres"))]
#[derive(Debug)]
pub struct RawDecimal(pub String);

#[cfg(feature = "mysql")]
mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
    use sqlx::{Column, Decode, Row, Type, TypeInfo};

    impl Type<sqlx::MySql> for RawDecimal {
        fn type_info() -> MySqlTypeInfo {
            <String as Type<sqlx::MySql>>::type_info()
        }

        fn compatible(ty: &MySqlTypeInfo) -> bool {
            let name = ty.name().to_lowercase();
            name.contains("decimal") || name.contains("numeric")
        }
    }

    impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
        fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
            Ok(RawDecimal(s.to_string()))
        }
    }

    impl RowToValues for MySqlRow {
        fn column_names(&self) -> Vec<String> {
            self.columns().iter().map(|c| c.name().to_string()).collect()
        }

        fn to_values(&self) -> Result<Vec<SqlValue>, sqlx::Error> {
            self.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    let type_name = col.type_info().name();
                    decode_column(self, idx, categorize_type(type_name, Vendor::MySql))
                })
                .collect()
        }
    }

    fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, sqlx::Error> {
        match category {
            TypeCategory::Decimal => Ok(row
                .try_get::<Option<RawDecimal>, _>(idx)?
                .map(|d| d.0)
                .into()),
            TypeCategory::Integer => decode_integer(row, idx, false),
            TypeCategory::BigInteger => decode_integer(row, idx, true),
            TypeCategory::Boolean => Ok(row.try_get::<Option<bool>, _>(idx)?.into()),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(row
                .try_get::<Option<Vec<u8>>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bytes)),
            TypeCategory::Json => Ok(row
                .try_get::<Option<serde_json::Value>, _>(idx)?
                .map(|v| v.to_string())
                .into()),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Uuid | TypeCategory::Text | TypeCategory::Unknown => {
                decode_text(row, idx)
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize, wide: bool) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(match v {
                None => SqlValue::Null,
                Some(v) if wide => SqlValue::Long(v),
                Some(v) => narrow(v),
            });
        }
        // Unsigned columns
        Ok(match row.try_get::<Option<u64>, _>(idx)? {
            None => SqlValue::Null,
            Some(v) => i64::try_from(v)
                .map_or_else(|_| SqlValue::Text(v.to_string()), SqlValue::Long),
        })
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.into());
        }
        Ok(row.try_get::<Option<f32>, _>(idx)?.map(f64::from).into())
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        decode_text(row, idx)
    }

    /// Text form, or the raw bytes for types with no text mapping.
    fn decode_text(row: &MySqlRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => Ok(v.into()),
            Err(text_error) => match row.try_get::<Option<Vec<u8>>, _>(idx) {
                Ok(v) => Ok(v.map_or(SqlValue::Null, SqlValue::Bytes)),
                Err(_) => Err(text_error),
            },
        }
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
    use sqlx::types::Uuid;
    use sqlx::{Column, Decode, Row, Type, TypeInfo};

    impl Type<sqlx::Postgres> for RawDecimal {
        fn type_info() -> PgTypeInfo {
            <String as Type<sqlx::Postgres>>::type_info()
        }

        fn compatible(ty: &PgTypeInfo) -> bool {
            let name = ty.name().to_lowercase();
            name.contains("numeric") || name.contains("decimal")
        }
    }

    impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
        fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
            Ok(RawDecimal(s.to_string()))
        }
    }

    impl RowToValues for PgRow {
        fn column_names(&self) -> Vec<String> {
            self.columns().iter().map(|c| c.name().to_string()).collect()
        }

        fn to_values(&self) -> Result<Vec<SqlValue>, sqlx::Error> {
            self.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    let type_name = col.type_info().name();
                    decode_column(self, idx, categorize_type(type_name, Vendor::Postgres))
                })
                .collect()
        }
    }

    fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<SqlValue, sqlx::Error> {
        match category {
            TypeCategory::Decimal => Ok(row
                .try_get::<Option<RawDecimal>, _>(idx)?
                .map(|d| d.0)
                .into()),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::BigInteger => Ok(row.try_get::<Option<i64>, _>(idx)?.into()),
            TypeCategory::Boolean => Ok(row.try_get::<Option<bool>, _>(idx)?.into()),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(row
                .try_get::<Option<Vec<u8>>, _>(idx)?
                .map_or(SqlValue::Null, SqlValue::Bytes)),
            TypeCategory::Json => Ok(row
                .try_get::<Option<serde_json::Value>, _>(idx)?
                .map(|v| v.to_string())
                .into()),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Uuid => Ok(row
                .try_get::<Option<Uuid>, _>(idx)?
                .map(|v| v.to_string())
                .into()),
            TypeCategory::Text | TypeCategory::Unknown => {
                Ok(row.try_get::<Option<String>, _>(idx)?.into())
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.into());
        }
        Ok(row.try_get::<Option<i16>, _>(idx)?.map(i32::from).into())
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.into());
        }
        Ok(row.try_get::<Option<f32>, _>(idx)?.map(f64::from).into())
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Ok(v.map(|v| v.to_rfc3339()).into());
        }
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Ok(v.map(|v| v.to_string()).into());
        }
        Ok(row.try_get::<Option<String>, _>(idx)?.into())
    }
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use sqlx::sqlite::{Sqlite, SqliteRow};
    use sqlx::{Column, Decode, Row, TypeInfo, ValueRef};

    impl RowToValues for SqliteRow {
        fn column_names(&self) -> Vec<String> {
            self.columns().iter().map(|c| c.name().to_string()).collect()
        }

        fn to_values(&self) -> Result<Vec<SqlValue>, sqlx::Error> {
            (0..self.columns().len())
                .map(|idx| decode_column(self, idx))
                .collect()
        }
    }

    /// Decode by storage class; the declared column type is only a hint.
    fn decode_column(row: &SqliteRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let class = raw.type_info().name().to_owned();
        let decoded = match class.as_str() {
            "INTEGER" => <i64 as Decode<Sqlite>>::decode(raw).map(narrow),
            "REAL" => <f64 as Decode<Sqlite>>::decode(raw).map(SqlValue::Double),
            "BLOB" => <Vec<u8> as Decode<Sqlite>>::decode(raw).map(SqlValue::Bytes),
            _ => <String as Decode<Sqlite>>::decode(raw).map(SqlValue::Text),
        };
        decoded.map_err(|source| sqlx::Error::ColumnDecode {
            index: idx.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", Vendor::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INT4", Vendor::Postgres),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", Vendor::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", Vendor::Postgres),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_big_integer() {
        assert_eq!(
            categorize_type("BIGINT", Vendor::MySql),
            TypeCategory::BigInteger
        );
        assert_eq!(
            categorize_type("INT8", Vendor::Postgres),
            TypeCategory::BigInteger
        );
        assert_eq!(
            categorize_type("INT UNSIGNED", Vendor::MySql),
            TypeCategory::BigInteger
        );
        assert_eq!(
            categorize_type("SMALLINT UNSIGNED", Vendor::MySql),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", Vendor::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", Vendor::Postgres),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", Vendor::Sqlite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal_and_text() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", Vendor::Postgres),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATETIME", Vendor::MySql),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("VARCHAR", Vendor::MySql),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("jsonb", Vendor::Postgres),
            TypeCategory::Json
        );
    }

    #[test]
    fn test_categorize_type_uuid() {
        assert_eq!(categorize_type("UUID", Vendor::Postgres), TypeCategory::Uuid);
        assert_eq!(categorize_type("uuid", Vendor::Postgres), TypeCategory::Uuid);
    }

    #[test]
    fn test_narrow() {
        assert_eq!(narrow(1), SqlValue::Int(1));
        assert_eq!(narrow(i64::MAX), SqlValue::Long(i64::MAX));
    }
}
