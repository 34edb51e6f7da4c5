//! Database dispatch macros for reducing code duplication.
//!
//! Each sqlx connection type is a distinct Rust type, so code that is
//! textually identical across vendors still has to be written once per
//! variant. These macros expand the same body into every compiled-in arm.

/// Generate one match arm per compiled-in `VendorConnection` variant.
///
/// # Example
///
/// ```ignore
/// impl_conn_dispatch!(&mut self.inner, c => sqlx::raw_sql("COMMIT").execute(&mut *c).await)
/// ```
macro_rules! impl_conn_dispatch {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            #[cfg(feature = "mysql")]
            $crate::db::sqlx_adapter::VendorConnection::MySql($c) => $body,
            #[cfg(feature = "postgres")]
            $crate::db::sqlx_adapter::VendorConnection::Postgres($c) => $body,
            #[cfg(feature = "sqlite")]
            $crate::db::sqlx_adapter::VendorConnection::Sqlite($c) => $body,
        }
    };
}

/// Run a built query either for its rows or for its affected-row count.
macro_rules! fetch_or_execute {
    ($query:expr, $conn:expr, $returns_rows:expr) => {
        if $returns_rows {
            let rows = $query.fetch_all(&mut *$conn).await?;
            $crate::db::sqlx_adapter::Outcome::from_rows(&rows)?
        } else {
            let done = $query.execute(&mut *$conn).await?;
            $crate::db::sqlx_adapter::Outcome::Affected(done.rows_affected())
        }
    };
}

pub(crate) use fetch_or_execute;
pub(crate) use impl_conn_dispatch;
