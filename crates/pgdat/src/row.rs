//! Struct mapping: rows into structs, structs into column/value lists.

use crate::error::{BuildError, DatResult};
use crate::value::Value;
use tokio_postgres::Row;

/// Trait for converting a database row into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`.
///
/// # Example
///
/// ```ignore
/// use pgdat::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     #[db(column = "user_name")]
///     name: String,
///     email: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> DatResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning DatError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> DatResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> DatResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| crate::error::DatError::decode(column, e.to_string()))
    }
}

/// A struct whose fields map to table columns.
///
/// Usually derived with `#[derive(Record)]`: column names come from
/// `#[db(column = "...")]` or the snake_case field name, `#[db(skip)]` drops a
/// field and `#[db(flatten)]` splices in an embedded record's columns.
pub trait Record {
    /// Column names, in field order.
    fn column_names() -> Vec<&'static str>;

    /// Field values, aligned with [`Record::column_names`].
    fn column_values(&self) -> Vec<Value>;

    /// Values for `columns`, in the order given.
    fn values_for(&self, columns: &[String]) -> Result<Vec<Value>, BuildError> {
        RecordRow::capture(self).values_for(columns)
    }
}

/// Snapshot of a record's columns and values, stored by builders.
#[derive(Clone, Debug)]
pub(crate) struct RecordRow {
    pub(crate) names: Vec<&'static str>,
    pub(crate) values: Vec<Value>,
}

impl RecordRow {
    pub(crate) fn capture<R: Record + ?Sized>(record: &R) -> Self {
        Self {
            names: R::column_names(),
            values: record.column_values(),
        }
    }

    pub(crate) fn values_for(&self, columns: &[String]) -> Result<Vec<Value>, BuildError> {
        columns
            .iter()
            .map(|col| {
                self.names
                    .iter()
                    .position(|name| name == col)
                    .and_then(|i| self.values.get(i).cloned())
                    .ok_or_else(|| BuildError::ColumnNotInRecord(col.clone()))
            })
            .collect()
    }
}
