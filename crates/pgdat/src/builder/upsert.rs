//! UPSERT: update matching rows, insert when none matched.

use super::clauses::Clauses;
use super::insert::write_returning;
use super::traits::{Builder, ExecOptions};
use super::values::{ColumnSpec, RowSource, row_sql};
use crate::buf::{SqlBuf, write_ident, write_ident_list};
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::row::{Record, RecordRow};
use crate::value::{IntoArgs, Value};

/// ```text
/// WITH upd AS (UPDATE "<table>" SET c1 = $1, ... WHERE (...) RETURNING <returning>),
///      ins AS (INSERT INTO "<table>"(<cols>) SELECT $1, ...
///              WHERE NOT EXISTS (SELECT 1 FROM upd) RETURNING <returning>)
/// SELECT * FROM ins UNION ALL SELECT * FROM upd
/// ```
///
/// A WHERE clause is required.
#[derive(Clone, Debug)]
pub struct UpsertBuilder {
    spec: ColumnSpec,
    row: Option<RowSource>,
    returning: Vec<String>,
    pub(crate) clauses: Clauses,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start an UPSERT on `table`.
pub fn upsert(table: impl Into<String>) -> UpsertBuilder {
    UpsertBuilder {
        spec: ColumnSpec::default(),
        row: None,
        returning: Vec::new(),
        clauses: Clauses::new(table),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl UpsertBuilder {
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.spec.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn blacklist<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.spec.blacklist.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn values(mut self, values: impl IntoArgs) -> Self {
        self.set_row(RowSource::Values(values.into_args()));
        self
    }

    pub fn record<R: Record>(mut self, record: &R) -> Self {
        self.set_row(RowSource::Record(RecordRow::capture(record)));
        self
    }

    fn set_row(&mut self, row: RowSource) {
        if self.row.is_some() {
            self.clauses.fail(BuildError::PairSingleRow);
            return;
        }
        self.row = Some(row);
    }

    /// Columns returned from either branch; defaults to the insert columns.
    pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.returning.extend(columns.into_iter().map(Into::into));
        self
    }
}

where_methods!(UpsertBuilder);
option_methods!(UpsertBuilder);

impl Builder for UpsertBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        self.clauses.require_table()?;
        if self.clauses.wheres.is_empty() && self.clauses.scope.is_none() {
            return Err(BuildError::UpsertWhereRequired);
        }
        let rows: Vec<RowSource> = self.row.iter().cloned().collect();
        let columns = self.spec.resolve(&rows)?;
        let Some(row) = &self.row else {
            return Err(BuildError::NoValues);
        };
        let values = row.values_for(&columns)?;
        let returning = if self.returning.is_empty() {
            &columns
        } else {
            &self.returning
        };

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        buf.push_str("WITH upd AS (UPDATE ");
        write_ident(&mut buf, &self.clauses.table)?;
        buf.push_str(" SET ");
        let value_sql = row_sql(&mut args, &values)?;
        for (i, (col, v)) in columns.iter().zip(&value_sql).enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            write_ident(&mut buf, col)?;
            buf.push_str(" = ");
            buf.push_str(v);
        }
        self.clauses.write_filter(&mut buf, &mut args)?;
        write_returning(&mut buf, returning, ",")?;

        buf.push_str("), ins AS (INSERT INTO ");
        write_ident(&mut buf, &self.clauses.table)?;
        buf.push('(');
        write_ident_list(&mut buf, &columns, ",")?;
        buf.push_str(") SELECT ");
        buf.push_str(&value_sql.join(","));
        buf.push_str(" WHERE NOT EXISTS (SELECT 1 FROM upd)");
        write_returning(&mut buf, returning, ",")?;
        buf.push_str(") SELECT * FROM ins UNION ALL SELECT * FROM upd");

        Ok((buf.finish(), args))
    }

    builder_common!();
}
