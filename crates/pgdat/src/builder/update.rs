//! UPDATE builder.

use super::clauses::Clauses;
use super::insert::write_returning;
use super::traits::{Builder, ExecOptions};
use super::values::value_sql;
use crate::buf::{SqlBuf, write_ident};
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::row::{Record, RecordRow};
use crate::value::Value;

/// `UPDATE "table" SET "c1" = $1, ... [WHERE ...] [ORDER BY ...] [LIMIT n]
/// [OFFSET n] [RETURNING ...]`
#[derive(Clone, Debug)]
pub struct UpdateBuilder {
    sets: Vec<(String, Value)>,
    returning: Vec<String>,
    pub(crate) clauses: Clauses,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start an UPDATE of `table` (quoted on output).
pub fn update(table: impl Into<String>) -> UpdateBuilder {
    UpdateBuilder {
        sets: Vec::new(),
        returning: Vec::new(),
        clauses: Clauses::new(table),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl UpdateBuilder {
    /// `"column" = value`. Expressions and raw markers are inlined.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Several `set` calls from `(column, value)` pairs, in iteration order.
    pub fn set_map<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.sets
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the listed record columns (`["*"]` = all of them).
    pub fn set_whitelist<R: Record, S: Into<String>>(
        mut self,
        record: &R,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        let row = RecordRow::capture(record);
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() == 1 && columns[0] == "*" {
            columns = row.names.iter().map(|n| n.to_string()).collect();
        }
        let values = row.values_for(&columns);
        if let Some(values) = self.clauses.keep(values) {
            self.sets.extend(columns.into_iter().zip(values));
        }
        self
    }

    /// Set every record column except the listed ones.
    pub fn set_blacklist<R: Record, S: Into<String>>(
        mut self,
        record: &R,
        exclude: impl IntoIterator<Item = S>,
    ) -> Self {
        let row = RecordRow::capture(record);
        let exclude: Vec<String> = exclude.into_iter().map(Into::into).collect();
        for (name, value) in row.names.iter().zip(row.values) {
            if !exclude.iter().any(|e| e == name) {
                self.sets.push((name.to_string(), value));
            }
        }
        self
    }

    /// ` RETURNING ...`; plain identifiers are quoted.
    pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.returning.extend(columns.into_iter().map(Into::into));
        self
    }
}

where_methods!(UpdateBuilder);
paging_methods!(UpdateBuilder);
option_methods!(UpdateBuilder);

impl Builder for UpdateBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        self.clauses.require_table()?;
        if self.sets.is_empty() {
            return Err(BuildError::NoColumns);
        }

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        self.clauses.write_with(&mut buf, &mut args);
        buf.push_str("UPDATE ");
        write_ident(&mut buf, &self.clauses.table)?;
        buf.push_str(" SET ");
        for (i, (col, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            write_ident(&mut buf, col)?;
            buf.push_str(" = ");
            let sql = value_sql(&mut args, value)?;
            buf.push_str(&sql);
        }
        self.clauses.write_filter(&mut buf, &mut args)?;
        self.clauses.write_paging(&mut buf, &mut args)?;
        write_returning(&mut buf, &self.returning, ", ")?;

        Ok((buf.finish(), args))
    }

    builder_common!();
}
