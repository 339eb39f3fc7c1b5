//! INSERT builder.

use super::traits::{Builder, ExecOptions};
use super::values::{ColumnSpec, RowSource, row_sql};
use crate::buf::{SqlBuf, write_ident, write_returning_item};
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::row::{Record, RecordRow};
use crate::value::{IntoArgs, Value};

#[derive(Clone, Debug)]
enum OnConflict {
    /// ` ON CONFLICT <target> <action>`
    Raw { target: String, action: String },
    /// `DO UPDATE SET c = EXCLUDED.c` for the listed columns (`*` = all).
    Update { target: String, columns: Vec<String> },
    /// `DO UPDATE SET` for every insert column except the listed ones.
    UpdateExclude { target: String, exclude: Vec<String> },
}

/// `INSERT INTO table (c1,c2) VALUES (...),(...) [ON CONFLICT ...] [RETURNING ...]`
#[derive(Clone, Debug)]
pub struct InsertBuilder {
    table: String,
    spec: ColumnSpec,
    rows: Vec<RowSource>,
    on_conflict: Option<OnConflict>,
    returning: Vec<String>,
    err: Option<BuildError>,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start an INSERT into `table` (written verbatim).
pub fn insert_into(table: impl Into<String>) -> InsertBuilder {
    InsertBuilder {
        table: table.into(),
        spec: ColumnSpec::default(),
        rows: Vec::new(),
        on_conflict: None,
        returning: Vec::new(),
        err: None,
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl InsertBuilder {
    fn fail(&mut self, err: BuildError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Insert columns. `["*"]` means every column of the record passed to
    /// [`InsertBuilder::record`].
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.spec.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Insert every record column except these.
    pub fn blacklist<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.spec.blacklist.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add a row of values, aligned with the columns.
    pub fn values(mut self, values: impl IntoArgs) -> Self {
        self.rows.push(RowSource::Values(values.into_args()));
        self
    }

    /// Add a row taken from a record.
    pub fn record<R: Record>(mut self, record: &R) -> Self {
        self.rows.push(RowSource::Record(RecordRow::capture(record)));
        self
    }

    /// Append a column and its value to a single-row insert.
    pub fn pair(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        if self.rows.len() > 1 {
            self.fail(BuildError::PairSingleRow);
            return self;
        }
        match self.rows.first_mut() {
            None => self.rows.push(RowSource::Values(vec![value.into()])),
            Some(RowSource::Values(values)) => values.push(value.into()),
            Some(RowSource::Record(_)) => {
                self.fail(BuildError::Invalid(
                    "pair cannot be combined with record".to_string(),
                ));
                return self;
            }
        }
        self.spec.columns.push(column.into());
        self
    }

    /// ` ON CONFLICT <target> <action>`, e.g. `("(id)", "DO NOTHING")`.
    pub fn on_conflict(mut self, target: impl Into<String>, action: impl Into<String>) -> Self {
        self.on_conflict = Some(OnConflict::Raw {
            target: target.into(),
            action: action.into(),
        });
        self
    }

    /// ` ON CONFLICT <target> DO UPDATE SET c = EXCLUDED.c, ...`.
    ///
    /// `["*"]` updates every insert column. Each column must be an insert column.
    pub fn on_conflict_update<S: Into<String>>(
        mut self,
        target: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.on_conflict = Some(OnConflict::Update {
            target: target.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Like [`InsertBuilder::on_conflict_update`] for every insert column except
    /// `exclude`.
    pub fn on_conflict_update_exclude<S: Into<String>>(
        mut self,
        target: impl Into<String>,
        exclude: impl IntoIterator<Item = S>,
    ) -> Self {
        self.on_conflict = Some(OnConflict::UpdateExclude {
            target: target.into(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// ` RETURNING ...`; plain identifiers are quoted.
    pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.returning.extend(columns.into_iter().map(Into::into));
        self
    }

    fn write_on_conflict(&self, buf: &mut String, columns: &[String]) -> Result<(), BuildError> {
        let Some(clause) = &self.on_conflict else {
            return Ok(());
        };
        let (target, update) = match clause {
            OnConflict::Raw { target, action } => {
                buf.push_str(" ON CONFLICT ");
                buf.push_str(target);
                buf.push(' ');
                buf.push_str(action);
                return Ok(());
            }
            OnConflict::Update { target, columns: cols } if cols.len() == 1 && cols[0] == "*" => {
                (target, columns.to_vec())
            }
            OnConflict::Update { target, columns: cols } => {
                if let Some(bad) = cols.iter().find(|c| !columns.contains(c)) {
                    return Err(BuildError::ColumnNotInInsert(bad.clone()));
                }
                (target, cols.clone())
            }
            OnConflict::UpdateExclude { target, exclude } => {
                if let Some(bad) = exclude.iter().find(|c| !columns.contains(c)) {
                    return Err(BuildError::ColumnNotInInsert(bad.clone()));
                }
                let update = columns
                    .iter()
                    .filter(|c| !exclude.contains(c))
                    .cloned()
                    .collect();
                (target, update)
            }
        };
        if update.is_empty() {
            return Err(BuildError::NoColumns);
        }

        buf.push_str(" ON CONFLICT ");
        buf.push_str(target);
        buf.push_str(" DO UPDATE SET ");
        for (i, col) in update.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            write_ident(buf, col)?;
            buf.push_str(" = EXCLUDED.");
            write_ident(buf, col)?;
        }
        Ok(())
    }
}

option_methods!(InsertBuilder);

/// ` RETURNING a, b` with plain identifiers quoted.
pub(crate) fn write_returning(
    buf: &mut String,
    returning: &[String],
    sep: &str,
) -> Result<(), BuildError> {
    if returning.is_empty() {
        return Ok(());
    }
    buf.push_str(" RETURNING ");
    for (i, item) in returning.iter().enumerate() {
        if i > 0 {
            buf.push_str(sep);
        }
        write_returning_item(buf, item)?;
    }
    Ok(())
}

impl Builder for InsertBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        if self.table.trim().is_empty() {
            return Err(BuildError::NoTable);
        }
        let columns = self.spec.resolve(&self.rows)?;
        if self.rows.is_empty() {
            return Err(BuildError::NoValues);
        }

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        buf.push_str("INSERT INTO ");
        buf.push_str(&self.table);
        buf.push_str(" (");
        buf.push_str(&columns.join(","));
        buf.push_str(") VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                buf.push(',');
            }
            let values = row.values_for(&columns)?;
            buf.push('(');
            buf.push_str(&row_sql(&mut args, &values)?.join(","));
            buf.push(')');
        }
        self.write_on_conflict(&mut buf, &columns)?;
        write_returning(&mut buf, &self.returning, ", ")?;

        Ok((buf.finish(), args))
    }

    builder_common!();
}
