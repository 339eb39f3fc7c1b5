//! SELECT builder.

use super::clauses::Clauses;
use super::traits::{Builder, ExecOptions};
use crate::buf::SqlBuf;
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::value::Value;

/// `[WITH ...] SELECT [DISTINCT [ON (...)]] cols FROM table ...`
#[derive(Clone, Debug)]
pub struct SelectBuilder {
    columns: Vec<String>,
    distinct: bool,
    distinct_on: Vec<String>,
    pub(crate) clauses: Clauses,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start a SELECT of `columns` (written verbatim, joined with `, `).
pub fn select<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> SelectBuilder {
    SelectBuilder {
        columns: columns.into_iter().map(Into::into).collect(),
        distinct: false,
        distinct_on: Vec::new(),
        clauses: Clauses::default(),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl SelectBuilder {
    /// FROM target, written verbatim (`users`, `users u`, `public.users`).
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.clauses.table = table.into();
        self
    }

    /// Append more columns.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `SELECT DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// `SELECT DISTINCT ON (c1, c2)`.
    pub fn distinct_on<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.distinct = true;
        self.distinct_on = columns.into_iter().map(Into::into).collect();
        self
    }
}

where_methods!(SelectBuilder);
paging_methods!(SelectBuilder);
query_methods!(SelectBuilder);
option_methods!(SelectBuilder);

impl Builder for SelectBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        if self.columns.is_empty() {
            return Err(BuildError::NoColumns);
        }
        self.clauses.require_table()?;

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        self.clauses.write_with(&mut buf, &mut args);
        buf.push_str("SELECT ");
        if self.distinct {
            if self.distinct_on.is_empty() {
                buf.push_str("DISTINCT ");
            } else {
                buf.push_str("DISTINCT ON (");
                buf.push_str(&self.distinct_on.join(", "));
                buf.push_str(") ");
            }
        }
        buf.push_str(&self.columns.join(", "));
        buf.push_str(" FROM ");
        buf.push_str(&self.clauses.table);
        self.clauses.write_select_tail(&mut buf, &mut args)?;

        Ok((buf.finish(), args))
    }

    builder_common!();
}
