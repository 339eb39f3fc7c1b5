//! DELETE builder.

use super::clauses::Clauses;
use super::insert::write_returning;
use super::traits::{Builder, ExecOptions};
use crate::buf::{SqlBuf, write_ident};
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::value::Value;

/// `DELETE FROM "table" [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET n]
/// [RETURNING ...]`
#[derive(Clone, Debug)]
pub struct DeleteBuilder {
    returning: Vec<String>,
    pub(crate) clauses: Clauses,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start a DELETE from `table` (quoted on output).
pub fn delete_from(table: impl Into<String>) -> DeleteBuilder {
    DeleteBuilder {
        returning: Vec::new(),
        clauses: Clauses::new(table),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl DeleteBuilder {
    /// ` RETURNING ...`; plain identifiers are quoted.
    pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.returning.extend(columns.into_iter().map(Into::into));
        self
    }
}

where_methods!(DeleteBuilder);
paging_methods!(DeleteBuilder);
option_methods!(DeleteBuilder);

impl Builder for DeleteBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        self.clauses.require_table()?;

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        self.clauses.write_with(&mut buf, &mut args);
        buf.push_str("DELETE FROM ");
        write_ident(&mut buf, &self.clauses.table)?;
        self.clauses.write_filter(&mut buf, &mut args)?;
        self.clauses.write_paging(&mut buf, &mut args)?;
        write_returning(&mut buf, &self.returning, ", ")?;

        Ok((buf.finish(), args))
    }

    builder_common!();
}
