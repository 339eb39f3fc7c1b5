//! SELECT builder that returns one JSON document per row.

use super::clauses::Clauses;
use super::doc::{DocParts, ITEM_CLOSE, ITEM_OPEN};
use super::traits::{Builder, ExecOptions};
use crate::buf::SqlBuf;
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::value::Value;

/// Like [`SelectBuilder`](super::SelectBuilder), with nested sub-queries
/// projected as JSON (`many`, `vector`, `one`, `scalar`) and every row wrapped
/// in `row_to_json`.
///
/// ```ignore
/// select_doc(["b", "c"])
///     .many("f", expr("SELECT g, h FROM f WHERE id = $1", (4,)))
///     .from("a")
///     .where_sql("d = $1", (4,));
/// ```
#[derive(Clone, Debug)]
pub struct SelectDocBuilder {
    columns: Vec<String>,
    distinct: bool,
    pub(crate) clauses: Clauses,
    pub(crate) doc: DocParts,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start a document SELECT; `columns` are joined with `,`.
pub fn select_doc<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> SelectDocBuilder {
    SelectDocBuilder {
        columns: columns.into_iter().map(Into::into).collect(),
        distinct: false,
        clauses: Clauses::default(),
        doc: DocParts::default(),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl SelectDocBuilder {
    /// FROM target. Optional: a document of pure projections needs none.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.clauses.table = table.into();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    fn render(&self, parent: bool) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        if self.columns.is_empty() && self.doc.is_empty() {
            return Err(BuildError::NoColumns);
        }

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        self.clauses.write_with(&mut buf, &mut args);
        if parent {
            buf.push_str(ITEM_OPEN);
        }
        buf.push_str("SELECT ");
        if self.distinct {
            buf.push_str("DISTINCT ");
        }
        buf.push_str(&self.columns.join(","));
        self.doc
            .write_projections(&mut buf, &mut args, !self.columns.is_empty())?;
        if !self.clauses.table.trim().is_empty() {
            buf.push_str(" FROM ");
            buf.push_str(&self.clauses.table);
        }
        self.clauses.write_select_tail(&mut buf, &mut args)?;
        if parent {
            buf.push_str(ITEM_CLOSE);
        }

        Ok((buf.finish(), args))
    }
}

where_methods!(SelectDocBuilder);
paging_methods!(SelectDocBuilder);
query_methods!(SelectDocBuilder);
doc_methods!(SelectDocBuilder);
option_methods!(SelectDocBuilder);

impl Builder for SelectDocBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.render(self.doc.is_parent)
    }

    fn build_nested(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.render(false)
    }

    builder_common!();
}
