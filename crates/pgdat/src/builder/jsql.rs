//! Document builder over caller-written SQL.

use super::clauses::Clauses;
use super::doc::{DocParts, ITEM_CLOSE, ITEM_OPEN};
use super::traits::{Builder, ExecOptions};
use crate::buf::SqlBuf;
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::fragment::{SubInfo, check_fragment, write_remapped};
use crate::subquery::IntoSubquery;
use crate::value::{IntoArgs, Value};

/// Wraps an arbitrary SELECT so every row comes back as JSON, optionally
/// adding `many`/`vector`/`one`/`scalar` projections next to its columns.
#[derive(Clone, Debug)]
pub struct JsqlBuilder {
    sql: String,
    args: Vec<Value>,
    pub(crate) clauses: Clauses,
    pub(crate) doc: DocParts,
    opts: ExecOptions,
    interpolate: bool,
}

/// Start a document query from `sql` with relative placeholders.
pub fn jsql(sql: impl Into<String>, args: impl IntoArgs) -> JsqlBuilder {
    let sql = sql.into();
    let args = args.into_args();
    let mut clauses = Clauses::default();
    if let Err(e) = check_fragment(&sql, args.len()) {
        clauses.fail(e);
    }
    JsqlBuilder {
        sql,
        args,
        clauses,
        doc: DocParts::default(),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

impl JsqlBuilder {
    /// Add a CTE: `WITH alias AS (sub)`.
    pub fn with(mut self, alias: &str, sub: impl IntoSubquery) -> Self {
        let sub = sub.into_subquery();
        if let Some(sub) = self.clauses.keep(sub) {
            self.clauses.withs.push(SubInfo::new(alias, sub));
        }
        self
    }

    fn render(&self, parent: bool) -> Result<(String, Vec<Value>), BuildError> {
        self.clauses.check()?;
        if self.sql.trim().is_empty() {
            return Err(BuildError::Invalid("empty SQL".to_string()));
        }

        let mut buf = SqlBuf::get();
        let mut args = Vec::new();

        self.clauses.write_with(&mut buf, &mut args);
        if parent {
            buf.push_str(ITEM_OPEN);
        }
        if self.doc.is_empty() {
            write_remapped(&mut buf, &mut args, &self.sql, &self.args);
        } else {
            buf.push_str("SELECT dat__base.*");
            self.doc.write_projections(&mut buf, &mut args, true)?;
            buf.push_str(" FROM (");
            write_remapped(&mut buf, &mut args, &self.sql, &self.args);
            buf.push_str(") AS dat__base");
        }
        if parent {
            buf.push_str(ITEM_CLOSE);
        }

        Ok((buf.finish(), args))
    }
}

doc_methods!(JsqlBuilder);
option_methods!(JsqlBuilder);

impl Builder for JsqlBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.render(self.doc.is_parent)
    }

    fn build_nested(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.render(false)
    }

    builder_common!();
}
