//! Clause state shared by the SELECT-shaped builders, UPDATE and DELETE.

use crate::error::BuildError;
use crate::fragment::{
    Fragment, Join, SubInfo, write_for, write_group, write_having, write_joins, write_limit,
    write_offset, write_order, write_where, write_with,
};
use crate::scope::ScopeSpec;
use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub(crate) struct Clauses {
    pub(crate) table: String,
    pub(crate) withs: Vec<SubInfo>,
    pub(crate) joins: Vec<Join>,
    pub(crate) scope: Option<ScopeSpec>,
    pub(crate) wheres: Vec<Fragment>,
    pub(crate) group: Vec<String>,
    pub(crate) having: Vec<Fragment>,
    pub(crate) order: Vec<Fragment>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) for_clause: Option<String>,
    pub(crate) union: Option<(String, Vec<Value>)>,
    /// First error recorded by the fluent chain.
    pub(crate) err: Option<BuildError>,
}

impl Clauses {
    pub(crate) fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Record `err` unless an earlier error is already stored.
    pub(crate) fn fail(&mut self, err: BuildError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Unwrap `res`, recording its error.
    pub(crate) fn keep<T>(&mut self, res: Result<T, BuildError>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    pub(crate) fn check(&self) -> Result<(), BuildError> {
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn require_table(&self) -> Result<(), BuildError> {
        if self.table.trim().is_empty() {
            return Err(BuildError::NoTable);
        }
        Ok(())
    }

    pub(crate) fn write_with(&self, buf: &mut String, args: &mut Vec<Value>) {
        write_with(buf, args, &self.withs);
    }

    /// Joins, scope prefix and WHERE (the scope's WHERE tail is the last term).
    pub(crate) fn write_filter(
        &self,
        buf: &mut String,
        args: &mut Vec<Value>,
    ) -> Result<(), BuildError> {
        write_joins(buf, args, &self.joins);
        let suffix = match &self.scope {
            Some(scope) => {
                let (prefix, suffix) = scope.emit(&self.table, args)?;
                buf.push_str(&prefix);
                suffix
            }
            None => None,
        };
        write_where(buf, args, &self.wheres, suffix.as_deref())
    }

    /// GROUP BY and HAVING.
    pub(crate) fn write_grouping(
        &self,
        buf: &mut String,
        args: &mut Vec<Value>,
    ) -> Result<(), BuildError> {
        write_group(buf, &self.group);
        write_having(buf, args, &self.having)
    }

    /// ORDER BY, LIMIT and OFFSET.
    pub(crate) fn write_paging(
        &self,
        buf: &mut String,
        args: &mut Vec<Value>,
    ) -> Result<(), BuildError> {
        write_order(buf, args, &self.order)?;
        write_limit(buf, self.limit);
        write_offset(buf, self.offset);
        Ok(())
    }

    /// FOR and UNION.
    pub(crate) fn write_trailer(&self, buf: &mut String, args: &mut Vec<Value>) {
        write_for(buf, self.for_clause.as_deref());
        if let Some((sql, own)) = &self.union {
            buf.push_str(" UNION ");
            crate::fragment::write_remapped(buf, args, sql, own);
        }
    }

    /// Everything after `FROM <table>` in a SELECT.
    pub(crate) fn write_select_tail(
        &self,
        buf: &mut String,
        args: &mut Vec<Value>,
    ) -> Result<(), BuildError> {
        self.write_filter(buf, args)?;
        self.write_grouping(buf, args)?;
        self.write_paging(buf, args)?;
        self.write_trailer(buf, args);
        Ok(())
    }
}
