//! Column and row handling shared by INSERT, INSECT, UPSERT and UPDATE.

use crate::buf::write_placeholder;
use crate::error::BuildError;
use crate::fragment::{check_fragment, write_remapped};
use crate::row::RecordRow;
use crate::value::Value;

/// One VALUES row.
#[derive(Clone, Debug)]
pub(crate) enum RowSource {
    Values(Vec<Value>),
    Record(RecordRow),
}

impl RowSource {
    pub(crate) fn values_for(&self, columns: &[String]) -> Result<Vec<Value>, BuildError> {
        match self {
            RowSource::Values(values) if values.len() == columns.len() => Ok(values.clone()),
            RowSource::Values(values) => Err(BuildError::Invalid(format!(
                "row has {} value(s) but {} column(s)",
                values.len(),
                columns.len()
            ))),
            RowSource::Record(record) => record.values_for(columns),
        }
    }
}

/// Column selection: explicit names, `*` (all record columns) and/or a blacklist.
#[derive(Clone, Debug, Default)]
pub(crate) struct ColumnSpec {
    pub(crate) columns: Vec<String>,
    pub(crate) blacklist: Vec<String>,
}

impl ColumnSpec {
    /// Resolve against the first record row (if any).
    pub(crate) fn resolve(&self, rows: &[RowSource]) -> Result<Vec<String>, BuildError> {
        let record = rows.iter().find_map(|r| match r {
            RowSource::Record(rec) => Some(rec),
            RowSource::Values(_) => None,
        });

        if !self.blacklist.is_empty() {
            let record = record.ok_or(BuildError::BlacklistRequiresRecord)?;
            return Ok(record
                .names
                .iter()
                .filter(|name| !self.blacklist.iter().any(|b| b == *name))
                .map(|name| name.to_string())
                .collect());
        }

        if self.columns.len() == 1 && self.columns[0] == "*" {
            let record = record.ok_or(BuildError::StarRequiresRecord)?;
            return Ok(record.names.iter().map(|n| n.to_string()).collect());
        }

        if self.columns.is_empty() {
            return Err(BuildError::NoColumns);
        }
        Ok(self.columns.clone())
    }
}

/// Render `value` as SQL text: raw markers verbatim, expressions remapped,
/// everything else as the next placeholder.
pub(crate) fn value_sql(args: &mut Vec<Value>, value: &Value) -> Result<String, BuildError> {
    let mut out = String::new();
    match value {
        Value::Raw(raw) => out.push_str(raw.as_str()),
        Value::Expr(e) => {
            check_fragment(e.sql(), e.args().len())?;
            write_remapped(&mut out, args, e.sql(), e.args());
        }
        other => {
            args.push(other.clone());
            write_placeholder(&mut out, args.len());
        }
    }
    Ok(out)
}

/// Render a whole row with [`value_sql`].
pub(crate) fn row_sql(args: &mut Vec<Value>, values: &[Value]) -> Result<Vec<String>, BuildError> {
    values.iter().map(|v| value_sql(args, v)).collect()
}
