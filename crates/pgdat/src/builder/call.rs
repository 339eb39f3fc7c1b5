//! Stored procedure calls and raw SQL.

use super::traits::{Builder, ExecOptions};
use crate::buf::{SqlBuf, write_placeholder};
use crate::config::interpolation_enabled;
use crate::error::BuildError;
use crate::value::{IntoArgs, Value};

/// `SELECT * FROM sproc($1,$2,...)`
#[derive(Clone, Debug)]
pub struct CallBuilder {
    sproc: String,
    args: Vec<Value>,
    opts: ExecOptions,
    interpolate: bool,
}

/// Call the set-returning function `sproc` with positional `args`.
pub fn call(sproc: impl Into<String>, args: impl IntoArgs) -> CallBuilder {
    CallBuilder {
        sproc: sproc.into(),
        args: args.into_args(),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

option_methods!(CallBuilder);

impl Builder for CallBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        if self.sproc.trim().is_empty() {
            return Err(BuildError::Invalid("no procedure specified".to_string()));
        }
        let mut buf = SqlBuf::get();
        buf.push_str("SELECT * FROM ");
        buf.push_str(&self.sproc);
        buf.push('(');
        for i in 1..=self.args.len() {
            if i > 1 {
                buf.push(',');
            }
            write_placeholder(&mut buf, i);
        }
        buf.push(')');
        Ok((buf.finish(), self.args.clone()))
    }

    builder_common!();
}

/// Caller SQL passed through unchanged, so it shares the interpolation and
/// execution pipeline.
#[derive(Clone, Debug)]
pub struct RawBuilder {
    sql: String,
    args: Vec<Value>,
    opts: ExecOptions,
    interpolate: bool,
}

/// Wrap literal SQL and its arguments.
pub fn raw(sql: impl Into<String>, args: impl IntoArgs) -> RawBuilder {
    RawBuilder {
        sql: sql.into(),
        args: args.into_args(),
        opts: ExecOptions::default(),
        interpolate: interpolation_enabled(),
    }
}

option_methods!(RawBuilder);

impl Builder for RawBuilder {
    fn build(&self) -> Result<(String, Vec<Value>), BuildError> {
        Ok((self.sql.clone(), self.args.clone()))
    }

    builder_common!();
}
