//! Trait shared by every statement builder.

use crate::error::{BuildError, DatResult};
use crate::expr::Expression;
use crate::interpolate::interpolate;
use crate::value::Value;
use std::time::Duration;

/// Read-through cache settings for one statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Cache key; empty means "hash the SQL".
    pub id: String,
    pub ttl: Duration,
    /// Skip the lookup and overwrite the entry.
    pub invalidate: bool,
}

/// Per-statement execution settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOptions {
    pub timeout: Option<Duration>,
    pub cache: Option<CacheOptions>,
}

/// A statement builder.
///
/// `build` produces SQL with absolute `$1..$N` placeholders and the matching
/// argument vector; the highest `$N` always equals the vector's length.
pub trait Builder {
    /// Render the statement, or return the first error recorded by the chain.
    fn build(&self) -> Result<(String, Vec<Value>), BuildError>;

    /// Render for use inside another statement.
    fn build_nested(&self) -> Result<(String, Vec<Value>), BuildError> {
        self.build()
    }

    /// Whether [`Builder::interpolate`] returns literal SQL.
    fn is_interpolated(&self) -> bool;

    fn exec_options(&self) -> &ExecOptions;

    /// SQL with placeholders plus arguments.
    fn to_sql(&self) -> DatResult<(String, Vec<Value>)> {
        Ok(self.build()?)
    }

    /// Literal SQL plus remainder arguments when interpolation is on for this
    /// builder; identical to [`Builder::to_sql`] otherwise.
    fn interpolate(&self) -> DatResult<(String, Vec<Value>)> {
        let (sql, args) = self.to_sql()?;
        if !self.is_interpolated() {
            return Ok((sql, args));
        }
        interpolate(&sql, &args)
    }

    /// Turn the statement into an [`Expression`] so it can be used as a value.
    fn into_expr(self) -> DatResult<Expression>
    where
        Self: Sized,
    {
        let interpolated = self.is_interpolated();
        let (sql, args) = self.build_nested()?;
        Ok(Expression::new(sql, args).interpolated(interpolated))
    }
}
