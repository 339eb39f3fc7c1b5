//! Anything that can stand in for a sub-select.

use crate::builder::Builder;
use crate::error::BuildError;
use crate::expr::Expression;
use crate::fragment::check_fragment;
use crate::value::Value;

/// Conversion into `(sql, args)` for use as a CTE body, join target, union
/// member or JSON projection.
///
/// Implemented for literal SQL (`&str`, `String`), [`Expression`] (SQL with
/// arguments) and every [`Builder`]. Document builders render without their
/// outer `row_to_json` wrapper when nested.
pub trait IntoSubquery {
    fn into_subquery(self) -> Result<(String, Vec<Value>), BuildError>;
}

impl IntoSubquery for &str {
    fn into_subquery(self) -> Result<(String, Vec<Value>), BuildError> {
        check_fragment(self, 0)?;
        Ok((self.to_string(), Vec::new()))
    }
}

impl IntoSubquery for String {
    fn into_subquery(self) -> Result<(String, Vec<Value>), BuildError> {
        check_fragment(&self, 0)?;
        Ok((self, Vec::new()))
    }
}

impl IntoSubquery for Expression {
    fn into_subquery(self) -> Result<(String, Vec<Value>), BuildError> {
        check_fragment(self.sql(), self.args().len())?;
        Ok(self.into_parts())
    }
}

impl<B: Builder> IntoSubquery for B {
    fn into_subquery(self) -> Result<(String, Vec<Value>), BuildError> {
        self.build_nested()
    }
}
