//! Nested SQL expressions.
//!
//! An [`Expression`] is a SQL snippet with relative `$1..$k` placeholders and
//! its own arguments. It can be passed anywhere a value is accepted; emitters
//! and the interpolator splice its SQL in and renumber its placeholders.

use crate::config::interpolation_enabled;
use crate::value::{IntoArgs, Value};

/// SQL text plus the arguments its placeholders refer to.
#[derive(Clone, Debug)]
pub struct Expression {
    sql: String,
    args: Vec<Value>,
    interpolate: bool,
}

impl Expression {
    /// Create an expression; it inherits the current interpolation setting.
    pub fn new(sql: impl Into<String>, args: impl IntoArgs) -> Self {
        Self {
            sql: sql.into(),
            args: args.into_args(),
            interpolate: interpolation_enabled(),
        }
    }

    /// Whether the interpolator inlines this expression's arguments as literals.
    pub fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    /// Override the interpolation flag.
    pub fn interpolated(mut self, enabled: bool) -> Self {
        self.interpolate = enabled;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

/// Shorthand for [`Expression::new`].
///
/// ```ignore
/// let e = pgdat::expr("price * $1", (1.1,));
/// pgdat::update("items").set("price", e).where_sql("id = $1", (7,));
/// ```
pub fn expr(sql: impl Into<String>, args: impl IntoArgs) -> Expression {
    Expression::new(sql, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_parts() {
        let e = expr("a = $1 AND b = $2", (1, "x")).interpolated(true);
        assert_eq!(e.sql(), "a = $1 AND b = $2");
        assert_eq!(e.args().len(), 2);
        assert!(e.is_interpolated());
        let (sql, args) = e.into_parts();
        assert_eq!(sql, "a = $1 AND b = $2");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn expression_into_value() {
        let v = Value::from(expr("NOW() - $1::interval", ("1 day",)));
        assert!(matches!(v, Value::Expr(_)));
        assert!(v.needs_inline());
    }
}
