//! Reusable predicate/join fragments.
//!
//! A scope is attached to a builder in place of (or next to) its own WHERE
//! terms. Its text may begin with joins and end with a `WHERE ...` tail; the
//! tail becomes one more AND term of the builder's WHERE clause.

use crate::buf::{write_ident, write_placeholder};
use crate::error::BuildError;
use crate::fragment::check_fragment;
use crate::interpolate::remap_placeholders;
use crate::value::{IntoArgs, Value};
use std::collections::BTreeMap;

/// SQL with `:name` parameters and default field values.
///
/// `:TABLE` is replaced by the quoted table name of the builder the scope is
/// applied to. `::` casts are left alone.
///
/// ```ignore
/// let recent = NamedScope::new("WHERE :TABLE.created_at > :since AND kind = :kind")
///     .field("since", since)
///     .field("kind", "post");
/// select(["*"]).from("posts").scope_map(&recent, [("kind", "comment")]);
/// ```
#[derive(Clone, Debug)]
pub struct NamedScope {
    sql: String,
    fields: BTreeMap<String, Value>,
}

impl NamedScope {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a default value for `:name`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Resolve parameters against `overrides` then the defaults.
    ///
    /// Each `:name` occurrence becomes a fresh `$k`, numbered from 1.
    pub(crate) fn render(
        &self,
        table: &str,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<(String, Vec<Value>), BuildError> {
        let bytes = self.sql.as_bytes();
        let mut out = String::with_capacity(self.sql.len() + 16);
        let mut args = Vec::new();
        let mut last = 0;
        let mut i = 0;
        let mut in_string = false;

        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\'' {
                in_string = !in_string;
                i += 1;
                continue;
            }
            if in_string || b != b':' {
                i += 1;
                continue;
            }
            if bytes.get(i + 1) == Some(&b':') {
                i += 2;
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric()) {
                end += 1;
            }
            if end == start {
                i += 1;
                continue;
            }
            out.push_str(&self.sql[last..i]);
            let name = &self.sql[start..end];
            if name == "TABLE" {
                write_ident(&mut out, table)?;
            } else {
                let value = overrides
                    .get(name)
                    .or_else(|| self.fields.get(name))
                    .ok_or_else(|| BuildError::MissingScopeField(name.to_string()))?;
                args.push(value.clone());
                write_placeholder(&mut out, args.len());
            }
            last = end;
            i = end;
        }
        out.push_str(&self.sql[last..]);
        Ok((out, args))
    }
}

/// Literal scope SQL with positional `$k` arguments.
#[derive(Clone, Debug)]
pub struct RawScope {
    sql: String,
    args: Vec<Value>,
}

impl RawScope {
    pub fn new(sql: impl Into<String>, args: impl IntoArgs) -> Self {
        Self {
            sql: sql.into(),
            args: args.into_args(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Scope attached to a builder, resolved at emission time.
#[derive(Clone, Debug)]
pub(crate) enum ScopeSpec {
    Raw(RawScope),
    Named(NamedScope, BTreeMap<String, Value>),
}

impl ScopeSpec {
    fn resolve(&self, table: &str) -> Result<(String, Vec<Value>), BuildError> {
        match self {
            ScopeSpec::Raw(raw) => {
                check_fragment(&raw.sql, raw.args.len())?;
                Ok((raw.sql.clone(), raw.args.clone()))
            }
            ScopeSpec::Named(named, overrides) => named.render(table, overrides),
        }
    }

    /// Number the scope at the next free placeholder and split it.
    ///
    /// Returns the text to emit after the FROM/joins (with a leading space) and
    /// the WHERE tail to AND into the builder's WHERE clause.
    pub(crate) fn emit(
        &self,
        table: &str,
        args: &mut Vec<Value>,
    ) -> Result<(String, Option<String>), BuildError> {
        let (sql, own) = self.resolve(table)?;
        let mut numbered = String::with_capacity(sql.len());
        remap_placeholders(&mut numbered, &sql, args.len() + 1);
        args.extend(own);

        let (prefix, suffix) = split_where(&numbered);
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!(" {prefix}")
        };
        Ok((prefix, suffix.map(str::to_string)))
    }
}

/// Split on the first top-level `WHERE` keyword.
///
/// Keywords inside parentheses, single-quoted strings and double-quoted
/// identifiers are skipped. Both halves are trimmed.
pub fn split_where(sql: &str) -> (&str, Option<&str>) {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'w' | b'W' if depth == 0 && is_where_at(bytes, i) => {
                return (sql[..i].trim(), Some(sql[i + 5..].trim()));
            }
            _ => {}
        }
        i += 1;
    }
    (sql.trim(), None)
}

fn is_where_at(bytes: &[u8], i: usize) -> bool {
    let is_word = |b: u8| b == b'_' || b.is_ascii_alphanumeric();
    bytes.len() >= i + 5
        && bytes[i..i + 5].eq_ignore_ascii_case(b"where")
        && (i == 0 || !is_word(bytes[i - 1]))
        && bytes.get(i + 5).is_none_or(|b| !is_word(*b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_simple() {
        assert_eq!(split_where("WHERE a = 1"), ("", Some("a = 1")));
        assert_eq!(
            split_where("INNER JOIN b ON b.id = a.b_id where b.x = $1"),
            ("INNER JOIN b ON b.id = a.b_id", Some("b.x = $1"))
        );
        assert_eq!(split_where("INNER JOIN b ON true"), ("INNER JOIN b ON true", None));
    }

    #[test]
    fn split_skips_nested_and_quoted() {
        let sql = "JOIN (SELECT * FROM t WHERE x) s ON 'where' = s.nowhere WHERE s.y = 2";
        assert_eq!(
            split_where(sql),
            (
                "JOIN (SELECT * FROM t WHERE x) s ON 'where' = s.nowhere",
                Some("s.y = 2")
            )
        );
        assert_eq!(split_where(r#"JOIN "where" w ON true"#).1, None);
    }

    #[test]
    fn named_scope_renders() {
        let scope = NamedScope::new("WHERE :TABLE.kind = :kind AND n > :n AND x::int = 1 AND s = ':no'")
            .field("kind", "post")
            .field("n", 1);
        let overrides = BTreeMap::from([("n".to_string(), Value::from(5))]);
        let (sql, args) = scope.render("public.posts", &overrides).unwrap();
        assert_eq!(
            sql,
            r#"WHERE "public"."posts".kind = $1 AND n > $2 AND x::int = 1 AND s = ':no'"#
        );
        assert!(matches!(args[1], Value::Int(5)));
    }

    #[test]
    fn named_scope_missing_field() {
        let scope = NamedScope::new("WHERE a = :a");
        assert_eq!(
            scope.render("t", &BTreeMap::new()).unwrap_err(),
            BuildError::MissingScopeField("a".to_string())
        );
    }

    #[test]
    fn scope_emit_numbers_from_base() {
        let spec = ScopeSpec::Raw(RawScope::new(
            "INNER JOIN u ON u.id = t.u_id AND u.ok = $1 WHERE t.x = $2",
            (true, 3),
        ));
        let mut args = vec![Value::from(0)];
        let (prefix, suffix) = spec.emit("t", &mut args).unwrap();
        assert_eq!(prefix, " INNER JOIN u ON u.id = t.u_id AND u.ok = $2");
        assert_eq!(suffix.as_deref(), Some("t.x = $3"));
        assert_eq!(args.len(), 3);
    }
}
