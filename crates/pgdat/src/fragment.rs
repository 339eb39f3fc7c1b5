//! Clause fragments and their emission.
//!
//! Every `write_*` helper appends to an output buffer and to the builder's
//! argument vector. The next absolute placeholder is always `args.len() + 1`;
//! relative `$k` inside a fragment are shifted to that base.

use crate::buf::{write_eq_placeholder, write_ident, write_in_placeholder, write_uint};
use crate::error::BuildError;
use crate::expr::Expression;
use crate::interpolate::{max_placeholder, remap_placeholders};
use crate::value::Value;
use std::collections::BTreeMap;

/// A WHERE / HAVING / ORDER BY term.
#[derive(Clone, Debug)]
pub(crate) enum Fragment {
    /// Literal SQL with relative placeholders.
    Sql { sql: String, args: Vec<Value> },
    /// Column equality map, emitted in key order.
    Eq(BTreeMap<String, Value>),
    /// A nested expression or builder.
    Expr(Expression),
}

/// Fail unless the highest relative `$k` in `sql` equals `args`.
///
/// Every piece of caller SQL that is renumbered into a statement goes through
/// this, so its placeholders can never reach into a neighbour's arguments.
pub(crate) fn check_fragment(sql: &str, args: usize) -> Result<(), BuildError> {
    let placeholders = max_placeholder(sql);
    if placeholders != args {
        return Err(BuildError::FragmentArity {
            sql: sql.to_string(),
            placeholders,
            args,
        });
    }
    Ok(())
}

impl Fragment {
    /// A literal fragment; its highest `$k` must equal `args.len()`.
    pub(crate) fn sql(sql: impl Into<String>, args: Vec<Value>) -> Result<Self, BuildError> {
        let sql = sql.into();
        check_fragment(&sql, args.len())?;
        Ok(Fragment::Sql { sql, args })
    }

    /// A nested expression term, checked like a literal fragment.
    pub(crate) fn expr(e: Expression) -> Result<Self, BuildError> {
        check_fragment(e.sql(), e.args().len())?;
        Ok(Fragment::Expr(e))
    }

    pub(crate) fn eq<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Fragment::Eq(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn write(&self, buf: &mut String, args: &mut Vec<Value>) -> Result<(), BuildError> {
        match self {
            Fragment::Sql { sql, args: own } => write_remapped(buf, args, sql, own),
            Fragment::Expr(e) => write_remapped(buf, args, e.sql(), e.args()),
            Fragment::Eq(map) => {
                if map.is_empty() {
                    buf.push_str("1=1");
                }
                for (i, (col, v)) in map.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(" AND ");
                    }
                    write_eq_term(buf, args, col, v)?;
                }
            }
        }
        Ok(())
    }
}

/// Copy `sql` shifted to the next free placeholder and append its arguments.
pub(crate) fn write_remapped(buf: &mut String, args: &mut Vec<Value>, sql: &str, own: &[Value]) {
    remap_placeholders(buf, sql, args.len() + 1);
    args.extend(own.iter().cloned());
}

fn write_eq_term(
    buf: &mut String,
    args: &mut Vec<Value>,
    col: &str,
    v: &Value,
) -> Result<(), BuildError> {
    match v {
        Value::List(items) if items.is_empty() => {
            buf.push_str("(1=0)");
            return Ok(());
        }
        _ => write_ident(buf, col)?,
    }
    match v {
        Value::Null => buf.push_str(" IS NULL"),
        Value::List(items) if items.len() == 1 => {
            args.push(items[0].clone());
            write_eq_placeholder(buf, args.len());
        }
        Value::List(_) => {
            args.push(v.clone());
            write_in_placeholder(buf, args.len());
        }
        _ => {
            args.push(v.clone());
            write_eq_placeholder(buf, args.len());
        }
    }
    Ok(())
}

fn write_and_joined(
    buf: &mut String,
    args: &mut Vec<Value>,
    keyword: &str,
    fragments: &[Fragment],
    extra: Option<&str>,
) -> Result<(), BuildError> {
    if fragments.is_empty() && extra.is_none() {
        return Ok(());
    }
    buf.push_str(keyword);
    let mut first = true;
    for fragment in fragments {
        if !first {
            buf.push_str(" AND ");
        }
        first = false;
        buf.push('(');
        fragment.write(buf, args)?;
        buf.push(')');
    }
    if let Some(extra) = extra {
        if !first {
            buf.push_str(" AND ");
        }
        buf.push('(');
        buf.push_str(extra);
        buf.push(')');
    }
    Ok(())
}

/// ` WHERE (f1) AND (f2) ...`, with an already-numbered scope suffix last.
pub(crate) fn write_where(
    buf: &mut String,
    args: &mut Vec<Value>,
    fragments: &[Fragment],
    scope_suffix: Option<&str>,
) -> Result<(), BuildError> {
    write_and_joined(buf, args, " WHERE ", fragments, scope_suffix)
}

/// ` HAVING (f1) AND (f2) ...`
pub(crate) fn write_having(
    buf: &mut String,
    args: &mut Vec<Value>,
    fragments: &[Fragment],
) -> Result<(), BuildError> {
    write_and_joined(buf, args, " HAVING ", fragments, None)
}

/// ` ORDER BY f1, f2`
pub(crate) fn write_order(
    buf: &mut String,
    args: &mut Vec<Value>,
    fragments: &[Fragment],
) -> Result<(), BuildError> {
    if fragments.is_empty() {
        return Ok(());
    }
    buf.push_str(" ORDER BY ");
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        fragment.write(buf, args)?;
    }
    Ok(())
}

/// ` GROUP BY a, b`
pub(crate) fn write_group(buf: &mut String, group: &[String]) {
    if group.is_empty() {
        return;
    }
    buf.push_str(" GROUP BY ");
    buf.push_str(&group.join(", "));
}

pub(crate) fn write_limit(buf: &mut String, limit: Option<u64>) {
    if let Some(n) = limit {
        buf.push_str(" LIMIT ");
        write_uint(buf, n);
    }
}

pub(crate) fn write_offset(buf: &mut String, offset: Option<u64>) {
    if let Some(n) = offset {
        buf.push_str(" OFFSET ");
        write_uint(buf, n);
    }
}

/// ` FOR UPDATE` / ` FOR SHARE SKIP LOCKED` ...
pub(crate) fn write_for(buf: &mut String, clause: Option<&str>) {
    if let Some(clause) = clause {
        buf.push_str(" FOR ");
        buf.push_str(clause);
    }
}

// ==================== Sub-queries ====================

/// A named sub-select: CTE body, join target or JSON projection.
#[derive(Clone, Debug)]
pub(crate) struct SubInfo {
    pub(crate) alias: String,
    pub(crate) sql: String,
    pub(crate) args: Vec<Value>,
}

impl SubInfo {
    pub(crate) fn new(alias: impl Into<String>, (sql, args): (String, Vec<Value>)) -> Self {
        Self {
            alias: alias.into(),
            sql,
            args,
        }
    }

    /// Write the body shifted to the next free placeholder.
    pub(crate) fn write_body(&self, buf: &mut String, args: &mut Vec<Value>) {
        write_remapped(buf, args, &self.sql, &self.args);
    }
}

/// `WITH a AS (...), b AS (...) `
pub(crate) fn write_with(buf: &mut String, args: &mut Vec<Value>, withs: &[SubInfo]) {
    if withs.is_empty() {
        return;
    }
    buf.push_str("WITH ");
    for (i, w) in withs.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        buf.push_str(&w.alias);
        buf.push_str(" AS (");
        w.write_body(buf, args);
        buf.push(')');
    }
    buf.push(' ');
}

// ==================== Joins ====================

/// Join flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
        }
    }

    /// Parse `inner`, `left`, `left outer`, `LEFT OUTER JOIN`, ...
    pub fn parse(kind: &str) -> Result<Self, BuildError> {
        let words: Vec<String> = kind
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();
        let mut words: Vec<&str> = words.iter().map(String::as_str).collect();
        if words.last() == Some(&"join") {
            words.pop();
        }
        if words.len() == 2 && words[1] == "outer" && words[0] != "inner" {
            words.pop();
        }
        match words.as_slice() {
            ["inner"] => Ok(JoinKind::Inner),
            ["left"] => Ok(JoinKind::LeftOuter),
            ["right"] => Ok(JoinKind::RightOuter),
            ["full"] => Ok(JoinKind::FullOuter),
            _ => Err(BuildError::InvalidJoinKind(kind.to_string())),
        }
    }
}

/// ` <KIND> (<subquery>) AS <alias> ON <clause>`
#[derive(Clone, Debug)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) sub: SubInfo,
    pub(crate) on: String,
}

impl Join {
    pub(crate) fn new(kind: JoinKind, alias: &str, sub: (String, Vec<Value>), on: &str) -> Self {
        let (sql, args) = sub;
        // A bare table name becomes a sub-select so every join target is parenthesized.
        let sql = if sql.trim().contains(char::is_whitespace) {
            sql
        } else {
            format!("SELECT * FROM {}", sql.trim())
        };
        Self {
            kind,
            sub: SubInfo::new(alias, (sql, args)),
            on: on.to_string(),
        }
    }
}

pub(crate) fn write_joins(buf: &mut String, args: &mut Vec<Value>, joins: &[Join]) {
    for join in joins {
        buf.push(' ');
        buf.push_str(join.kind.as_sql());
        buf.push_str(" (");
        join.sub.write_body(buf, args);
        buf.push_str(") AS ");
        buf.push_str(&join.sub.alias);
        buf.push_str(" ON ");
        buf.push_str(&join.on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::expr;

    fn where_sql(fragments: &[Fragment]) -> (String, Vec<Value>) {
        let mut buf = String::new();
        let mut args = Vec::new();
        write_where(&mut buf, &mut args, fragments, None).unwrap();
        (buf, args)
    }

    #[test]
    fn fragment_arity_is_checked() {
        assert!(Fragment::sql("a = $1", vec![1.into()]).is_ok());
        assert!(Fragment::sql("a = 1", vec![]).is_ok());
        let err = Fragment::sql("a = $1 AND b = $2", vec![1.into()]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::FragmentArity {
                placeholders: 2,
                args: 1,
                ..
            }
        ));
    }

    #[test]
    fn where_remaps_relative_placeholders() {
        let (sql, args) = where_sql(&[
            Fragment::sql("a = $1", vec![1.into()]).unwrap(),
            Fragment::sql("b = $1 OR c = $2", vec![2.into(), 3.into()]).unwrap(),
        ]);
        assert_eq!(sql, " WHERE (a = $1) AND (b = $2 OR c = $3)");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn eq_map_predicates() {
        let (sql, args) = where_sql(&[Fragment::eq([
            ("a", Value::Null),
            ("b", Value::List(vec![])),
            ("c", Value::from(vec![5_i64])),
            ("d", Value::from(vec![1_i64, 2])),
            ("e", Value::from("x")),
            ("f", Value::from(None::<Vec<i64>>)),
        ])]);
        assert_eq!(
            sql,
            r#" WHERE ("a" IS NULL AND (1=0) AND "c" = $1 AND "d" IN $2 AND "e" = $3 AND "f" IS NULL)"#
        );
        assert_eq!(args.len(), 3);
        assert!(matches!(args[0], Value::Int(5)));
        assert!(matches!(args[1], Value::List(_)));
    }

    #[test]
    fn expression_fragment() {
        let mut args = vec![Value::from(0)];
        let mut buf = String::new();
        write_where(
            &mut buf,
            &mut args,
            &[Fragment::Expr(expr("x > $1", (9,)))],
            Some("y = $1"),
        )
        .unwrap();
        assert_eq!(buf, " WHERE (x > $2) AND (y = $1)");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn order_group_limit_offset_for() {
        let mut buf = String::new();
        let mut args = Vec::new();
        write_group(&mut buf, &["a".to_string(), "b".to_string()]);
        write_order(
            &mut buf,
            &mut args,
            &[
                Fragment::sql("a DESC", vec![]).unwrap(),
                Fragment::sql("b <-> $1", vec![1.into()]).unwrap(),
            ],
        )
        .unwrap();
        write_limit(&mut buf, Some(10));
        write_offset(&mut buf, Some(20));
        write_for(&mut buf, Some("UPDATE"));
        assert_eq!(
            buf,
            " GROUP BY a, b ORDER BY a DESC, b <-> $1 LIMIT 10 OFFSET 20 FOR UPDATE"
        );
    }

    #[test]
    fn with_clauses() {
        let mut buf = String::new();
        let mut args = Vec::new();
        write_with(
            &mut buf,
            &mut args,
            &[
                SubInfo::new("a", ("SELECT $1".to_string(), vec![1.into()])),
                SubInfo::new("b", ("SELECT $1".to_string(), vec![2.into()])),
            ],
        );
        assert_eq!(buf, "WITH a AS (SELECT $1), b AS (SELECT $2) ");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn join_kinds_parse() {
        assert_eq!(JoinKind::parse("inner").unwrap(), JoinKind::Inner);
        assert_eq!(JoinKind::parse("LEFT JOIN").unwrap(), JoinKind::LeftOuter);
        assert_eq!(JoinKind::parse("left outer").unwrap(), JoinKind::LeftOuter);
        assert_eq!(JoinKind::parse("Full Outer Join").unwrap(), JoinKind::FullOuter);
        assert!(matches!(
            JoinKind::parse("sideways"),
            Err(BuildError::InvalidJoinKind(_))
        ));
    }

    #[test]
    fn bare_table_join_becomes_subselect() {
        let mut buf = String::new();
        let mut args = Vec::new();
        write_joins(
            &mut buf,
            &mut args,
            &[
                Join::new(JoinKind::Inner, "p", ("posts".to_string(), vec![]), "p.user_id = u.id"),
                Join::new(
                    JoinKind::LeftOuter,
                    "c",
                    ("SELECT * FROM comments WHERE ok = $1".to_string(), vec![true.into()]),
                    "c.post_id = p.id",
                ),
            ],
        );
        assert_eq!(
            buf,
            " INNER JOIN (SELECT * FROM posts) AS p ON p.user_id = u.id \
             LEFT OUTER JOIN (SELECT * FROM comments WHERE ok = $1) AS c ON c.post_id = p.id"
        );
        assert_eq!(args.len(), 1);
    }
}
