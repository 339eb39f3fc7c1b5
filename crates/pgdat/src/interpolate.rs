//! Placeholder interpolation.
//!
//! [`interpolate`] turns `$N`-parameterized SQL into literal SQL by writing each
//! argument in its quoted form. Arguments that cannot (or must not) be written
//! as literals are kept as placeholders, renumbered densely, and returned as the
//! remainder argument vector.
//!
//! The scanner never parses SQL: `$` followed by a digit starts a placeholder,
//! everything else is copied through unchanged (`$$`, `$tag$` and `$foo` stay).

use crate::buf::{SqlBuf, write_int, write_literal, write_placeholder, write_uint};
use crate::config::strict_enabled;
use crate::error::{DatError, DatResult};
use crate::expr::Expression;
use crate::fragment::check_fragment;
use crate::value::{Value, validate_array, validate_list};
use chrono::SecondsFormat;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Write every supported argument as a literal.
    Literal,
    /// Only inline what the driver cannot bind: raw markers, expressions, lists.
    InlineOnly,
}

/// Interpolate `args` into `sql`, honoring the global strict flag.
///
/// Returns the literal SQL and the remainder arguments, whose placeholders are
/// numbered `$1..$m` in the returned SQL.
///
/// If any argument is (or contains) a binary blob, the statement is returned
/// unchanged with all arguments.
pub fn interpolate(sql: &str, args: &[Value]) -> DatResult<(String, Vec<Value>)> {
    interpolate_with(sql, args, strict_enabled())
}

/// [`interpolate`] with an explicit strict flag.
///
/// In strict mode the highest placeholder index must equal the argument count.
pub fn interpolate_with(
    sql: &str,
    args: &[Value],
    strict: bool,
) -> DatResult<(String, Vec<Value>)> {
    if strict {
        check_arity(sql, args.len())?;
    }
    if args.is_empty() {
        return Ok((sql.to_string(), Vec::new()));
    }
    if args.iter().any(Value::contains_bytes) {
        return Ok((sql.to_string(), args.to_vec()));
    }
    Scanner::new(args, Mode::Literal, strict).run(sql)
}

/// Inline raw markers, nested expressions and lists; keep everything else as
/// driver parameters.
///
/// Used on the execution path when interpolation is off, since none of those
/// shapes can be bound as a parameter.
pub(crate) fn expand_inline(sql: &str, args: &[Value]) -> DatResult<(String, Vec<Value>)> {
    if !args.iter().any(needs_expansion) {
        return Ok((sql.to_string(), args.to_vec()));
    }
    Scanner::new(args, Mode::InlineOnly, false).run(sql)
}

fn needs_expansion(v: &Value) -> bool {
    v.needs_inline() || matches!(v, Value::List(_))
}

/// Fail unless the highest `$N` in `sql` equals `args`.
pub(crate) fn check_arity(sql: &str, args: usize) -> DatResult<()> {
    let placeholders = max_placeholder(sql);
    if placeholders != args {
        return Err(DatError::ArgumentMismatch { placeholders, args });
    }
    Ok(())
}

/// Highest placeholder index in `sql` (0 if none).
pub(crate) fn max_placeholder(sql: &str) -> usize {
    tokens(sql)
        .filter_map(|t| match t {
            Token::Param(n) => Some(n),
            Token::Text(_) => None,
        })
        .max()
        .unwrap_or(0)
}

/// Copy `sql` into `buf`, rewriting each relative `$k` to `$k+pos-1`.
///
/// Returns the highest `k` seen so the caller can advance its counter.
pub(crate) fn remap_placeholders(buf: &mut String, sql: &str, pos: usize) -> usize {
    let offset = pos.saturating_sub(1);
    let mut max = 0;
    for token in tokens(sql) {
        match token {
            Token::Text(text) => buf.push_str(text),
            Token::Param(n) => {
                max = max.max(n);
                write_placeholder(buf, n + offset);
            }
        }
    }
    max
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Param(usize),
}

/// Split `sql` into literal text and `$n` placeholders.
///
/// Digit runs too long for `usize` stay text.
fn tokens(sql: &str) -> Tokens<'_> {
    Tokens { sql, pos: 0 }
}

struct Tokens<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    /// Next placeholder at or after `from`: `(start, end, n)`.
    fn find_param(&self, from: usize) -> Option<(usize, usize, usize)> {
        let bytes = self.sql.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            if bytes[i] == b'$' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if let Ok(n) = self.sql[i + 1..j].parse::<usize>() {
                    return Some((i, j, n));
                }
                i = j;
            } else {
                i += 1;
            }
        }
        None
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.sql.len() {
            return None;
        }
        match self.find_param(self.pos) {
            Some((start, end, n)) if start == self.pos => {
                self.pos = end;
                Some(Token::Param(n))
            }
            Some((start, _, _)) => {
                let text = &self.sql[self.pos..start];
                self.pos = start;
                Some(Token::Text(text))
            }
            None => {
                let text = &self.sql[self.pos..];
                self.pos = self.sql.len();
                Some(Token::Text(text))
            }
        }
    }
}

struct Scanner<'a> {
    args: &'a [Value],
    mode: Mode,
    strict: bool,
    /// Text already emitted for each argument, so repeated `$n` agree.
    memo: Vec<Option<String>>,
    rest: Vec<Value>,
}

impl<'a> Scanner<'a> {
    fn new(args: &'a [Value], mode: Mode, strict: bool) -> Self {
        Self {
            args,
            mode,
            strict,
            memo: vec![None; args.len()],
            rest: Vec::new(),
        }
    }

    fn run(mut self, sql: &str) -> DatResult<(String, Vec<Value>)> {
        let mut out = SqlBuf::get();
        for token in tokens(sql) {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Param(n) => self.emit(&mut out, n)?,
            }
        }
        Ok((out.finish(), self.rest))
    }

    fn emit(&mut self, out: &mut String, n: usize) -> DatResult<()> {
        let args = self.args;
        let Some(value) = n.checked_sub(1).and_then(|i| args.get(i)) else {
            return Err(DatError::ArgumentMismatch {
                placeholders: n,
                args: args.len(),
            });
        };
        if let Some(text) = &self.memo[n - 1] {
            out.push_str(text);
            return Ok(());
        }
        let mut text = String::new();
        self.write_arg(&mut text, value)?;
        out.push_str(&text);
        self.memo[n - 1] = Some(text);
        Ok(())
    }

    fn write_arg(&mut self, buf: &mut String, value: &Value) -> DatResult<()> {
        match value {
            Value::Raw(raw) => buf.push_str(raw.as_str()),
            Value::Expr(e) => self.write_expr(buf, e)?,
            Value::List(items) => write_list(buf, items)?,
            _ if self.mode == Mode::InlineOnly => self.pass(buf, value),
            Value::Null => buf.push_str("NULL"),
            Value::Bool(b) => buf.push_str(if *b { "'t'" } else { "'f'" }),
            Value::Int(i) => write_int(buf, *i),
            Value::Uint(u) => write_uint(buf, *u),
            Value::Float(f) => write_float(buf, *f),
            Value::Float32(f) => write_float(buf, *f),
            Value::Str(s) => write_literal(buf, s)?,
            Value::Array(items) => write_array(buf, items)?,
            Value::Time(t) => {
                buf.push('\'');
                buf.push_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true));
                buf.push('\'');
            }
            Value::Json(_) | Value::Bytes(_) | Value::Other(_) => self.pass(buf, value),
        }
        Ok(())
    }

    /// Keep `value` as a driver parameter under the next free index.
    fn pass(&mut self, buf: &mut String, value: &Value) {
        self.rest.push(value.clone());
        write_placeholder(buf, self.rest.len());
    }

    fn write_expr(&mut self, buf: &mut String, e: &Expression) -> DatResult<()> {
        check_fragment(e.sql(), e.args().len())?;
        let (sql, args) = if self.mode == Mode::Literal && e.is_interpolated() {
            interpolate_with(e.sql(), e.args(), self.strict)?
        } else {
            expand_inline(e.sql(), e.args())?
        };
        remap_placeholders(buf, &sql, self.rest.len() + 1);
        self.rest.extend(args);
        Ok(())
    }
}

/// Shortest round-trip form of `f` in its own width.
fn write_float<F>(buf: &mut String, f: F)
where
    F: Into<f64> + std::fmt::Display + Copy,
{
    use std::fmt::Write as _;
    let wide: f64 = f.into();
    if wide.is_nan() {
        buf.push_str("'NaN'");
    } else if wide.is_infinite() {
        buf.push_str(if wide > 0.0 { "'Infinity'" } else { "'-Infinity'" });
    } else {
        let _ = write!(buf, "{f}");
    }
}

/// Write `(v1,v2,...)` for a non-empty homogeneous list.
fn write_list(buf: &mut String, items: &[Value]) -> DatResult<()> {
    validate_list(items)?;
    buf.push('(');
    write_elements(buf, items)?;
    buf.push(')');
    Ok(())
}

/// Write `ARRAY[v1,v2,...]`, or an untyped `'{}'` for an empty array.
fn write_array(buf: &mut String, items: &[Value]) -> DatResult<()> {
    validate_array(items)?;
    if items.is_empty() {
        buf.push_str("'{}'");
        return Ok(());
    }
    buf.push_str("ARRAY[");
    write_elements(buf, items)?;
    buf.push(']');
    Ok(())
}

fn write_elements(buf: &mut String, items: &[Value]) -> DatResult<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        match item {
            Value::Int(v) => write_int(buf, *v),
            Value::Uint(v) => write_uint(buf, *v),
            Value::Str(s) => write_literal(buf, s)?,
            other => {
                return Err(DatError::InvalidSliceValue(format!(
                    "unsupported element type {}",
                    other.kind()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::expr;
    use crate::value::{Array, DEFAULT, Json, NOW};
    use chrono::{TimeZone, Utc};

    fn interp(sql: &str, args: Vec<Value>) -> (String, Vec<Value>) {
        interpolate_with(sql, &args, false).unwrap()
    }

    #[test]
    fn quotes_strings() {
        let (sql, rest) = interp(
            "SELECT * FROM x WHERE a = $1 AND b = $2",
            vec!["hello".into(), r#""pg's world""#.into()],
        );
        assert_eq!(sql, r#"SELECT * FROM x WHERE a = 'hello' AND b = '"pg''s world"'"#);
        assert!(rest.is_empty());
    }

    #[test]
    fn scalars() {
        let (sql, _) = interp(
            "$1,$2,$3,$4,$5,$6",
            vec![
                Value::Null,
                true.into(),
                false.into(),
                (-3_i32).into(),
                7_u64.into(),
                1.5_f64.into(),
            ],
        );
        assert_eq!(sql, "NULL,'t','f',-3,7,1.5");
    }

    #[test]
    fn f32_keeps_its_shortest_form() {
        let (sql, _) = interp("$1 $2 $3", vec![1.1_f32.into(), 0.1_f32.into(), f32::INFINITY.into()]);
        assert_eq!(sql, "1.1 0.1 'Infinity'");
    }

    #[test]
    fn special_floats() {
        let (sql, _) = interp("$1 $2", vec![f64::NAN.into(), f64::NEG_INFINITY.into()]);
        assert_eq!(sql, "'NaN' '-Infinity'");
    }

    #[test]
    fn raw_markers() {
        let (sql, _) = interp("VALUES ($1, $2)", vec![DEFAULT.into(), NOW.into()]);
        assert_eq!(sql, "VALUES (DEFAULT, NOW())");
    }

    #[test]
    fn timestamps_are_quoted_rfc3339() {
        let t = Utc.with_ymd_and_hms(2016, 1, 2, 15, 4, 5).unwrap();
        let (sql, _) = interp("t = $1", vec![t.into()]);
        assert_eq!(sql, "t = '2016-01-02T15:04:05Z'");
    }

    #[test]
    fn dollar_text_is_left_alone() {
        let (sql, _) = interp("SELECT $$a$$, $foo, $ , $1", vec![1.into()]);
        assert_eq!(sql, "SELECT $$a$$, $foo, $ , 1");
    }

    #[test]
    fn lists_expand() {
        let (sql, _) = interp(
            "a IN $1 AND b IN $2",
            vec![vec![1_i64, 2, 3].into(), vec!["x", "y"].into()],
        );
        assert_eq!(sql, "a IN (1,2,3) AND b IN ('x','y')");
    }

    #[test]
    fn arrays_inline_as_array_literals() {
        let (sql, rest) = interp(
            "a = ANY($1) AND b = ANY($2) AND c = $3",
            vec![
                Array::new([1_i64, 2]).into(),
                Array::new(["x", "y'z"]).into(),
                Value::Array(Vec::new()),
            ],
        );
        assert_eq!(sql, "a = ANY(ARRAY[1,2]) AND b = ANY(ARRAY['x','y''z']) AND c = '{}'");
        assert!(rest.is_empty());
    }

    #[test]
    fn arrays_stay_bound_when_not_interpolating() {
        let args = vec![Value::from(vec![1_i64, 2]), Array::new([3_i64, 4]).into()];
        let (sql, rest) = expand_inline("a IN $1 AND b = ANY($2)", &args).unwrap();
        assert_eq!(sql, "a IN (1,2) AND b = ANY($1)");
        assert_eq!(rest.len(), 1);
        assert!(matches!(&rest[0], Value::Array(items) if items.len() == 2));
    }

    #[test]
    fn empty_list_fails() {
        let err = interpolate_with("a IN $1", &[Value::List(vec![])], false).unwrap_err();
        assert!(matches!(err, DatError::InvalidSliceLength));
    }

    #[test]
    fn bad_list_element_fails() {
        let err =
            interpolate_with("a IN $1", &[Value::List(vec![Value::Bool(true)])], false).unwrap_err();
        assert!(matches!(err, DatError::InvalidSliceValue(_)));
    }

    #[test]
    fn blobs_short_circuit() {
        let args = vec![Value::from(1), Value::from(vec![0_u8, 1])];
        let (sql, rest) = interpolate_with("a = $1 AND b = $2", &args, false).unwrap();
        assert_eq!(sql, "a = $1 AND b = $2");
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn json_passes_through_renumbered() {
        let (sql, rest) = interp(
            "a = $1 AND b = $2",
            vec![5.into(), Json::new(r#"{"k":1}"#).into()],
        );
        assert_eq!(sql, "a = 5 AND b = $1");
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0], Value::Json(_)));
    }

    #[test]
    fn repeated_pass_through_keeps_index() {
        let (sql, rest) = interp("a = $1 OR b = $1", vec![Json::new("1").into()]);
        assert_eq!(sql, "a = $1 OR b = $1");
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn interpolated_expression_is_inlined() {
        let e = expr("y + $1", (2,)).interpolated(true);
        let (sql, rest) = interp("x = $1 AND z = $2", vec![e.into(), "q".into()]);
        assert_eq!(sql, "x = y + 2 AND z = 'q'");
        assert!(rest.is_empty());
    }

    #[test]
    fn plain_expression_keeps_its_params() {
        let e = expr("SELECT id FROM t WHERE x = $1", (3,)).interpolated(false);
        let (sql, rest) = interp("a = $1 AND b IN ($2)", vec![1.into(), e.into()]);
        assert_eq!(sql, "a = 1 AND b IN (SELECT id FROM t WHERE x = $1)");
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0], Value::Int(3)));
    }

    #[test]
    fn long_literal_is_not_rescanned() {
        let s = format!("{}$1", "x".repeat(70));
        let (sql, _) = interp("a = $1", vec![s.clone().into()]);
        assert!(sql.contains(&s));
        assert!(!sql.contains('\''));
    }

    #[test]
    fn strict_rejects_mismatch() {
        let err = interpolate_with("a = $1 AND b = $2", &[Value::from(1)], true).unwrap_err();
        assert!(matches!(
            err,
            DatError::ArgumentMismatch {
                placeholders: 2,
                args: 1
            }
        ));
        assert!(interpolate_with("SELECT 1", &[Value::from(1)], true).is_err());
        assert!(interpolate_with("SELECT 1", &[], true).is_ok());
    }

    #[test]
    fn out_of_range_placeholder_fails() {
        let err = interpolate_with("a = $2", &[Value::from(1)], false).unwrap_err();
        assert!(matches!(err, DatError::ArgumentMismatch { .. }));
        assert!(interpolate_with("a = $0", &[Value::from(1)], false).is_err());
    }

    #[test]
    fn expand_inline_only_touches_unbindable_values() {
        let (sql, rest) = expand_inline(
            "a = $1 AND b = $2 AND c IN $3 AND d = $4",
            &[
                1.into(),
                NOW.into(),
                vec![1_i64, 2].into(),
                "x".into(),
            ],
        )
        .unwrap();
        assert_eq!(sql, "a = $1 AND b = NOW() AND c IN (1,2) AND d = $2");
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn expand_inline_is_identity_without_markers() {
        let args = vec![Value::from(1), Value::from("a")];
        let (sql, rest) = expand_inline("a = $1 AND b = $2", &args).unwrap();
        assert_eq!(sql, "a = $1 AND b = $2");
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn remap_offsets_placeholders() {
        let mut buf = String::from("x ");
        let max = remap_placeholders(&mut buf, "a = $1 AND b = $2 AND c = $1", 3);
        assert_eq!(buf, "x a = $3 AND b = $4 AND c = $3");
        assert_eq!(max, 2);
    }

    #[test]
    fn tokens_split_text_and_params() {
        let toks: Vec<Token<'_>> = tokens("a=$1,$$,$22").collect();
        assert_eq!(
            toks,
            vec![
                Token::Text("a="),
                Token::Param(1),
                Token::Text(",$$,"),
                Token::Param(22)
            ]
        );
    }

    #[test]
    fn max_placeholder_counts_highest() {
        assert_eq!(max_placeholder("SELECT 1"), 0);
        assert_eq!(max_placeholder("$2 $10 $3"), 10);
        assert_eq!(max_placeholder("$$ $a"), 0);
    }
}
