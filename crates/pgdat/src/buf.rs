//! Output buffers and low-level SQL text helpers.
//!
//! - A small pool of `String` buffers shared by every emitter.
//! - Precomputed `$N`, ` = $N`, ` IN $N` and `0..=99` tables.
//! - Identifier quoting (`"schema"."table"`).
//! - String literal quoting with single quotes or a process-wide dollar tag.

use crate::error::{BuildError, DatError, DatResult};
use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};
use std::sync::{LazyLock, Mutex, RwLock};

const TABLE_SIZE: usize = 100;
const POOL_LIMIT: usize = 32;
const POOL_MAX_CAPACITY: usize = 64 * 1024;

/// Strings longer than this (in chars) are dollar-quoted.
pub(crate) const SHORT_LITERAL: usize = 64;

static PLACEHOLDERS: LazyLock<Vec<String>> =
    LazyLock::new(|| (0..TABLE_SIZE).map(|i| format!("${i}")).collect());

static EQ_PLACEHOLDERS: LazyLock<Vec<String>> =
    LazyLock::new(|| (0..TABLE_SIZE).map(|i| format!(" = ${i}")).collect());

static IN_PLACEHOLDERS: LazyLock<Vec<String>> =
    LazyLock::new(|| (0..TABLE_SIZE).map(|i| format!(" IN ${i}")).collect());

static INTS: LazyLock<Vec<String>> =
    LazyLock::new(|| (0..TABLE_SIZE).map(|i| i.to_string()).collect());

static POOL: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// A pooled output buffer. Returned to the pool on drop.
pub(crate) struct SqlBuf {
    inner: String,
}

impl SqlBuf {
    /// Take a cleared buffer from the pool (or allocate one).
    pub(crate) fn get() -> Self {
        let inner = POOL
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_else(|| String::with_capacity(256));
        Self { inner }
    }

    /// Copy the contents out; the buffer goes back to the pool.
    pub(crate) fn finish(self) -> String {
        self.inner.clone()
    }
}

impl Deref for SqlBuf {
    type Target = String;

    fn deref(&self) -> &String {
        &self.inner
    }
}

impl DerefMut for SqlBuf {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.inner
    }
}

impl Drop for SqlBuf {
    fn drop(&mut self) {
        let mut inner = std::mem::take(&mut self.inner);
        if inner.capacity() > POOL_MAX_CAPACITY {
            return;
        }
        inner.clear();
        if let Ok(mut pool) = POOL.lock()
            && pool.len() < POOL_LIMIT
        {
            pool.push(inner);
        }
    }
}

/// Write `$n`.
pub(crate) fn write_placeholder(buf: &mut String, n: usize) {
    match PLACEHOLDERS.get(n) {
        Some(s) => buf.push_str(s),
        None => {
            let _ = write!(buf, "${n}");
        }
    }
}

/// Write ` = $n`.
pub(crate) fn write_eq_placeholder(buf: &mut String, n: usize) {
    match EQ_PLACEHOLDERS.get(n) {
        Some(s) => buf.push_str(s),
        None => {
            let _ = write!(buf, " = ${n}");
        }
    }
}

/// Write ` IN $n`.
pub(crate) fn write_in_placeholder(buf: &mut String, n: usize) {
    match IN_PLACEHOLDERS.get(n) {
        Some(s) => buf.push_str(s),
        None => {
            let _ = write!(buf, " IN ${n}");
        }
    }
}

/// Write a non-negative integer in decimal.
pub(crate) fn write_uint(buf: &mut String, n: u64) {
    match usize::try_from(n).ok().and_then(|i| INTS.get(i)) {
        Some(s) => buf.push_str(s),
        None => {
            let _ = write!(buf, "{n}");
        }
    }
}

/// Write a signed integer in decimal.
pub(crate) fn write_int(buf: &mut String, n: i64) {
    if n < 0 {
        let _ = write!(buf, "{n}");
    } else {
        write_uint(buf, n.unsigned_abs());
    }
}

/// Write `ident` as a quoted identifier, quoting each dotted component.
///
/// `public.users` becomes `"public"."users"`. Embedded double quotes are doubled.
pub(crate) fn write_ident(buf: &mut String, ident: &str) -> Result<(), BuildError> {
    if ident.is_empty() || ident.contains('\0') {
        return Err(BuildError::InvalidIdentifier(ident.to_string()));
    }
    for (i, part) in ident.split('.').enumerate() {
        if part.is_empty() {
            return Err(BuildError::InvalidIdentifier(ident.to_string()));
        }
        if i > 0 {
            buf.push('.');
        }
        buf.push('"');
        for c in part.chars() {
            if c == '"' {
                buf.push('"');
            }
            buf.push(c);
        }
        buf.push('"');
    }
    Ok(())
}

/// Quote an identifier into a new string.
pub fn quote_ident(ident: &str) -> Result<String, BuildError> {
    let mut out = String::with_capacity(ident.len() + 4);
    write_ident(&mut out, ident)?;
    Ok(out)
}

/// Write a comma-separated list of quoted identifiers.
pub(crate) fn write_ident_list(
    buf: &mut String,
    idents: &[String],
    sep: &str,
) -> Result<(), BuildError> {
    for (i, ident) in idents.iter().enumerate() {
        if i > 0 {
            buf.push_str(sep);
        }
        write_ident(buf, ident)?;
    }
    Ok(())
}

/// Write a `RETURNING` list entry.
///
/// Plain identifiers (optionally dotted) are quoted; anything else (`*`,
/// expressions, aliases) is written verbatim.
pub(crate) fn write_returning_item(buf: &mut String, item: &str) -> Result<(), BuildError> {
    if is_plain_ident(item) {
        write_ident(buf, item)
    } else {
        buf.push_str(item);
        Ok(())
    }
}

/// Write `ident` bare when Postgres would read it unchanged (lower-case
/// plain identifiers), otherwise quoted.
pub(crate) fn write_bare_ident(buf: &mut String, ident: &str) -> Result<(), BuildError> {
    if is_plain_ident(ident) && !ident.chars().any(|c| c.is_ascii_uppercase()) {
        buf.push_str(ident);
        Ok(())
    } else {
        write_ident(buf, ident)
    }
}

fn is_plain_ident(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        })
}

// ==================== String literals ====================

static DOLLAR_TAG: LazyLock<RwLock<String>> = LazyLock::new(|| RwLock::new(random_tag()));

/// A `$abc$` tag built from three random ASCII letters.
fn random_tag() -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut tag = String::with_capacity(5);
    tag.push('$');
    for b in &bytes[..3] {
        tag.push(char::from(LETTERS[usize::from(*b) % LETTERS.len()]));
    }
    tag.push('$');
    tag
}

fn current_tag() -> String {
    match DOLLAR_TAG.read() {
        Ok(tag) => tag.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the process-wide tag, returning the new one.
fn regenerate_tag() -> String {
    let tag = random_tag();
    match DOLLAR_TAG.write() {
        Ok(mut guard) => *guard = tag.clone(),
        Err(poisoned) => *poisoned.into_inner() = tag.clone(),
    }
    tag
}

/// Write `s` as a PostgreSQL string literal.
///
/// Short strings use single quotes with `'` doubled. Longer strings use the
/// dollar tag; on collision the tag is regenerated once, and if the new tag
/// also collides the single-quote form is used.
pub(crate) fn write_literal(buf: &mut String, s: &str) -> DatResult<()> {
    if s.contains('\0') {
        return Err(DatError::InvalidValue(
            "string literal contains a NUL character".to_string(),
        ));
    }

    if s.chars().count() > SHORT_LITERAL {
        let mut tag = current_tag();
        if tag_collides(s, &tag) {
            tag = regenerate_tag();
        }
        if !tag_collides(s, &tag) {
            buf.reserve(s.len() + tag.len() * 2);
            buf.push_str(&tag);
            buf.push_str(s);
            buf.push_str(&tag);
            return Ok(());
        }
    }

    buf.reserve(s.len() + 2);
    buf.push('\'');
    for c in s.chars() {
        if c == '\'' {
            buf.push('\'');
        }
        buf.push(c);
    }
    buf.push('\'');
    Ok(())
}

/// Whether `tag` would close a dollar-quoted literal before the end of `s`:
/// the first match in `s` followed by `tag` must be the closing one.
fn tag_collides(s: &str, tag: &str) -> bool {
    let mut quoted = String::with_capacity(s.len() + tag.len());
    quoted.push_str(s);
    quoted.push_str(tag);
    quoted.find(tag) != Some(s.len())
}

/// Quote a string literal into a new string.
pub fn quote_literal(s: &str) -> DatResult<String> {
    let mut out = String::with_capacity(s.len() + 2);
    write_literal(&mut out, s)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_tables() {
        let mut buf = String::new();
        write_placeholder(&mut buf, 1);
        write_eq_placeholder(&mut buf, 99);
        write_in_placeholder(&mut buf, 100);
        assert_eq!(buf, "$1 = $99 IN $100");
    }

    #[test]
    fn ints() {
        let mut buf = String::new();
        write_int(&mut buf, 7);
        buf.push(' ');
        write_int(&mut buf, -42);
        buf.push(' ');
        write_uint(&mut buf, 12345);
        assert_eq!(buf, "7 -42 12345");
    }

    #[test]
    fn ident_quoting() {
        assert_eq!(quote_ident("x").unwrap(), r#""x""#);
        assert_eq!(quote_ident("x.y").unwrap(), r#""x"."y""#);
        assert_eq!(quote_ident(r#"we"ird"#).unwrap(), r#""we""ird""#);
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a..b").is_err());
    }

    #[test]
    fn returning_items() {
        let mut buf = String::new();
        write_returning_item(&mut buf, "id").unwrap();
        buf.push(',');
        write_returning_item(&mut buf, "*").unwrap();
        buf.push(',');
        write_returning_item(&mut buf, "count(*) AS n").unwrap();
        assert_eq!(buf, r#""id",*,count(*) AS n"#);
    }

    #[test]
    fn bare_idents_only_when_unchanged() {
        let mut buf = String::new();
        for ident in ["c1", "t.c2", "Name", "a b", "x\"y"] {
            write_bare_ident(&mut buf, ident).unwrap();
            buf.push(' ');
        }
        assert_eq!(buf, r#"c1 t.c2 "Name" "a b" "x""y" "#);
        assert!(write_bare_ident(&mut buf, "").is_err());
    }

    #[test]
    fn short_literal_doubles_quotes() {
        assert_eq!(quote_literal("hello").unwrap(), "'hello'");
        assert_eq!(
            quote_literal(r#""pg's world""#).unwrap(),
            r#"'"pg''s world"'"#
        );
    }

    #[test]
    fn long_literal_uses_dollar_tag() {
        let s = "x".repeat(SHORT_LITERAL + 1);
        let quoted = quote_literal(&s).unwrap();
        assert!(quoted.starts_with('$'));
        assert!(quoted.ends_with('$'));
        let tag = &quoted[..5];
        assert_eq!(quoted, format!("{tag}{s}{tag}"));
    }

    #[test]
    fn literal_at_threshold_uses_single_quotes() {
        let s = "y".repeat(SHORT_LITERAL);
        assert_eq!(quote_literal(&s).unwrap(), format!("'{s}'"));
    }

    #[test]
    fn long_literal_avoids_colliding_tag() {
        let tag = current_tag();
        let s = format!("{}{}", tag, "z".repeat(SHORT_LITERAL));
        let quoted = quote_literal(&s).unwrap();
        // Either a fresh tag or the single-quote fallback; never the colliding tag.
        assert!(!quoted.starts_with(&tag) || !quoted.ends_with(&tag));
        assert!(quoted.contains(&s));
    }

    #[test]
    fn long_literal_ending_in_partial_tag() {
        let tag = current_tag();
        let s = format!("{}{}", "x".repeat(SHORT_LITERAL + 6), &tag[..tag.len() - 1]);
        let quoted = quote_literal(&s).unwrap();
        if quoted.starts_with('\'') {
            assert_eq!(quoted, format!("'{s}'"));
        } else {
            let open = &quoted[..tag.len()];
            let body = &quoted[open.len()..];
            assert_eq!(body.find(open), Some(s.len()));
            assert_eq!(quoted, format!("{open}{s}{open}"));
        }
    }

    #[test]
    fn tag_collision_detection() {
        assert!(tag_collides("a$Ab$c", "$Ab$"));
        assert!(tag_collides("abc$Ab", "$Ab$"));
        assert!(!tag_collides("abc", "$Ab$"));
        assert!(!tag_collides("$Abc", "$Ab$"));
    }

    #[test]
    fn nul_is_rejected() {
        assert!(matches!(
            quote_literal("a\0b"),
            Err(DatError::InvalidValue(_))
        ));
    }

    #[test]
    fn pooled_buffer_is_cleared() {
        {
            let mut b = SqlBuf::get();
            b.push_str("leftover");
        }
        let b = SqlBuf::get();
        assert!(b.is_empty());
    }
}
