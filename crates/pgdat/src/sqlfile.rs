//! Multi-statement scripts and keyed SQL files.
//!
//! Scripts are split into batches on lines that contain only `GO`. Keyed files
//! tag each body with a `--@name` (or `--@name=value`) line:
//!
//! ```text
//! --@users_by_id
//! SELECT * FROM users WHERE id = $1
//!
//! --@schema=v2
//! CREATE TABLE t (id int)
//! ```

use crate::client::Handle;
use crate::error::DatResult;

/// One tagged section of a keyed SQL file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedSql {
    pub key: String,
    /// Text after `=` on the tag line, if any.
    pub value: Option<String>,
    pub sql: String,
}

fn is_batch_separator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("go")
}

/// Split `script` into batches on lines that consist only of `GO`.
///
/// Matching ignores case and surrounding whitespace. Batches are trimmed and
/// empty ones are dropped.
pub fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for line in script.lines() {
        if is_batch_separator(line) {
            push_batch(&mut batches, &mut current);
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    push_batch(&mut batches, &mut current);
    batches
}

fn push_batch(batches: &mut Vec<String>, current: &mut String) {
    let batch = current.trim();
    if !batch.is_empty() {
        batches.push(batch.to_string());
    }
    current.clear();
}

/// Parse a keyed SQL file. Text before the first tag is ignored.
pub fn parse_keyed(text: &str) -> Vec<KeyedSql> {
    let mut out: Vec<KeyedSql> = Vec::new();
    let mut open: Option<(String, Option<String>, String)> = None;

    for line in text.lines() {
        if let Some(tag) = line.trim_start().strip_prefix("--@") {
            if let Some((key, value, body)) = open.take() {
                out.push(KeyedSql {
                    key,
                    value,
                    sql: body.trim().to_string(),
                });
            }
            let tag = tag.trim();
            let (key, value) = match tag.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                None => (tag.to_string(), None),
            };
            open = Some((key, value, String::new()));
            continue;
        }
        if let Some((_, _, body)) = open.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if let Some((key, value, body)) = open {
        out.push(KeyedSql {
            key,
            value,
            sql: body.trim().to_string(),
        });
    }
    out
}

/// Look up a section by key.
pub fn find_keyed<'a>(sections: &'a [KeyedSql], key: &str) -> Option<&'a KeyedSql> {
    sections.iter().find(|s| s.key == key)
}

/// Run every batch of `script` in order, stopping at the first failure.
///
/// Returns the number of batches executed.
pub async fn exec_script<H: Handle>(handle: &H, script: &str) -> DatResult<usize> {
    let batches = split_batches(script);
    for (i, batch) in batches.iter().enumerate() {
        tracing::debug!(target: "pgdat.sql", batch = i + 1, total = batches.len(), "script batch");
        handle.batch_execute(batch).await?;
    }
    Ok(batches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatError;
    use std::sync::Mutex;
    use tokio_postgres::Row;
    use tokio_postgres::types::ToSql;

    #[test]
    fn splits_on_go_lines() {
        let script = "CREATE TABLE a (id int);\nGO\n  go  \nINSERT INTO a VALUES (1);\nSELECT 'GO';\nGo\n";
        assert_eq!(
            split_batches(script),
            vec![
                "CREATE TABLE a (id int);".to_string(),
                "INSERT INTO a VALUES (1);\nSELECT 'GO';".to_string(),
            ]
        );
    }

    #[test]
    fn go_inside_a_line_does_not_split() {
        assert_eq!(split_batches("SELECT 1 GO\nSELECT 2"), vec!["SELECT 1 GO\nSELECT 2"]);
        assert!(split_batches("GO\n\nGO").is_empty());
    }

    #[test]
    fn parses_keyed_sections() {
        let text = "preamble ignored\n--@users\nSELECT *\nFROM users\n\n--@ schema = v2 \nCREATE TABLE t (id int)\n--@empty\n";
        let sections = parse_keyed(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].key, "users");
        assert_eq!(sections[0].value, None);
        assert_eq!(sections[0].sql, "SELECT *\nFROM users");
        assert_eq!(sections[1].key, "schema");
        assert_eq!(sections[1].value.as_deref(), Some("v2"));
        assert_eq!(sections[1].sql, "CREATE TABLE t (id int)");
        assert_eq!(sections[2].sql, "");
        assert_eq!(find_keyed(&sections, "schema").map(|s| s.sql.as_str()), Some("CREATE TABLE t (id int)"));
        assert!(find_keyed(&sections, "missing").is_none());
    }

    #[test]
    fn no_tags_means_no_sections() {
        assert!(parse_keyed("SELECT 1\n-- plain comment").is_empty());
    }

    struct Batches {
        seen: Mutex<Vec<String>>,
    }

    impl Handle for Batches {
        async fn query(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn execute(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
            Ok(0)
        }

        async fn batch_execute(&self, sql: &str) -> DatResult<()> {
            if sql.contains("boom") {
                return Err(DatError::Other("boom".to_string()));
            }
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn exec_script_runs_batches_in_order() {
        let h = Batches {
            seen: Mutex::new(Vec::new()),
        };
        let n = exec_script(&h, "SELECT 1\nGO\nSELECT 2").await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(*h.seen.lock().unwrap(), vec!["SELECT 1", "SELECT 2"]);
    }

    #[tokio::test]
    async fn exec_script_stops_at_first_failure() {
        let h = Batches {
            seen: Mutex::new(Vec::new()),
        };
        assert!(exec_script(&h, "SELECT 1\nGO\nboom\nGO\nSELECT 3").await.is_err());
        assert_eq!(*h.seen.lock().unwrap(), vec!["SELECT 1"]);
    }
}
