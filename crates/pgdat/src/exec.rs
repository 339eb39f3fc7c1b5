//! Executor facade: terminal operations for builders.
//!
//! Every operation renders the builder (literal SQL when its interpolation flag
//! is on), inlines anything the driver cannot bind, and runs the statement on a
//! [`Handle`] under the builder's timeout.

use crate::builder::{Builder, ExecOptions, JsqlBuilder, SelectDocBuilder};
use crate::cache::{cache_key, store};
use crate::client::Handle;
use crate::config::strict_enabled;
use crate::error::{DatError, DatResult};
use crate::interpolate::expand_inline;
use crate::row::FromRow;
use crate::value::{Value, params_ref, summarize_args};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Statement text longer than this is truncated in debug logs.
const LOG_SQL_MAX: usize = 200;

fn truncate_sql(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// The SQL and driver arguments a builder executes with.
pub(crate) fn prepare<B: Builder + ?Sized>(builder: &B) -> DatResult<(String, Vec<Value>)> {
    let (sql, args) = builder.interpolate()?;
    expand_inline(&sql, &args)
}

/// Wrap `sql` so the whole result set comes back as one JSON array.
pub(crate) fn wrap_json_array(sql: &str) -> String {
    format!("SELECT TO_JSON(ARRAY_AGG(__q.*)) FROM ({sql}) AS __q")
}

async fn with_timeout<H, T, F>(handle: &H, timeout: Option<Duration>, future: F) -> DatResult<T>
where
    H: Handle,
    F: Future<Output = DatResult<T>> + Send,
{
    match timeout {
        Some(timeout) => {
            tokio::pin!(future);
            tokio::select! {
                result = &mut future => result,
                _ = tokio::time::sleep(timeout) => {
                    if let Some(cancel_token) = handle.cancel_token() {
                        tokio::spawn(async move {
                            let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                        });
                    }
                    Err(DatError::Timeout(timeout))
                }
            }
        }
        None => future.await,
    }
}

fn log_start(sql: &str, args: &[Value]) {
    tracing::debug!(
        target: "pgdat.sql",
        param_count = args.len(),
        sql = %truncate_sql(sql, LOG_SQL_MAX),
    );
}

fn log_result<T>(sql: &str, args: &[Value], result: DatResult<T>) -> DatResult<T> {
    if let Err(e) = &result {
        tracing::error!(
            target: "pgdat.sql",
            sql = %sql,
            args = %summarize_args(args),
            error = %e,
        );
    }
    result
}

async fn fetch_rows<H: Handle>(
    handle: &H,
    opts: &ExecOptions,
    sql: &str,
    args: &[Value],
) -> DatResult<Vec<Row>> {
    log_start(sql, args);
    let params = params_ref(args);
    let result = with_timeout(handle, opts.timeout, handle.query(sql, &params)).await;
    log_result(sql, args, result)
}

async fn execute<H: Handle>(
    handle: &H,
    opts: &ExecOptions,
    sql: &str,
    args: &[Value],
) -> DatResult<u64> {
    log_start(sql, args);
    let params = params_ref(args);
    let result = with_timeout(handle, opts.timeout, handle.execute(sql, &params)).await;
    log_result(sql, args, result)
}

/// Run `fetch` unless the builder's cache already holds the result.
///
/// Store failures only produce warnings.
async fn cached<F>(opts: &ExecOptions, sql: &str, args: &[Value], fetch: F) -> DatResult<Vec<u8>>
where
    F: Future<Output = DatResult<Vec<u8>>> + Send,
{
    let (Some(cache), Some(store)) = (&opts.cache, store()) else {
        return fetch.await;
    };
    if cache.ttl.is_zero() {
        return fetch.await;
    }

    let key = cache_key(&cache.id, sql, &format!("{args:?}"));
    if !cache.invalidate {
        match store.get(&key) {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(e) => tracing::warn!(target: "pgdat.cache", key = %key, error = %e, "cache get failed"),
        }
    }

    let bytes = fetch.await?;
    if let Err(e) = store.set(&key, bytes.clone(), cache.ttl) {
        tracing::warn!(target: "pgdat.cache", key = %key, error = %e, "cache set failed");
    }
    Ok(bytes)
}

/// First column of `row` as JSON; SQL NULL becomes `null`.
fn json_cell(row: &Row) -> DatResult<serde_json::Value> {
    let value: Option<serde_json::Value> = row
        .try_get(0)
        .map_err(|e| DatError::decode("0", e.to_string()))?;
    Ok(value.unwrap_or(serde_json::Value::Null))
}

/// Terminal operations available on every builder.
pub trait Execer: Builder + Sync {
    /// Execute the statement and return the number of affected rows.
    fn exec<H: Handle>(&self, handle: &H) -> impl Future<Output = DatResult<u64>> + Send {
        async move {
            let (sql, args) = prepare(self)?;
            execute(handle, self.exec_options(), &sql, &args).await
        }
    }

    /// First column of the first row.
    ///
    /// No rows is [`DatError::NotFound`].
    fn query_scalar<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<T>> + Send
    where
        T: for<'a> FromSql<'a> + Send,
        H: Handle,
    {
        async move {
            let (sql, args) = prepare(self)?;
            let rows = fetch_rows(handle, self.exec_options(), &sql, &args).await?;
            let row = rows
                .first()
                .ok_or_else(|| DatError::not_found("Expected one row, got none"))?;
            row.try_get(0)
                .map_err(|e| DatError::decode("0", e.to_string()))
        }
    }

    /// First column of every row.
    fn query_slice<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<Vec<T>>> + Send
    where
        T: for<'a> FromSql<'a> + Send,
        H: Handle,
    {
        async move {
            let (sql, args) = prepare(self)?;
            let rows = fetch_rows(handle, self.exec_options(), &sql, &args).await?;
            rows.iter()
                .map(|row| {
                    row.try_get(0)
                        .map_err(|e| DatError::decode("0", e.to_string()))
                })
                .collect()
        }
    }

    /// First row mapped into `T`.
    ///
    /// No rows is [`DatError::NotFound`]; extra rows are ignored.
    fn query_struct<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<T>> + Send
    where
        T: FromRow + Send,
        H: Handle,
    {
        async move {
            let (sql, args) = prepare(self)?;
            let rows = fetch_rows(handle, self.exec_options(), &sql, &args).await?;
            let row = rows
                .first()
                .ok_or_else(|| DatError::not_found("Expected one row, got none"))?;
            T::from_row(row)
        }
    }

    /// Every row mapped into `T`.
    fn query_structs<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<Vec<T>>> + Send
    where
        T: FromRow + Send,
        H: Handle,
    {
        async move {
            let (sql, args) = prepare(self)?;
            let rows = fetch_rows(handle, self.exec_options(), &sql, &args).await?;
            rows.iter().map(T::from_row).collect()
        }
    }

    /// The result set as a JSON array (`[]` when empty).
    ///
    /// Runs `SELECT TO_JSON(ARRAY_AGG(__q.*)) FROM (<sql>) AS __q` and honors the
    /// builder's cache settings.
    fn query_json<H: Handle>(&self, handle: &H) -> impl Future<Output = DatResult<Vec<u8>>> + Send {
        async move {
            let (sql, args) = prepare(self)?;
            let sql = wrap_json_array(&sql);
            let opts = self.exec_options();
            cached(opts, &sql, &args, async {
                let rows = fetch_rows(handle, opts, &sql, &args).await?;
                let value = match rows.first() {
                    Some(row) => json_cell(row)?,
                    None => serde_json::Value::Null,
                };
                if value.is_null() {
                    return Ok(b"[]".to_vec());
                }
                Ok(serde_json::to_vec(&value)?)
            })
            .await
        }
    }

    /// [`Execer::query_json`] deserialized into `T`.
    fn query_object<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<T>> + Send
    where
        T: DeserializeOwned,
        H: Handle,
    {
        async move {
            let bytes = self.query_json(handle).await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

impl<B: Builder + Sync> Execer for B {}

/// Operations for builders whose rows are already JSON documents.
pub trait DocExecer: Builder + Sync {
    /// The first document as raw JSON.
    ///
    /// No rows is [`DatError::NotFound`]; more than one row is
    /// [`DatError::TooManyRows`] in strict mode and otherwise ignored.
    fn query_doc_json<H: Handle>(
        &self,
        handle: &H,
    ) -> impl Future<Output = DatResult<Vec<u8>>> + Send {
        async move {
            let (sql, args) = prepare(self)?;
            let opts = self.exec_options();
            cached(opts, &sql, &args, async {
                let rows = fetch_rows(handle, opts, &sql, &args).await?;
                if rows.len() > 1 && strict_enabled() {
                    return Err(DatError::too_many_rows(1, rows.len()));
                }
                let row = rows
                    .first()
                    .ok_or_else(|| DatError::not_found("Expected one document, got none"))?;
                Ok(serde_json::to_vec(&json_cell(row)?)?)
            })
            .await
        }
    }

    /// Every document, as one raw JSON array.
    fn query_docs_json<H: Handle>(
        &self,
        handle: &H,
    ) -> impl Future<Output = DatResult<Vec<u8>>> + Send {
        async move {
            let (sql, args) = prepare(self)?;
            let opts = self.exec_options();
            cached(opts, &sql, &args, async {
                let rows = fetch_rows(handle, opts, &sql, &args).await?;
                let docs = rows.iter().map(json_cell).collect::<DatResult<Vec<_>>>()?;
                Ok(serde_json::to_vec(&docs)?)
            })
            .await
        }
    }

    /// The first document deserialized into `T`.
    fn query_doc<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<T>> + Send
    where
        T: DeserializeOwned,
        H: Handle,
    {
        async move {
            let bytes = self.query_doc_json(handle).await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    /// Every document deserialized into `T`.
    fn query_docs<T, H>(&self, handle: &H) -> impl Future<Output = DatResult<Vec<T>>> + Send
    where
        T: DeserializeOwned,
        H: Handle,
    {
        async move {
            let bytes = self.query_docs_json(handle).await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

impl DocExecer for SelectDocBuilder {}
impl DocExecer for JsqlBuilder {}
