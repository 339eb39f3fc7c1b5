//! # pgdat
//!
//! PostgreSQL statement builders with a literal-SQL interpolator and a small
//! execution runtime.
//!
//! ## Features
//!
//! - **Fluent builders**: `select`, `insert_into`, `insect`, `upsert`,
//!   `update`, `delete_from`, `call`, `raw`, plus `select_doc` / `jsql` for
//!   JSON documents assembled by the server
//! - **Relative placeholders**: every fragment numbers its own `$1..$n`; the
//!   builder renumbers them into one statement
//! - **Interpolation**: optionally inline arguments as escaped literals so a
//!   statement needs a single round trip
//! - **Execution**: `Execer` / `DocExecer` run any builder on a [`Handle`]
//!   (client, pooled client, driver transaction or [`Tx`])
//! - **Read-through cache** for JSON-shaped results
//!
//! ## Example
//!
//! ```ignore
//! use pgdat::{Execer, select, update};
//!
//! let names: Vec<String> = select(["name"])
//!     .from("people")
//!     .where_sql("age > $1", (21,))
//!     .order_by("name")
//!     .query_slice(&client)
//!     .await?;
//!
//! update("people")
//!     .set("name", "Bob")
//!     .where_sql("id = $1", (7,))
//!     .exec(&client)
//!     .await?;
//! ```

extern crate self as pgdat;

mod buf;
pub(crate) mod fragment;

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod exec;
pub mod expr;
pub mod interpolate;
pub mod row;
pub mod scope;
pub mod sqlfile;
pub mod subquery;
pub mod tx;
pub mod types;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use buf::{quote_ident, quote_literal};
pub use builder::{
    Builder, CacheOptions, CallBuilder, DeleteBuilder, ExecOptions, InsectBuilder, InsertBuilder,
    JsqlBuilder, RawBuilder, SelectBuilder, SelectDocBuilder, UpdateBuilder, UpsertBuilder, call,
    delete_from, insect, insert_into, jsql, raw, select, select_doc, update, upsert,
};
pub use cache::{MemoryStore, NoopStore, Store, clear_store, set_store};
pub use client::{Disconnected, Handle, cancel};
pub use config::{
    Config, check_standard_conforming_strings, interpolation_enabled, set_interpolation,
    set_strict, strict_enabled,
};
pub use error::{BuildError, DatError, DatResult};
pub use exec::{DocExecer, Execer};
pub use expr::{Expression, expr};
pub use fragment::JoinKind;
pub use interpolate::{interpolate, interpolate_with};
pub use row::{FromRow, Record, RowExt};
pub use scope::{NamedScope, RawScope};
pub use sqlfile::{KeyedSql, exec_script, find_keyed, parse_keyed, split_batches};
pub use subquery::IntoSubquery;
pub use tx::{Tx, TxState};
pub use types::{Null, NullBool, NullFloat64, NullInt64, NullString, NullTime};
pub use value::{Array, DEFAULT, IntoArgs, Json, NOW, Param, Raw, Value};

#[cfg(feature = "pool")]
pub use pool::{connect, create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use pgdat_derive::{FromRow, Record};

// Generated code names row types through this path.
pub use tokio_postgres;
