//! Statement builders.
//!
//! Every builder is a consuming fluent chain that records the first error it
//! meets and surfaces it from [`Builder::to_sql`] / [`Builder::interpolate`].
//!
//! - Placeholders in caller fragments are relative (`$1` is the fragment's
//!   first argument) and are renumbered into one absolute `$1..$N` sequence.
//! - Table names are quoted where the statement shape requires it
//!   (`UPDATE "a"`, `INSERT INTO "t"(...)` inside CTEs); SELECT targets are
//!   written verbatim.

#[macro_use]
mod macros;

mod clauses;
mod doc;
mod values;

pub mod call;
pub mod delete;
pub mod insect;
pub mod insert;
pub mod jsql;
pub mod select;
pub mod select_doc;
pub mod traits;
pub mod update;
pub mod upsert;

pub use call::{CallBuilder, RawBuilder, call, raw};
pub use delete::{DeleteBuilder, delete_from};
pub use insect::{InsectBuilder, insect};
pub use insert::{InsertBuilder, insert_into};
pub use jsql::{JsqlBuilder, jsql};
pub use select::{SelectBuilder, select};
pub use select_doc::{SelectDocBuilder, select_doc};
pub use traits::{Builder, CacheOptions, ExecOptions};
pub use update::{UpdateBuilder, update};
pub use upsert::{UpsertBuilder, upsert};
