//! Derive macros for pgdat
//!
//! Provides `#[derive(FromRow)]` and `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod from_row;
mod record;

/// Derive `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// use pgdat::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     #[db(column = "user_name")]
///     name: String,
///     email: Option<String>,
///     #[db(skip)]
///     cached: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[db(column = "name")]` - Map field to a different column name
/// - `#[db(skip)]` - Not read from the row; filled with `Default::default()`
/// - `#[db(flatten)]` - Read an embedded `FromRow` struct from the same row
#[proc_macro_derive(FromRow, attributes(db))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Record` (column names and values) for a struct.
///
/// Column names default to the snake_case field name. Field types must be
/// `Clone + Into<pgdat::Value>`.
///
/// # Example
///
/// ```ignore
/// use pgdat::Record;
///
/// #[derive(Record)]
/// struct Audit {
///     created_by: String,
/// }
///
/// #[derive(Record)]
/// struct Post {
///     id: i64,
///     title: String,
///     #[db(flatten)]
///     audit: Audit,
/// }
/// // column_names() == ["id", "title", "created_by"]
/// ```
///
/// # Attributes
///
/// - `#[db(column = "name")]` - Map field to a different column name
/// - `#[db(skip)]` - Leave the field out
/// - `#[db(flatten)]` - Splice in the columns of an embedded `Record`
#[proc_macro_derive(Record, attributes(db))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
