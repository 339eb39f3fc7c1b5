//! Null-aware wrapper types.
//!
//! These mirror nullable columns in structs that are serialized to JSON or
//! read straight from rows.

mod null;

pub use null::{Null, NullBool, NullFloat64, NullInt64, NullString, NullTime};
