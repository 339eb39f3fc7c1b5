//! Argument values.
//!
//! [`Value`] enumerates every argument shape the builders and the interpolator
//! understand. Builders collect `Vec<Value>`; the interpolator dispatches on the
//! variant; whatever is left is sent to the driver through the [`ToSql`] impl
//! below.

use crate::error::{DatError, DatResult};
use crate::expr::Expression;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

/// A clone-friendly driver parameter using Arc.
///
/// Used for argument types the crate has no dedicated variant for (UUIDs,
/// decimals, ...). The interpolator never inlines them; they are always sent to
/// the driver as placeholders.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Create a new parameter from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Get a reference to the inner value as a ToSql trait object.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Param").field(&"<dyn ToSql>").finish()
    }
}

/// JSON document stored as raw bytes. Not validated on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Json(pub Vec<u8>);

impl Json {
    /// Wrap raw JSON bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Json(bytes.into())
    }

    /// Serialize `value` with serde_json.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> DatResult<Self> {
        Ok(Json(serde_json::to_vec(value)?))
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A string written into SQL unquoted and unescaped.
///
/// Only use it for trusted text such as [`DEFAULT`] and [`NOW`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raw(pub Cow<'static, str>);

impl Raw {
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Raw(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `DEFAULT` keyword, e.g. for INSERT values.
pub const DEFAULT: Raw = Raw(Cow::Borrowed("DEFAULT"));

/// `NOW()` function call.
pub const NOW: Raw = Raw(Cow::Borrowed("NOW()"));

/// A list bound as one PostgreSQL array parameter, e.g. for `col = ANY($1)`.
///
/// A plain `Vec` argument always expands to `(v1,v2,...)` for `IN $1`. An
/// `Array` stays a driver parameter when interpolation is off and is written
/// as `ARRAY[...]` when it is on. Elements must be ints, uints or strings.
#[derive(Clone, Debug)]
pub struct Array(pub Vec<Value>);

impl Array {
    pub fn new<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self(items.into_iter().map(Into::into).collect())
    }
}

/// An argument value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Float32(f32),
    Str(String),
    /// Binary blob. Never interpolated.
    Bytes(Vec<u8>),
    /// Timestamp with time zone, kept in UTC.
    Time(DateTime<Utc>),
    Json(Json),
    Raw(Raw),
    Expr(Box<Expression>),
    /// Homogeneous list of ints, uints or strings.
    List(Vec<Value>),
    /// Homogeneous ints, uints or strings bound as a single array parameter.
    Array(Vec<Value>),
    /// Any other driver-encodable value.
    Other(Param),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short shape name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) | Value::Float32(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Raw(_) => "raw",
            Value::Expr(_) => "expression",
            Value::List(_) => "list",
            Value::Array(_) => "array",
            Value::Other(_) => "param",
        }
    }

    /// Whether this value or any nested expression argument is a binary blob.
    pub(crate) fn contains_bytes(&self) -> bool {
        match self {
            Value::Bytes(_) => true,
            Value::Expr(e) => e.args().iter().any(Value::contains_bytes),
            Value::List(items) | Value::Array(items) => items.iter().any(Value::contains_bytes),
            _ => false,
        }
    }

    /// Whether the driver cannot bind this value and it has to be inlined.
    pub(crate) fn needs_inline(&self) -> bool {
        matches!(self, Value::Raw(_) | Value::Expr(_))
    }

    /// Compact rendering for logs.
    pub(crate) fn summary(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Float32(f) => f.to_string(),
            Value::Str(s) if s.chars().count() > 32 => {
                let head: String = s.chars().take(32).collect();
                format!("{head:?}...")
            }
            Value::Str(s) => format!("{s:?}"),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Time(t) => t.to_rfc3339(),
            Value::Json(j) => format!("<json {} bytes>", j.0.len()),
            Value::Raw(r) => r.as_str().to_string(),
            Value::Expr(e) => format!("<expr {:?}>", e.sql()),
            Value::List(items) => format!("<list of {}>", items.len()),
            Value::Array(items) => format!("<array of {}>", items.len()),
            Value::Other(_) => "<param>".to_string(),
        }
    }
}

/// Summarize an argument vector for logging.
pub(crate) fn summarize_args(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(Value::summary).collect();
    format!("[{}]", parts.join(", "))
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    isize => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    usize => Uint as u64,
    f64 => Float as f64,
    f32 => Float32 as f32,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Time(v.with_timezone(&Utc))
    }
}

/// Naive timestamps are taken to be UTC.
impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v.and_utc())
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::Json(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(Json(v.to_string().into_bytes()))
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v.0)
    }
}

impl From<Raw> for Value {
    fn from(v: Raw) -> Self {
        Value::Raw(v)
    }
}

impl From<Expression> for Value {
    fn from(v: Expression) -> Self {
        Value::Expr(Box::new(v))
    }
}

impl From<Param> for Value {
    fn from(v: Param) -> Self {
        Value::Other(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Other(Param::new(v))
    }
}

macro_rules! value_from_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Self {
                    Value::List(v.into_iter().map(Value::from).collect())
                }
            }
        )*
    };
}

value_from_list!(i16, i32, i64, u32, u64, String, &str);

/// Absent optionals become `NULL`.
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion into a positional argument list.
///
/// Stands in for variadic arguments: `()`, arrays, `Vec<Value>` and tuples of
/// `Into<Value>` all work.
///
/// ```ignore
/// select(["a"]).from("t").where_sql("id = $1 AND name = $2", (1, "x"));
/// ```
pub trait IntoArgs {
    fn into_args(self) -> Vec<Value>;
}

impl IntoArgs for () {
    fn into_args(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Vec<Value> {
        self
    }
}

impl<T: Into<Value>, const N: usize> IntoArgs for [T; N] {
    fn into_args(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! tuple_into_args {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_into_args!(A);
tuple_into_args!(A, B);
tuple_into_args!(A, B, C);
tuple_into_args!(A, B, C, D);
tuple_into_args!(A, B, C, D, E);
tuple_into_args!(A, B, C, D, E, F);
tuple_into_args!(A, B, C, D, E, F, G);
tuple_into_args!(A, B, C, D, E, F, G, H);
tuple_into_args!(A, B, C, D, E, F, G, H, I);
tuple_into_args!(A, B, C, D, E, F, G, H, I, J);
tuple_into_args!(A, B, C, D, E, F, G, H, I, J, K);
tuple_into_args!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// let args = pgdat::args![1, "two", None::<i64>];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}

type BoxError = Box<dyn StdError + Sync + Send>;

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            v.to_string().to_sql(ty, out)
        }
        _ => v.to_sql(ty, out),
    }
}

fn json_to_sql(json: &Json, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::JSONB {
        out.put_u8(1);
    }
    out.extend_from_slice(&json.0);
    Ok(IsNull::No)
}

fn array_to_sql(items: &[Value], ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    validate_array(items)?;
    let Kind::Array(member) = ty.kind() else {
        return Err(format!("cannot bind an array as {ty}").into());
    };
    if items.is_empty() {
        return Vec::<i64>::new().to_sql(ty, out);
    }
    if items.iter().all(|v| matches!(v, Value::Str(_))) {
        let strs: Vec<&str> = items
            .iter()
            .filter_map(|v| match v {
                Value::Str(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        if !<&str as ToSql>::accepts(member) {
            return Err(format!("cannot bind a string array as {ty}").into());
        }
        return strs.to_sql(ty, out);
    }

    let mut ints = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Int(i) => ints.push(*i),
            Value::Uint(u) => ints.push(i64::try_from(*u)?),
            other => {
                return Err(format!("unsupported list element: {}", other.kind()).into());
            }
        }
    }
    match *ty {
        Type::INT2_ARRAY => ints
            .iter()
            .map(|i| i16::try_from(*i))
            .collect::<Result<Vec<_>, _>>()?
            .to_sql(ty, out),
        Type::INT4_ARRAY => ints
            .iter()
            .map(|i| i32::try_from(*i))
            .collect::<Result<Vec<_>, _>>()?
            .to_sql(ty, out),
        Type::INT8_ARRAY => ints.to_sql(ty, out),
        _ => Err(format!("cannot bind an integer array as {ty}").into()),
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => int_to_sql(*i, ty, out),
            Value::Uint(u) => int_to_sql(i64::try_from(*u)?, ty, out),
            Value::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql(ty, out),
            Value::Float(f) => f.to_sql(ty, out),
            Value::Float32(f) if *ty == Type::FLOAT8 => f64::from(*f).to_sql(ty, out),
            Value::Float32(f) => f.to_sql(ty, out),
            Value::Str(s) => s.to_sql(ty, out),
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Time(t) if *ty == Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
            Value::Time(t) => t.to_sql(ty, out),
            Value::Json(j) => json_to_sql(j, ty, out),
            Value::Array(items) => array_to_sql(items, ty, out),
            Value::Other(p) => p.0.to_sql_checked(ty, out),
            Value::Raw(_) | Value::Expr(_) | Value::List(_) => {
                Err(format!("{} values must be inlined before execution", self.kind()).into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Borrow an argument vector as driver parameters.
pub(crate) fn params_ref(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Check that an array argument is homogeneous; unlike a list it may be empty.
pub(crate) fn validate_array(items: &[Value]) -> DatResult<()> {
    if items.is_empty() {
        return Ok(());
    }
    validate_list(items)
}

/// Check that a list argument is non-empty and homogeneous.
pub(crate) fn validate_list(items: &[Value]) -> DatResult<()> {
    let Some(first) = items.first() else {
        return Err(DatError::InvalidSliceLength);
    };
    let kind = first.kind();
    if !matches!(first, Value::Int(_) | Value::Uint(_) | Value::Str(_)) {
        return Err(DatError::InvalidSliceValue(format!(
            "unsupported element type {kind}"
        )));
    }
    if let Some(bad) = items.iter().find(|v| v.kind() != kind) {
        return Err(DatError::InvalidSliceValue(format!(
            "mixed element types {kind} and {}",
            bad.kind()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_is_null() {
        assert!(Value::from(None::<i64>).is_null());
        assert!(matches!(Value::from(Some(3_i32)), Value::Int(3)));
    }

    #[test]
    fn vec_of_ints_is_list() {
        let v = Value::from(vec![1_i64, 2, 3]);
        match v {
            Value::List(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bytes_stay_bytes() {
        assert!(matches!(Value::from(vec![1_u8, 2]), Value::Bytes(_)));
    }

    #[test]
    fn tuple_args() {
        let args = (1, "x", true).into_args();
        assert_eq!(args.len(), 3);
        assert!(matches!(args[1], Value::Str(ref s) if s == "x"));
    }

    #[test]
    fn args_macro() {
        let args = crate::args![1, "a", None::<String>];
        assert_eq!(args.len(), 3);
        assert!(args[2].is_null());
        assert!(crate::args![].is_empty());
    }

    #[test]
    fn raw_constants() {
        assert_eq!(DEFAULT.as_str(), "DEFAULT");
        assert_eq!(NOW.as_str(), "NOW()");
    }

    #[test]
    fn validate_list_rules() {
        assert!(matches!(
            validate_list(&[]),
            Err(DatError::InvalidSliceLength)
        ));
        assert!(validate_list(&[Value::Int(1), Value::Int(2)]).is_ok());
        assert!(matches!(
            validate_list(&[Value::Int(1), Value::Str("a".into())]),
            Err(DatError::InvalidSliceValue(_))
        ));
        assert!(matches!(
            validate_list(&[Value::Bool(true)]),
            Err(DatError::InvalidSliceValue(_))
        ));
    }

    #[test]
    fn arrays_bind_as_driver_arrays() {
        let mut out = BytesMut::new();
        let ints = Value::from(Array::new([1_i64, 2, 3]));
        assert!(matches!(ints.to_sql(&Type::INT8_ARRAY, &mut out), Ok(IsNull::No)));

        let mut out = BytesMut::new();
        let small = Value::from(Array::new([1_i64, 2]));
        assert!(small.to_sql(&Type::INT4_ARRAY, &mut out).is_ok());

        let mut out = BytesMut::new();
        let strs = Value::from(Array::new(["a", "b"]));
        assert!(strs.to_sql(&Type::TEXT_ARRAY, &mut out).is_ok());

        let mut out = BytesMut::new();
        let empty = Value::Array(Vec::new());
        assert!(empty.to_sql(&Type::INT8_ARRAY, &mut out).is_ok());

        let mut out = BytesMut::new();
        let mixed = Value::from(Array::new([Value::Int(1), Value::Str("a".into())]));
        assert!(mixed.to_sql(&Type::INT8_ARRAY, &mut out).is_err());

        let mut out = BytesMut::new();
        assert!(ints.to_sql(&Type::INT8, &mut out).is_err());
        let mut out = BytesMut::new();
        assert!(strs.to_sql(&Type::INT8_ARRAY, &mut out).is_err());
    }

    #[test]
    fn lists_are_never_bound() {
        let mut out = BytesMut::new();
        let list = Value::from(vec![1_i64, 2]);
        assert!(list.to_sql(&Type::INT8_ARRAY, &mut out).is_err());
    }

    #[test]
    fn json_from_serialize() {
        let j = Json::from_serialize(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(j.as_bytes(), br#"{"a":1}"#);
    }
}
