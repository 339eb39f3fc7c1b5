//! Null-aware scalar wrappers.
//!
//! Each wrapper carries a value and a `valid` flag. JSON encoding is the wrapped
//! value when valid and `null` otherwise; decoding accepts `null` and the native
//! JSON form. [`NullTime`] also decodes PostgreSQL's text timestamp format.

use crate::value::Value;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use tokio_postgres::types::{FromSql, Type};

/// A value that may be SQL `NULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Null<T> {
    pub value: T,
    pub valid: bool,
}

pub type NullString = Null<String>;
pub type NullInt64 = Null<i64>;
pub type NullFloat64 = Null<f64>;
pub type NullBool = Null<bool>;

impl<T> Null<T> {
    /// A valid (non-null) value.
    pub fn new(value: T) -> Self {
        Self { value, valid: true }
    }

    /// Borrow the value when valid.
    pub fn as_option(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }

    pub fn into_option(self) -> Option<T> {
        self.valid.then_some(self.value)
    }
}

impl<T: Default> Null<T> {
    /// An invalid (null) value.
    pub fn null() -> Self {
        Self {
            value: T::default(),
            valid: false,
        }
    }
}

impl<T: Default> From<Option<T>> for Null<T> {
    fn from(v: Option<T>) -> Self {
        v.map_or_else(Self::null, Self::new)
    }
}

impl<T: Into<Value>> From<Null<T>> for Value {
    fn from(v: Null<T>) -> Self {
        if v.valid { v.value.into() } else { Value::Null }
    }
}

impl<T: Serialize> Serialize for Null<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.valid {
            self.value.serialize(serializer)
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for Null<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

impl<'a, T: FromSql<'a> + Default> FromSql<'a> for Null<T> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        T::from_sql(ty, raw).map(Self::new)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self::null())
    }

    fn accepts(ty: &Type) -> bool {
        T::accepts(ty)
    }
}

/// Timestamp that may be SQL `NULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NullTime {
    pub value: DateTime<Utc>,
    pub valid: bool,
}

impl NullTime {
    pub fn new(value: DateTime<Utc>) -> Self {
        Self { value, valid: true }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn as_option(&self) -> Option<&DateTime<Utc>> {
        self.valid.then_some(&self.value)
    }

    /// Parse any of the accepted text forms.
    ///
    /// RFC 3339 (any fraction length, e.g. `2016-01-02T15:04:05.000Z`) and the
    /// PostgreSQL text form `2016-01-02 15:04:05.123456+00`.
    pub fn parse(s: &str) -> Option<Self> {
        parse_timestamp(s).map(Self::new)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    const PG_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in PG_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Some(t.with_timezone(&Utc));
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

impl From<Option<DateTime<Utc>>> for NullTime {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map_or_else(Self::null, Self::new)
    }
}

impl From<NullTime> for Value {
    fn from(v: NullTime) -> Self {
        if v.valid { Value::Time(v.value) } else { Value::Null }
    }
}

impl Serialize for NullTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.valid {
            self.value.serialize(serializer)
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de> Deserialize<'de> for NullTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Self::null()),
            Some(s) => Self::parse(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

impl<'a> FromSql<'a> for NullTime {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if *ty == Type::TIMESTAMP {
            return NaiveDateTime::from_sql(ty, raw).map(|t| Self::new(t.and_utc()));
        }
        DateTime::<Utc>::from_sql(ty, raw).map(Self::new)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self::null())
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::TIMESTAMP | Type::TIMESTAMPTZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn valid_string_round_trips() {
        let v = NullString::new("hello".to_string());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#""hello""#);
        let back: NullString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn invalid_marshals_to_null() {
        assert_eq!(serde_json::to_string(&NullInt64::null()).unwrap(), "null");
        assert_eq!(serde_json::to_string(&NullBool::null()).unwrap(), "null");
        assert_eq!(serde_json::to_string(&NullTime::null()).unwrap(), "null");
    }

    #[test]
    fn null_unmarshals_invalid() {
        let v: NullFloat64 = serde_json::from_str("null").unwrap();
        assert!(!v.valid);
        let t: NullTime = serde_json::from_str("null").unwrap();
        assert!(!t.valid);
    }

    #[test]
    fn numeric_round_trip() {
        let v = NullFloat64::new(1.5);
        let back: NullFloat64 = serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn time_accepts_all_formats() {
        let expected = Utc.with_ymd_and_hms(2016, 1, 2, 15, 4, 5).unwrap();
        for s in [
            "2016-01-02T15:04:05Z",
            "2016-01-02T15:04:05.000Z",
            "2016-01-02T15:04:05.000000000Z",
            "2016-01-02 15:04:05.00000000+00",
            "2016-01-02 17:04:05+02",
        ] {
            let t = NullTime::parse(s).unwrap_or_else(|| panic!("failed to parse {s}"));
            assert_eq!(t.value, expected, "{s}");
        }
    }

    #[test]
    fn time_round_trips_with_nanos() {
        let t = NullTime::new(Utc.timestamp_opt(1_451_747_045, 123_456_789).unwrap());
        let json = serde_json::to_string(&t).unwrap();
        let back: NullTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn into_value() {
        assert!(Value::from(NullString::null()).is_null());
        assert!(matches!(Value::from(NullInt64::new(7)), Value::Int(7)));
    }
}
