//! Native values as the bridge sees them.
//!
//! `WireValue` is the in-process representation of everything that can cross
//! the invocation protocol: the argument values a dispatcher hands to a
//! native operation and the result values it gets back. `Null` is an explicit
//! member so "absent" survives a round-trip distinct from any empty value.

use std::net::IpAddr;

use uuid::Uuid;

/// One native value assignable to some [`crate::WireKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// The explicit absence marker, assignable to every kind.
    Null,
    Bool(bool),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Inet(IpAddr),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Blob(Vec<u8>),
    Uuid(Uuid),
    List(Vec<WireValue>),
    Set(Vec<WireValue>),
    /// Key-unique pairs; uniqueness is enforced when decoding.
    Map(Vec<(WireValue, WireValue)>),
}

impl WireValue {
    /// A short description of the value's own shape, for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::Byte(_) => "byte",
            WireValue::Int32(_) => "int32",
            WireValue::Int64(_) => "int64",
            WireValue::Float32(_) => "float32",
            WireValue::Float64(_) => "float64",
            WireValue::Text(_) => "string",
            WireValue::Inet(_) => "inet",
            WireValue::Timestamp(_) => "timestamp",
            WireValue::Blob(_) => "blob",
            WireValue::Uuid(_) => "uuid",
            WireValue::List(_) => "list",
            WireValue::Set(_) => "set",
            WireValue::Map(_) => "map",
        }
    }

    /// True for the absence marker.
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self { WireValue::Text(v.to_string()) }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self { WireValue::Text(v) }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self { WireValue::Bool(v) }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self { WireValue::Int32(v) }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self { WireValue::Int64(v) }
}

impl From<Uuid> for WireValue {
    fn from(v: Uuid) -> Self { WireValue::Uuid(v) }
}
