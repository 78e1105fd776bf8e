use std::borrow::Cow;

use uuid::Uuid;

use crate::types::Type;

mod date;

pub use date::*;

/// A raw dynamically-typed column value.
///
/// Types are not strictly preserved: `String` and `FixedString` columns both
/// carry `Value::String`, and a `Nested` column carries the same
/// array-of-tuples shape it has on the wire.
#[derive(Debug, Clone)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),

    Float32(f32),
    Float64(f64),

    /// Raw bytes; not required to be valid UTF-8 (`FixedString` keeps its
    /// NUL padding).
    String(Vec<u8>),

    Uuid(Uuid),

    Date(Date),
    DateTime(DateTime),

    /// Symbolic enum member name; the column type owns the name/value map.
    Enum8(String),
    Enum16(String),

    Array(Vec<Value>),
    Tuple(Vec<Value>),

    Null,
}

impl Value {
    /// Shorthand for a `Value::String` from text.
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into().into_bytes())
    }

    pub(crate) fn unwrap_array_ref(&self) -> &[Value] {
        match self {
            Value::Array(a) => &a[..],
            _ => unimplemented!("expected array value"),
        }
    }

    /// Replaces a null placeholder with the column's default so the inner
    /// codec of a `Nullable` column always has a concrete value to emit.
    pub(crate) fn justify_null<'a>(&'a self, type_: &Type) -> Cow<'a, Value> {
        if matches!(self, Value::Null) {
            Cow::Owned(type_.default_value())
        } else {
            Cow::Borrowed(self)
        }
    }

    /// Widened integer view, when this value is any integer variant.
    pub(crate) fn as_int(&self) -> Option<i128> {
        Some(match self {
            Value::Int8(x) => *x as i128,
            Value::Int16(x) => *x as i128,
            Value::Int32(x) => *x as i128,
            Value::Int64(x) => *x as i128,
            Value::UInt8(x) => *x as i128,
            Value::UInt16(x) => *x as i128,
            Value::UInt32(x) => *x as i128,
            Value::UInt64(x) => *x as i128,
            _ => return None,
        })
    }

    /// UTF-8 view of a string value, if it is one and decodes cleanly.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

// Floats compare bitwise so round-trip tests hold for NaN and signed zero.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt8(a), UInt8(b)) => a == b,
            (UInt16(a), UInt16(b)) => a == b,
            (UInt32(a), UInt32(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (Float32(a), Float32(b)) => a.to_bits() == b.to_bits(),
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Enum8(a), Enum8(b)) => a == b,
            (Enum16(a), Enum16(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (Null, Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
        assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_eq!(Value::Float32(1.5), Value::Float32(1.5));
    }

    #[test]
    fn as_int_covers_all_integer_widths() {
        assert_eq!(Value::Int8(-5).as_int(), Some(-5));
        assert_eq!(Value::UInt64(u64::MAX).as_int(), Some(u64::MAX as i128));
        assert_eq!(Value::string("x").as_int(), None);
    }
}
