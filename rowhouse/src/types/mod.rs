use std::collections::HashMap;
use std::future::Future;
use std::sync::{OnceLock, RwLock};
use std::{fmt::Display, str::FromStr};

pub use chrono_tz::Tz;
use futures_util::FutureExt;
use uuid::Uuid;

mod deserialize;
mod lexer;
mod parser;
mod serialize;

pub(crate) use parser::parse_untyped_literal;

use crate::{
    io::{WireRead, WireWrite},
    protocol::MAX_STRING_SIZE,
    values::Value,
    Date, DateTime, Error, Result,
};

/// A raw column type, parsed from the server's textual descriptor.
///
/// Composite types own their children; instances are immutable and freely
/// cloned. [`Type::parse_cached`] interns descriptors process-wide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int8,
    Int16,
    Int32,
    Int64,

    UInt8,
    UInt16,
    UInt32,
    UInt64,

    Float32,
    Float64,

    String,
    FixedString(usize),

    Uuid,

    Date,
    DateTime(Tz),

    Enum8(Vec<(String, i8)>),
    Enum16(Vec<(String, i16)>),

    Array(Box<Type>),

    Nullable(Box<Type>),

    Tuple(Vec<Type>),

    /// Same wire shape as `Array(Tuple(…))`, with named members.
    Nested(Vec<(String, Type)>),
}

/// External SQL type tag a column type maps to, for host database interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    VarChar,
    Char,
    Date,
    Timestamp,
    Array,
    Struct,
}

impl SqlType {
    /// The JDBC-compatible integer code of this tag.
    pub fn code(&self) -> i32 {
        match self {
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::VarChar => 12,
            SqlType::Char => 1,
            SqlType::Date => 91,
            SqlType::Timestamp => 93,
            SqlType::Array => 2003,
            SqlType::Struct => 2002,
        }
    }
}

/// The `Array(Tuple(…))` type a `Nested` column has on the wire.
fn nested_wire_type(fields: &[(String, Type)]) -> Type {
    Type::Array(Box::new(Type::Tuple(
        fields.iter().map(|(_, type_)| type_.clone()).collect(),
    )))
}

fn type_cache() -> &'static RwLock<HashMap<String, Type>> {
    static CACHE: OnceLock<RwLock<HashMap<String, Type>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

impl Type {
    /// Parses a descriptor through the process-wide interning cache. The
    /// first use of a given descriptor string inserts atomically; later uses
    /// are lock-and-clone.
    pub fn parse_cached(descriptor: &str) -> Result<Self> {
        if let Some(cached) = type_cache().read().unwrap().get(descriptor) {
            return Ok(cached.clone());
        }
        let parsed = descriptor.parse::<Type>()?;
        type_cache()
            .write()
            .unwrap()
            .entry(descriptor.to_string())
            .or_insert_with(|| parsed.clone());
        Ok(parsed)
    }

    pub fn unwrap_array(&self) -> &Type {
        match self {
            Type::Array(x) => x,
            _ => unimplemented!("expected array type"),
        }
    }

    pub fn unwrap_tuple(&self) -> &[Type] {
        match self {
            Type::Tuple(x) => &x[..],
            _ => unimplemented!("expected tuple type"),
        }
    }

    pub fn strip_null(&self) -> &Type {
        match self {
            Type::Nullable(x) => x,
            _ => self,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// Attribute names of a composite record type: `_1…_k` for tuples,
    /// declared member names for `Nested`.
    pub fn member_names(&self) -> Option<Vec<String>> {
        match self {
            Type::Tuple(members) => {
                Some((1..=members.len()).map(|i| format!("_{i}")).collect())
            }
            Type::Nested(fields) => Some(fields.iter().map(|(name, _)| name.clone()).collect()),
            _ => None,
        }
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Type::Int8 | Type::UInt8 => SqlType::TinyInt,
            Type::Int16 | Type::UInt16 => SqlType::SmallInt,
            Type::Int32 | Type::UInt32 => SqlType::Integer,
            Type::Int64 | Type::UInt64 => SqlType::BigInt,
            Type::Float32 => SqlType::Real,
            Type::Float64 => SqlType::Double,
            Type::String | Type::Uuid | Type::Enum8(_) | Type::Enum16(_) => SqlType::VarChar,
            Type::FixedString(_) => SqlType::Char,
            Type::Date => SqlType::Date,
            Type::DateTime(_) => SqlType::Timestamp,
            Type::Array(_) | Type::Nested(_) => SqlType::Array,
            Type::Tuple(_) => SqlType::Struct,
            Type::Nullable(inner) => inner.sql_type(),
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            Type::Int8 => Value::Int8(0),
            Type::Int16 => Value::Int16(0),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::UInt8 => Value::UInt8(0),
            Type::UInt16 => Value::UInt16(0),
            Type::UInt32 => Value::UInt32(0),
            Type::UInt64 => Value::UInt64(0),
            Type::Float32 => Value::Float32(0.0),
            Type::Float64 => Value::Float64(0.0),
            Type::String => Value::String(vec![]),
            Type::FixedString(_) => Value::String(vec![]),
            Type::Uuid => Value::Uuid(Uuid::nil()),
            Type::Date => Value::Date(Date(0)),
            Type::DateTime(tz) => Value::DateTime(DateTime(*tz, 0)),
            Type::Enum8(entries) => Value::Enum8(entries[0].0.clone()),
            Type::Enum16(entries) => Value::Enum16(entries[0].0.clone()),
            Type::Array(_) => Value::Array(vec![]),
            Type::Nullable(_) => Value::Null,
            Type::Tuple(members) => {
                Value::Tuple(members.iter().map(|x| x.default_value()).collect())
            }
            Type::Nested(_) => Value::Array(vec![]),
        }
    }

    /// Structural constraints the server enforces on descriptors.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Type::FixedString(n) => {
                if *n == 0 {
                    return Err(Error::DomainError(
                        "FixedString length must be positive".to_string(),
                    ));
                }
            }
            Type::Enum8(entries) => {
                if entries.is_empty() {
                    return Err(Error::DomainError("empty Enum8".to_string()));
                }
            }
            Type::Enum16(entries) => {
                if entries.is_empty() {
                    return Err(Error::DomainError("empty Enum16".to_string()));
                }
            }
            Type::Array(inner) => inner.validate()?,
            Type::Nullable(inner) => match &**inner {
                Type::Array(_) | Type::Nullable(_) | Type::Tuple(_) | Type::Nested(_) => {
                    return Err(Error::DomainError(format!(
                        "Nullable cannot contain composite type '{inner}'"
                    )));
                }
                _ => inner.validate()?,
            },
            Type::Tuple(members) => {
                if members.is_empty() {
                    return Err(Error::DomainError("empty Tuple".to_string()));
                }
                for member in members {
                    member.validate()?;
                }
            }
            Type::Nested(fields) => {
                if fields.is_empty() {
                    return Err(Error::DomainError("empty Nested".to_string()));
                }
                for (_, field) in fields {
                    field.validate()?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    /// Coerces `value` into this type's logical value shape. Integers widen
    /// or narrow with range checks, enum members resolve by name or value,
    /// and date/time/uuid values parse from text literals.
    pub fn coerce_value(&self, value: Value) -> Result<Value> {
        fn int_to<T: TryFrom<i128>>(type_: &Type, i: i128) -> Result<T> {
            T::try_from(i)
                .map_err(|_| Error::DomainError(format!("value {i} out of range for {type_}")))
        }

        Ok(match (self, value) {
            (Type::Int8, v) if v.as_int().is_some() => {
                Value::Int8(int_to(self, v.as_int().unwrap())?)
            }
            (Type::Int16, v) if v.as_int().is_some() => {
                Value::Int16(int_to(self, v.as_int().unwrap())?)
            }
            (Type::Int32, v) if v.as_int().is_some() => {
                Value::Int32(int_to(self, v.as_int().unwrap())?)
            }
            (Type::Int64, v) if v.as_int().is_some() => {
                Value::Int64(int_to(self, v.as_int().unwrap())?)
            }
            (Type::UInt8, v) if v.as_int().is_some() => {
                Value::UInt8(int_to(self, v.as_int().unwrap())?)
            }
            (Type::UInt16, v) if v.as_int().is_some() => {
                Value::UInt16(int_to(self, v.as_int().unwrap())?)
            }
            (Type::UInt32, v) if v.as_int().is_some() => {
                Value::UInt32(int_to(self, v.as_int().unwrap())?)
            }
            (Type::UInt64, v) if v.as_int().is_some() => {
                Value::UInt64(int_to::<u64>(self, v.as_int().unwrap())?)
            }
            (Type::Float32, Value::Float32(x)) => Value::Float32(x),
            (Type::Float32, Value::Float64(x)) => Value::Float32(x as f32),
            (Type::Float32, v) if v.as_int().is_some() => {
                Value::Float32(v.as_int().unwrap() as f32)
            }
            (Type::Float64, Value::Float64(x)) => Value::Float64(x),
            (Type::Float64, Value::Float32(x)) => Value::Float64(x as f64),
            (Type::Float64, v) if v.as_int().is_some() => {
                Value::Float64(v.as_int().unwrap() as f64)
            }
            (Type::String, Value::String(bytes)) => Value::String(bytes),
            (Type::FixedString(n), Value::String(bytes)) => {
                if bytes.len() > *n {
                    return Err(Error::TypeMismatch(format!(
                        "string of {} bytes does not fit {self}",
                        bytes.len()
                    )));
                }
                Value::String(bytes)
            }
            (Type::Uuid, Value::Uuid(uuid)) => Value::Uuid(uuid),
            (Type::Uuid, Value::String(bytes)) => {
                let text = String::from_utf8(bytes)
                    .map_err(|_| Error::DomainError("invalid utf-8 in UUID literal".to_string()))?;
                Value::Uuid(
                    Uuid::parse_str(&text)
                        .map_err(|e| Error::DomainError(format!("invalid UUID '{text}': {e}")))?,
                )
            }
            (Type::Date, Value::Date(date)) => Value::Date(date),
            (Type::Date, v) if v.as_int().is_some() => {
                Value::Date(Date(int_to(self, v.as_int().unwrap())?))
            }
            (Type::Date, Value::String(bytes)) => {
                let text = String::from_utf8(bytes)
                    .map_err(|_| Error::DomainError("invalid utf-8 in date literal".to_string()))?;
                let date = chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map_err(|e| Error::DomainError(format!("invalid date '{text}': {e}")))?;
                Value::Date(Date::from(date))
            }
            (Type::DateTime(tz), Value::DateTime(dt)) => Value::DateTime(DateTime(*tz, dt.1)),
            (Type::DateTime(tz), v) if v.as_int().is_some() => {
                Value::DateTime(DateTime(*tz, int_to(self, v.as_int().unwrap())?))
            }
            (Type::DateTime(tz), Value::String(bytes)) => {
                let text = String::from_utf8(bytes).map_err(|_| {
                    Error::DomainError("invalid utf-8 in datetime literal".to_string())
                })?;
                let naive = chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
                    .map_err(|e| Error::DomainError(format!("invalid datetime '{text}': {e}")))?;
                Value::DateTime(DateTime(*tz, naive.and_utc().timestamp() as i32))
            }
            (Type::Enum8(entries), value) => {
                Value::Enum8(resolve_enum_member(self, entries, value)?)
            }
            (Type::Enum16(entries), value) => {
                Value::Enum16(resolve_enum_member(self, entries, value)?)
            }
            (Type::Nullable(_), Value::Null) => Value::Null,
            (Type::Nullable(inner), value) => inner.coerce_value(value)?,
            (Type::Array(inner), Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item| inner.coerce_value(item))
                    .collect::<Result<_>>()?,
            ),
            (Type::Tuple(members), Value::Tuple(items)) => {
                if members.len() != items.len() {
                    return Err(Error::TypeMismatch(format!(
                        "tuple of {} values does not fit {self}",
                        items.len()
                    )));
                }
                Value::Tuple(
                    members
                        .iter()
                        .zip(items)
                        .map(|(member, item)| member.coerce_value(item))
                        .collect::<Result<_>>()?,
                )
            }
            (Type::Nested(fields), value) => nested_wire_type(fields).coerce_value(value)?,
            (_, value) => {
                return Err(Error::TypeMismatch(format!(
                    "cannot use value {value:?} as {self}"
                )))
            }
        })
    }

    /// The text-quoted parse: a single SQL literal converted to this type's
    /// logical value. Used for client-side parameter substitution, never for
    /// blocks.
    pub fn parse_literal(&self, raw: &str) -> Result<Value> {
        self.coerce_value(parser::parse_untyped_literal(raw.trim())?)
    }
}

fn resolve_enum_member<V: Copy + Eq + Into<i128> + TryFrom<i128>>(
    type_: &Type,
    entries: &[(String, V)],
    value: Value,
) -> Result<String> {
    let name = match value {
        Value::Enum8(name) => name,
        Value::Enum16(name) => name,
        Value::String(bytes) => String::from_utf8(bytes)
            .map_err(|_| Error::DomainError("invalid utf-8 in enum literal".to_string()))?,
        v if v.as_int().is_some() => {
            let wanted = v.as_int().unwrap();
            return entries
                .iter()
                .find(|(_, value)| (*value).into() == wanted)
                .map(|(name, _)| name.clone())
                .ok_or_else(|| Error::DomainError(format!("no member of {type_} = {wanted}")));
        }
        v => {
            return Err(Error::TypeMismatch(format!(
                "cannot use value {v:?} as {type_}"
            )))
        }
    };
    if !entries.iter().any(|(member, _)| member == &name) {
        return Err(Error::DomainError(format!(
            "'{name}' is not a member of {type_}"
        )));
    }
    Ok(name)
}

impl FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_type_descriptor(s)
    }
}

fn escape_enum_name(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int8 => write!(f, "Int8"),
            Type::Int16 => write!(f, "Int16"),
            Type::Int32 => write!(f, "Int32"),
            Type::Int64 => write!(f, "Int64"),
            Type::UInt8 => write!(f, "UInt8"),
            Type::UInt16 => write!(f, "UInt16"),
            Type::UInt32 => write!(f, "UInt32"),
            Type::UInt64 => write!(f, "UInt64"),
            Type::Float32 => write!(f, "Float32"),
            Type::Float64 => write!(f, "Float64"),
            Type::String => write!(f, "String"),
            Type::FixedString(n) => write!(f, "FixedString({n})"),
            Type::Uuid => write!(f, "UUID"),
            Type::Date => write!(f, "Date"),
            Type::DateTime(tz) => write!(f, "DateTime('{tz}')"),
            Type::Enum8(entries) => write!(
                f,
                "Enum8({})",
                entries
                    .iter()
                    .map(|(name, value)| format!("'{}' = {}", escape_enum_name(name), value))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::Enum16(entries) => write!(
                f,
                "Enum16({})",
                entries
                    .iter()
                    .map(|(name, value)| format!("'{}' = {}", escape_enum_name(name), value))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::Array(inner) => write!(f, "Array({inner})"),
            Type::Nullable(inner) => write!(f, "Nullable({inner})"),
            Type::Tuple(members) => write!(
                f,
                "Tuple({})",
                members
                    .iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::Nested(fields) => write!(
                f,
                "Nested({})",
                fields
                    .iter()
                    .map(|(name, type_)| format!("{name} {type_}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl Type {
    /// Bulk deserialisation of one column of `rows` values.
    pub(crate) fn deserialize_column<'a, R: WireRead>(
        &'a self,
        reader: &'a mut R,
        rows: usize,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send + 'a {
        use deserialize::*;

        async move {
            if rows > MAX_STRING_SIZE {
                return Err(Error::MalformedFrame(format!(
                    "column of {rows} rows too large"
                )));
            }
            match self {
                Type::Int8
                | Type::Int16
                | Type::Int32
                | Type::Int64
                | Type::UInt8
                | Type::UInt16
                | Type::UInt32
                | Type::UInt64
                | Type::Float32
                | Type::Float64
                | Type::Uuid
                | Type::Date
                | Type::DateTime(_)
                | Type::Enum8(_)
                | Type::Enum16(_) => sized::SizedDeserializer::read(self, reader, rows).await,

                Type::String | Type::FixedString(_) => {
                    string::StringDeserializer::read(self, reader, rows).await
                }

                Type::Array(_) => array::ArrayDeserializer::read(self, reader, rows).await,
                Type::Nullable(_) => nullable::NullableDeserializer::read(self, reader, rows).await,
                Type::Tuple(_) => tuple::TupleDeserializer::read(self, reader, rows).await,
                Type::Nested(fields) => {
                    let equivalent = nested_wire_type(fields);
                    equivalent.deserialize_column(reader, rows).await
                }
            }
        }
        .boxed()
    }

    /// Bulk serialisation of one column. `values` must all fit this type.
    pub(crate) fn serialize_column<'a, W: WireWrite>(
        &'a self,
        values: &'a [Value],
        writer: &'a mut W,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        use serialize::*;

        async move {
            match self {
                Type::Int8
                | Type::Int16
                | Type::Int32
                | Type::Int64
                | Type::UInt8
                | Type::UInt16
                | Type::UInt32
                | Type::UInt64
                | Type::Float32
                | Type::Float64
                | Type::Uuid
                | Type::Date
                | Type::DateTime(_)
                | Type::Enum8(_)
                | Type::Enum16(_) => sized::SizedSerializer::write(self, values, writer).await,

                Type::String | Type::FixedString(_) => {
                    string::StringSerializer::write(self, values, writer).await
                }

                Type::Array(_) => array::ArraySerializer::write(self, values, writer).await,
                Type::Nullable(_) => nullable::NullableSerializer::write(self, values, writer).await,
                Type::Tuple(_) => tuple::TupleSerializer::write(self, values, writer).await,
                Type::Nested(fields) => {
                    let equivalent = nested_wire_type(fields);
                    equivalent.serialize_column(values, writer).await
                }
            }
        }
        .boxed()
    }

    /// Single-value serialisation: byte-identical to a bulk column of one.
    pub async fn serialize_value<W: WireWrite>(
        &self,
        value: &Value,
        writer: &mut W,
    ) -> Result<()> {
        self.serialize_column(std::slice::from_ref(value), writer)
            .await
    }

    /// Single-value deserialisation, mirroring [`Type::serialize_value`].
    pub async fn deserialize_value<R: WireRead>(&self, reader: &mut R) -> Result<Value> {
        let mut column = self.deserialize_column(reader, 1).await?;
        column
            .pop()
            .ok_or_else(|| Error::MalformedFrame("empty single-value column".to_string()))
    }
}

/// Per-class bulk column reader.
pub(crate) trait Deserializer {
    fn read<R: WireRead>(
        type_: &Type,
        reader: &mut R,
        rows: usize,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;
}

/// Per-class bulk column writer.
pub(crate) trait Serializer {
    fn write<W: WireWrite>(
        type_: &Type,
        values: &[Value],
        writer: &mut W,
    ) -> impl Future<Output = Result<()>> + Send;
}
