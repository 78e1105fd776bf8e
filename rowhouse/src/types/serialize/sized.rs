use tokio::io::AsyncWriteExt;

use crate::{io::WireWrite, values::Value, Error, Result};

use super::super::{Serializer, Type};

/// Fixed-width scalars, written one after another.
pub struct SizedSerializer;

fn enum_index<V: Copy>(entries: &[(String, V)], name: &str, type_: &Type) -> Result<V> {
    entries
        .iter()
        .find(|(member, _)| member == name)
        .map(|(_, value)| *value)
        .ok_or_else(|| Error::DomainError(format!("'{name}' is not a member of {type_}")))
}

impl Serializer for SizedSerializer {
    async fn write<W: WireWrite>(type_: &Type, values: &[Value], writer: &mut W) -> Result<()> {
        for value in values {
            match (type_, value.justify_null(type_).as_ref()) {
                (Type::Int8, Value::Int8(x)) => writer.write_i8(*x).await?,
                (Type::Int16, Value::Int16(x)) => writer.write_i16_le(*x).await?,
                (Type::Int32, Value::Int32(x)) => writer.write_i32_le(*x).await?,
                (Type::Int64, Value::Int64(x)) => writer.write_i64_le(*x).await?,
                (Type::UInt8, Value::UInt8(x)) => writer.write_u8(*x).await?,
                (Type::UInt16, Value::UInt16(x)) => writer.write_u16_le(*x).await?,
                (Type::UInt32, Value::UInt32(x)) => writer.write_u32_le(*x).await?,
                (Type::UInt64, Value::UInt64(x)) => writer.write_u64_le(*x).await?,
                (Type::Float32, Value::Float32(x)) => writer.write_u32_le(x.to_bits()).await?,
                (Type::Float64, Value::Float64(x)) => writer.write_u64_le(x.to_bits()).await?,
                (Type::Uuid, Value::Uuid(x)) => {
                    let n = x.as_u128();
                    writer.write_u64_le((n >> 64) as u64).await?;
                    writer.write_u64_le(n as u64).await?;
                }
                (Type::Date, Value::Date(x)) => writer.write_u16_le(x.0).await?,
                (Type::DateTime(_), Value::DateTime(x)) => writer.write_i32_le(x.1).await?,
                (Type::Enum8(entries), Value::Enum8(name)) => {
                    writer.write_i8(enum_index(entries, name, type_)?).await?
                }
                (Type::Enum16(entries), Value::Enum16(name)) => {
                    writer
                        .write_i16_le(enum_index(entries, name, type_)?)
                        .await?
                }
                (type_, value) => {
                    return Err(Error::TypeMismatch(format!(
                        "cannot serialize {value:?} as {type_}"
                    )))
                }
            }
        }
        Ok(())
    }
}
