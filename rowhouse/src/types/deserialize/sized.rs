use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::{io::WireRead, values::Value, Date, DateTime, Error, Result};

use super::super::{Deserializer, Type};

pub struct SizedDeserializer;

fn enum_name<V: Copy + Eq + std::fmt::Display>(
    entries: &[(String, V)],
    wanted: V,
    type_: &Type,
) -> Result<String> {
    entries
        .iter()
        .find(|(_, value)| *value == wanted)
        .map(|(name, _)| name.clone())
        .ok_or_else(|| Error::DomainError(format!("no member of {type_} = {wanted}")))
}

impl Deserializer for SizedDeserializer {
    async fn read<R: WireRead>(type_: &Type, reader: &mut R, rows: usize) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            out.push(match type_ {
                Type::Int8 => Value::Int8(reader.read_i8().await?),
                Type::Int16 => Value::Int16(reader.read_i16_le().await?),
                Type::Int32 => Value::Int32(reader.read_i32_le().await?),
                Type::Int64 => Value::Int64(reader.read_i64_le().await?),
                Type::UInt8 => Value::UInt8(reader.read_u8().await?),
                Type::UInt16 => Value::UInt16(reader.read_u16_le().await?),
                Type::UInt32 => Value::UInt32(reader.read_u32_le().await?),
                Type::UInt64 => Value::UInt64(reader.read_u64_le().await?),
                Type::Float32 => Value::Float32(f32::from_bits(reader.read_u32_le().await?)),
                Type::Float64 => Value::Float64(f64::from_bits(reader.read_u64_le().await?)),
                Type::Uuid => Value::Uuid({
                    let n1 = reader.read_u64_le().await?;
                    let n2 = reader.read_u64_le().await?;
                    Uuid::from_u128(((n1 as u128) << 64) | n2 as u128)
                }),
                Type::Date => Value::Date(Date(reader.read_u16_le().await?)),
                Type::DateTime(tz) => Value::DateTime(DateTime(*tz, reader.read_i32_le().await?)),
                Type::Enum8(entries) => {
                    Value::Enum8(enum_name(entries, reader.read_i8().await?, type_)?)
                }
                Type::Enum16(entries) => {
                    Value::Enum16(enum_name(entries, reader.read_i16_le().await?, type_)?)
                }
                _ => {
                    return Err(Error::MalformedFrame(format!(
                        "sized codec cannot read {type_}"
                    )))
                }
            });
        }
        Ok(out)
    }
}
