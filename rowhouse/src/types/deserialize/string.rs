use crate::{io::WireRead, values::Value, Error, Result};

use super::super::{Deserializer, Type};

pub struct StringDeserializer;

impl Deserializer for StringDeserializer {
    async fn read<R: WireRead>(type_: &Type, reader: &mut R, rows: usize) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            out.push(match type_ {
                Type::String => Value::String(reader.read_binary().await?),
                // fixed-width bytes are returned verbatim, NUL padding intact
                Type::FixedString(n) => Value::String(reader.read_fixed(*n).await?),
                _ => {
                    return Err(Error::MalformedFrame(format!(
                        "string codec cannot read {type_}"
                    )))
                }
            });
        }
        Ok(out)
    }
}
