use tokio::io::AsyncReadExt;

use crate::{io::WireRead, values::Value, Error, Result};

use super::super::{Deserializer, Type};

pub struct ArrayDeserializer;

impl Deserializer for ArrayDeserializer {
    async fn read<R: WireRead>(type_: &Type, reader: &mut R, rows: usize) -> Result<Vec<Value>> {
        let inner_type = type_.unwrap_array();
        let mut offsets = Vec::with_capacity(rows);
        let mut last = 0u64;
        for _ in 0..rows {
            let offset = reader.read_u64_le().await?;
            if offset < last {
                return Err(Error::MalformedFrame(format!(
                    "array offset {offset} decreases below {last}"
                )));
            }
            offsets.push(offset);
            last = offset;
        }
        let mut items = inner_type.deserialize_column(reader, last as usize).await?;

        let mut out = Vec::with_capacity(rows);
        for i in (0..rows).rev() {
            let start = if i == 0 { 0 } else { offsets[i - 1] as usize };
            out.push(Value::Array(items.split_off(start)));
        }
        out.reverse();
        Ok(out)
    }
}
