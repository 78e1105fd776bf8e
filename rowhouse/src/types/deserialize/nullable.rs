use crate::{io::WireRead, values::Value, Result};

use super::super::{Deserializer, Type};

pub struct NullableDeserializer;

impl Deserializer for NullableDeserializer {
    async fn read<R: WireRead>(type_: &Type, reader: &mut R, rows: usize) -> Result<Vec<Value>> {
        // if mask[i] == 0, the item is present
        let mask = reader.read_fixed(rows).await?;

        let mut out = type_.strip_null().deserialize_column(reader, rows).await?;
        for (i, mask) in mask.iter().enumerate() {
            if *mask != 0 {
                out[i] = Value::Null;
            }
        }
        Ok(out)
    }
}
