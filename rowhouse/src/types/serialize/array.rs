use tokio::io::AsyncWriteExt;

use crate::{io::WireWrite, values::Value, Error, Result};

use super::super::{Serializer, Type};

pub struct ArraySerializer;

impl Serializer for ArraySerializer {
    async fn write<W: WireWrite>(type_: &Type, values: &[Value], writer: &mut W) -> Result<()> {
        let inner_type = type_.unwrap_array();
        // offsets are cumulative inner counts, one u64 per row
        let mut offset = 0u64;
        for value in values {
            match value {
                Value::Array(items) => {
                    offset += items.len() as u64;
                    writer.write_u64_le(offset).await?;
                }
                value => {
                    return Err(Error::TypeMismatch(format!(
                        "cannot serialize {value:?} as {type_}"
                    )))
                }
            }
        }
        let flattened: Vec<Value> = values
            .iter()
            .flat_map(|value| value.unwrap_array_ref().iter().cloned())
            .collect();
        inner_type.serialize_column(&flattened, writer).await
    }
}
