use tokio::io::AsyncWriteExt;

use crate::{io::WireWrite, values::Value, Result};

use super::super::{Serializer, Type};

pub struct NullableSerializer;

impl Serializer for NullableSerializer {
    async fn write<W: WireWrite>(type_: &Type, values: &[Value], writer: &mut W) -> Result<()> {
        // null map first: 1 = null, 0 = present
        for value in values {
            let mask = matches!(value, Value::Null) as u8;
            writer.write_u8(mask).await?;
        }
        // inner bulk covers every row; null slots carry the inner default
        type_.strip_null().serialize_column(values, writer).await
    }
}
