use tokio::io::AsyncWriteExt;

use crate::{io::WireWrite, values::Value, Error, Result};

use super::super::{Serializer, Type};

pub struct StringSerializer;

async fn emit_bytes<W: WireWrite>(type_: &Type, bytes: &[u8], writer: &mut W) -> Result<()> {
    if let Type::FixedString(n) = type_ {
        // right-pad with NUL up to the fixed width
        if bytes.len() > *n {
            return Err(Error::TypeMismatch(format!(
                "string of {} bytes does not fit {type_}",
                bytes.len()
            )));
        }
        writer.write_all(bytes).await?;
        for _ in bytes.len()..*n {
            writer.write_u8(0).await?;
        }
    } else {
        writer.write_string(bytes).await?;
    }
    Ok(())
}

impl Serializer for StringSerializer {
    async fn write<W: WireWrite>(type_: &Type, values: &[Value], writer: &mut W) -> Result<()> {
        for value in values {
            match value.justify_null(type_).as_ref() {
                Value::String(bytes) => emit_bytes(type_, bytes, writer).await?,
                value => {
                    return Err(Error::TypeMismatch(format!(
                        "cannot serialize {value:?} as {type_}"
                    )))
                }
            }
        }
        Ok(())
    }
}
