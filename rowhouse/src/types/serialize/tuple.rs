use crate::{io::WireWrite, values::Value, Error, Result};

use super::super::{Serializer, Type};

pub struct TupleSerializer;

impl Serializer for TupleSerializer {
    async fn write<W: WireWrite>(type_: &Type, values: &[Value], writer: &mut W) -> Result<()> {
        let member_types = type_.unwrap_tuple();
        // one independent bulk segment per member, no length prefix
        for (index, member_type) in member_types.iter().enumerate() {
            let member_column: Vec<Value> = values
                .iter()
                .map(|value| match value {
                    Value::Tuple(items) if items.len() == member_types.len() => {
                        Ok(items[index].clone())
                    }
                    value => Err(Error::TypeMismatch(format!(
                        "cannot serialize {value:?} as {type_}"
                    ))),
                })
                .collect::<Result<_>>()?;
            member_type.serialize_column(&member_column, writer).await?;
        }
        Ok(())
    }
}
