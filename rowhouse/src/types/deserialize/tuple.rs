use crate::{io::WireRead, values::Value, Error, Result};

use super::super::{Deserializer, Type};

pub struct TupleDeserializer;

impl Deserializer for TupleDeserializer {
    async fn read<R: WireRead>(type_: &Type, reader: &mut R, rows: usize) -> Result<Vec<Value>> {
        let member_types = type_.unwrap_tuple();
        let mut member_columns = Vec::with_capacity(member_types.len());
        for member_type in member_types {
            let mut column = member_type.deserialize_column(reader, rows).await?;
            column.reverse();
            member_columns.push(column);
        }

        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            let record = member_columns
                .iter_mut()
                .map(|column| column.pop())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    Error::MalformedFrame("tuple member column too short".to_string())
                })?;
            out.push(Value::Tuple(record));
        }
        Ok(out)
    }
}
