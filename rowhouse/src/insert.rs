use crate::{block::Block, Error, Result, Value};

/// Rows drawn per block when streaming an insert.
pub const DEFAULT_INSERT_BATCH: usize = 8192;

/// Upstream source of insert rows, drawn on demand by the input adapter.
/// Yielding `None` ends the insert.
pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

/// Any in-memory collection of rows works as a source.
pub struct VecRowSource {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl From<Vec<Vec<Value>>> for VecRowSource {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        VecRowSource {
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for VecRowSource {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }
}

/// Draws up to `batch_size` rows from `source` and shapes them into a block
/// matching the sample header's schema: same column names and types, same
/// order. Returns `None` once the source is exhausted.
pub fn next_batch(
    header: &Block,
    source: &mut impl RowSource,
    batch_size: usize,
    rows_consumed: u64,
) -> Result<Option<Block>> {
    let mut columns: Vec<Vec<Value>> = (0..header.column_count())
        .map(|_| Vec::with_capacity(batch_size.min(1024)))
        .collect();
    let mut rows = 0usize;
    while rows < batch_size {
        let Some(row) = source.next_row()? else {
            break;
        };
        let row_index = rows_consumed + rows as u64;
        if row.len() != header.column_count() {
            return Err(Error::TypeMismatch(format!(
                "row {row_index} has {} values, header has {} columns",
                row.len(),
                header.column_count()
            )));
        }
        for (column_index, (value, (_, type_))) in
            row.into_iter().zip(header.column_types.iter()).enumerate()
        {
            let coerced = type_.coerce_value(value).map_err(|e| {
                Error::TypeMismatch(format!("column {column_index} row {row_index}: {e}"))
            })?;
            columns[column_index].push(coerced);
        }
        rows += 1;
    }
    if rows == 0 {
        return Ok(None);
    }

    let mut block = Block::new();
    for ((name, type_), values) in header.column_types.iter().zip(columns) {
        block.add_column(name.clone(), type_.clone(), values)?;
    }
    Ok(Some(block))
}
