use indexmap::IndexMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    io::{WireRead, WireWrite},
    protocol::MAX_STRING_SIZE,
    types::Type,
    values::Value,
    Error, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockInfo {
    pub is_overflows: bool,
    pub bucket_num: i32,
}

impl Default for BlockInfo {
    fn default() -> Self {
        BlockInfo {
            is_overflows: false,
            bucket_num: -1,
        }
    }
}

impl BlockInfo {
    /// Tag sequence: `field_num` varUInt then value, terminated by 0.
    pub async fn read<R: WireRead>(reader: &mut R) -> Result<Self> {
        let mut new = Self::default();
        loop {
            let field_num = reader.read_var_uint().await?;
            match field_num {
                0 => break,
                1 => {
                    new.is_overflows = reader.read_u8().await? != 0;
                }
                2 => {
                    new.bucket_num = reader.read_i32_le().await?;
                }
                field_num => {
                    return Err(Error::MalformedFrame(format!(
                        "unknown block info field number: {field_num}"
                    )));
                }
            }
        }
        Ok(new)
    }

    pub async fn write<W: WireWrite>(&self, writer: &mut W) -> Result<()> {
        writer.write_var_uint(1).await?;
        writer.write_u8(self.is_overflows as u8).await?;
        writer.write_var_uint(2).await?;
        writer.write_i32_le(self.bucket_num).await?;
        writer.write_var_uint(0).await?;
        Ok(())
    }
}

/// A columnar batch of rows. Column names are unique and every column holds
/// exactly `rows` values. A sample header is a block with zero rows that
/// still carries the full schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub info: BlockInfo,
    pub rows: u64,
    pub column_types: IndexMap<String, Type>,
    pub column_data: IndexMap<String, Vec<Value>>,
}

pub struct BlockRowIter<'a> {
    block: &'a Block,
    row: u64,
}

impl<'a> Iterator for BlockRowIter<'a> {
    type Item = Vec<(&'a str, &'a Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.block.rows {
            return None;
        }
        let mut out = Vec::with_capacity(self.block.column_data.len());
        for (name, values) in self.block.column_data.iter() {
            out.push((&**name, values.get(self.row as usize)?));
        }
        self.row += 1;
        Some(out)
    }
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, enforcing unique names and the uniform row count.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        type_: Type,
        values: Vec<Value>,
    ) -> Result<()> {
        let name = name.into();
        if self.column_types.contains_key(&name) {
            return Err(Error::ProtocolViolation(format!(
                "duplicate column name '{name}'"
            )));
        }
        if !self.column_types.is_empty() && values.len() as u64 != self.rows {
            return Err(Error::ProtocolViolation(format!(
                "column '{name}' has {} values, block has {} rows",
                values.len(),
                self.rows
            )));
        }
        self.rows = values.len() as u64;
        self.column_types.insert(name.clone(), type_);
        self.column_data.insert(name, values);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_count(&self) -> usize {
        self.column_types.len()
    }

    pub fn iter_rows(&self) -> BlockRowIter<'_> {
        BlockRowIter { block: self, row: 0 }
    }

    /// One column's values by name.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_data.get(name).map(|v| &v[..])
    }

    /// Reads the columnar body: counts, then per column name, descriptor and
    /// bulk data. The caller has already consumed table name and block info.
    pub async fn read_body<R: WireRead>(reader: &mut R, info: BlockInfo) -> Result<Self> {
        let columns = reader.read_var_uint().await?;
        let rows = reader.read_var_uint().await?;
        if columns as usize > MAX_STRING_SIZE {
            return Err(Error::MalformedFrame(format!(
                "block of {columns} columns too large"
            )));
        }
        let mut block = Block {
            info,
            rows,
            column_types: IndexMap::new(),
            column_data: IndexMap::new(),
        };
        for _ in 0..columns {
            let name = reader.read_utf8_string().await?;
            let type_name = reader.read_utf8_string().await?;
            let type_ = Type::parse_cached(&type_name)?;
            let row_data = if rows > 0 {
                type_.deserialize_column(reader, rows as usize).await?
            } else {
                vec![]
            };
            if block.column_types.insert(name.clone(), type_).is_some() {
                return Err(Error::MalformedFrame(format!(
                    "duplicate column name '{name}' in block"
                )));
            }
            block.column_data.insert(name, row_data);
        }
        Ok(block)
    }

    /// Mirror of [`Block::read_body`].
    pub async fn write_body<W: WireWrite>(&self, writer: &mut W) -> Result<()> {
        writer.write_var_uint(self.column_types.len() as u64).await?;
        writer.write_var_uint(self.rows).await?;
        for (name, type_) in &self.column_types {
            let data = self.column_data.get(name).ok_or_else(|| {
                Error::ProtocolViolation(format!("column '{name}' has no data"))
            })?;
            if data.len() as u64 != self.rows {
                return Err(Error::ProtocolViolation(format!(
                    "column '{name}' has {} values, block has {} rows",
                    data.len(),
                    self.rows
                )));
            }
            writer.write_string(name).await?;
            writer.write_string(type_.to_string()).await?;
            if self.rows > 0 {
                type_.serialize_column(&data[..], writer).await?;
            }
        }
        Ok(())
    }
}
