//! catalog/schema — определения таблиц/колонок и кодек записей каталога.
//!
//! TableEntry (LE):
//! [table_id u32][root_page u32][name_len u16][name][sql_len u32][sql]
//!
//! ColumnEntry (LE):
//! [table_id u32][column_id u32][ordinal u32][type u8][length u32]
//! [constraint_mask u8][name_len u16][name][default_len u16][default]
//!
//! Маска ограничений: 0x01 not_null, 0x02 primary_key, 0x04 unique,
//! 0x08 has_default.

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{DbError, DbResult, ErrorKind};
use crate::types::{ColumnId, DataType, PageId, TableId};

const NOT_NULL_MASK: u8 = 0x01;
const PRIMARY_KEY_MASK: u8 = 0x02;
const UNIQUE_MASK: u8 = 0x04;
const DEFAULT_MASK: u8 = 0x08;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnConstraint {
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub has_default: bool,
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    /// Объявленная длина для VARCHAR(n); 0 — не ограничена.
    pub length: u32,
    pub constraint: ColumnConstraint,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCatalogEntry {
    pub table_id: TableId,
    pub root_page_id: PageId,
    pub name: String,
    pub create_sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCatalogEntry {
    pub table_id: TableId,
    pub column_id: ColumnId,
    pub ordinal_position: u32,
    pub column: ColumnDef,
}

pub fn encode_constraints(constraint: &ColumnConstraint) -> u8 {
    let mut mask = 0u8;
    if constraint.not_null {
        mask |= NOT_NULL_MASK;
    }
    if constraint.primary_key {
        mask |= PRIMARY_KEY_MASK;
    }
    if constraint.unique {
        mask |= UNIQUE_MASK;
    }
    if constraint.has_default {
        mask |= DEFAULT_MASK;
    }
    mask
}

pub fn decode_constraints(mask: u8, default_literal: String) -> ColumnConstraint {
    let has_default = (mask & DEFAULT_MASK) != 0;
    ColumnConstraint {
        not_null: (mask & NOT_NULL_MASK) != 0,
        primary_key: (mask & PRIMARY_KEY_MASK) != 0,
        unique: (mask & UNIQUE_MASK) != 0,
        has_default,
        default_value: if has_default { default_literal } else { String::new() },
    }
}

// ---- низкоуровневые читалки с контролем обрезки ----

fn truncated(what: &str) -> DbError {
    DbError::new(ErrorKind::InvalidRecordFormat, "catalog entry truncated").with_context(what.to_string())
}

fn read_u16(data: &[u8], pos: &mut usize, what: &str) -> DbResult<u16> {
    if *pos + 2 > data.len() {
        return Err(truncated(what));
    }
    let v = LittleEndian::read_u16(&data[*pos..*pos + 2]);
    *pos += 2;
    Ok(v)
}

fn read_u32(data: &[u8], pos: &mut usize, what: &str) -> DbResult<u32> {
    if *pos + 4 > data.len() {
        return Err(truncated(what));
    }
    let v = LittleEndian::read_u32(&data[*pos..*pos + 4]);
    *pos += 4;
    Ok(v)
}

fn read_u8(data: &[u8], pos: &mut usize, what: &str) -> DbResult<u8> {
    if *pos >= data.len() {
        return Err(truncated(what));
    }
    let v = data[*pos];
    *pos += 1;
    Ok(v)
}

fn read_string(data: &[u8], pos: &mut usize, len: usize, what: &str) -> DbResult<String> {
    if *pos + len > data.len() {
        return Err(truncated(what));
    }
    let s = String::from_utf8_lossy(&data[*pos..*pos + len]).into_owned();
    *pos += len;
    Ok(s)
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, v);
    out.extend_from_slice(&buf);
}

impl TableCatalogEntry {
    pub fn from_table_def(def: &TableDef, root_page_id: PageId, create_sql: impl Into<String>) -> Self {
        Self {
            table_id: def.id,
            root_page_id,
            name: def.name.clone(),
            create_sql: create_sql.into(),
        }
    }

    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        if self.name.len() > u16::MAX as usize {
            return Err(DbError::invalid_argument("table name too long", self.name.clone()));
        }
        let mut out = Vec::with_capacity(16 + self.name.len() + self.create_sql.len());
        push_u32(&mut out, self.table_id);
        push_u32(&mut out, self.root_page_id);
        push_u16(&mut out, self.name.len() as u16);
        out.extend_from_slice(self.name.as_bytes());
        push_u32(&mut out, self.create_sql.len() as u32);
        out.extend_from_slice(self.create_sql.as_bytes());
        Ok(out)
    }

    pub fn deserialize(data: &[u8]) -> DbResult<Self> {
        let mut pos = 0usize;
        let table_id = read_u32(data, &mut pos, "table_id")?;
        let root_page_id = read_u32(data, &mut pos, "root_page")?;
        let name_len = read_u16(data, &mut pos, "name_len")? as usize;
        let name = read_string(data, &mut pos, name_len, "name")?;
        let sql_len = read_u32(data, &mut pos, "sql_len")? as usize;
        let create_sql = read_string(data, &mut pos, sql_len, "sql")?;
        Ok(Self {
            table_id,
            root_page_id,
            name,
            create_sql,
        })
    }
}

impl ColumnCatalogEntry {
    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        let col = &self.column;
        if col.name.len() > u16::MAX as usize {
            return Err(DbError::invalid_argument("column name too long", col.name.clone()));
        }
        if col.constraint.has_default && col.constraint.default_value.len() > u16::MAX as usize {
            return Err(DbError::invalid_argument("default literal too long", col.name.clone()));
        }

        let mut out = Vec::with_capacity(32 + col.name.len() + col.constraint.default_value.len());
        push_u32(&mut out, self.table_id);
        push_u32(&mut out, self.column_id);
        push_u32(&mut out, self.ordinal_position);
        out.push(col.data_type as u8);
        push_u32(&mut out, col.length);
        out.push(encode_constraints(&col.constraint));
        push_u16(&mut out, col.name.len() as u16);
        out.extend_from_slice(col.name.as_bytes());
        let default_len = if col.constraint.has_default {
            col.constraint.default_value.len() as u16
        } else {
            0
        };
        push_u16(&mut out, default_len);
        if col.constraint.has_default {
            out.extend_from_slice(col.constraint.default_value.as_bytes());
        }
        Ok(out)
    }

    pub fn deserialize(data: &[u8]) -> DbResult<Self> {
        let mut pos = 0usize;
        let table_id = read_u32(data, &mut pos, "table_id")?;
        let column_id = read_u32(data, &mut pos, "column_id")?;
        let ordinal_position = read_u32(data, &mut pos, "ordinal")?;
        let type_byte = read_u8(data, &mut pos, "type")?;
        let length = read_u32(data, &mut pos, "length")?;
        let constraint_mask = read_u8(data, &mut pos, "constraint")?;
        let name_len = read_u16(data, &mut pos, "name_len")? as usize;
        let name = read_string(data, &mut pos, name_len, "name")?;
        let default_len = read_u16(data, &mut pos, "default_len")? as usize;
        let default_literal = read_string(data, &mut pos, default_len, "default_literal")?;

        let data_type = DataType::from_u8(type_byte).ok_or_else(|| {
            DbError::new(ErrorKind::InvalidRecordFormat, "unknown column data type")
                .with_context(type_byte.to_string())
        })?;

        Ok(Self {
            table_id,
            column_id,
            ordinal_position,
            column: ColumnDef {
                id: column_id,
                name,
                data_type,
                length,
                constraint: decode_constraints(constraint_mask, default_literal),
            },
        })
    }
}
