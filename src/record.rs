//! record — кодек типизированных записей.
//!
//! Формат (LE):
//! [field_count u16][bitmap_len u16][null bitmap][поля...]
//! Поле: [type u8][len u16][payload len B].
//! Бит i (LSB-first) взведён — поле i есть NULL, его len на проводе 0.
//!
//! decode строг: любая обрезка или лишний хвост — отказ (false-аналог
//! через Option отсутствует; возвращаем Err INVALID_RECORD_FORMAT).

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::MAX_RECORD_SIZE;
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::types::DataType;

/// Примитив записи: тип, флаг NULL и сырые байты.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub data_type: DataType,
    pub is_null: bool,
    pub payload: Vec<u8>,
}

impl Field {
    pub fn from_null(declared_type: DataType) -> Self {
        Self {
            data_type: declared_type,
            is_null: true,
            payload: Vec::new(),
        }
    }

    pub fn from_bool(v: bool) -> Self {
        Self {
            data_type: DataType::Boolean,
            is_null: false,
            payload: vec![u8::from(v)],
        }
    }

    pub fn from_int32(v: i32) -> Self {
        Self {
            data_type: DataType::Integer,
            is_null: false,
            payload: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_int64(v: i64) -> Self {
        Self {
            data_type: DataType::BigInt,
            is_null: false,
            payload: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_double(v: f64) -> Self {
        Self {
            data_type: DataType::Double,
            is_null: false,
            payload: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_string(s: &str) -> Self {
        Self {
            data_type: DataType::Varchar,
            is_null: false,
            payload: s.as_bytes().to_vec(),
        }
    }

    pub fn from_text(s: &str) -> Self {
        Self {
            data_type: DataType::Text,
            is_null: false,
            payload: s.as_bytes().to_vec(),
        }
    }

    pub fn from_date(days_since_epoch: i64) -> Self {
        Self {
            data_type: DataType::Date,
            is_null: false,
            payload: days_since_epoch.to_le_bytes().to_vec(),
        }
    }

    pub fn from_timestamp(v: i64) -> Self {
        Self {
            data_type: DataType::Timestamp,
            is_null: false,
            payload: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_blob(bytes: Vec<u8>) -> Self {
        Self {
            data_type: DataType::Blob,
            is_null: false,
            payload: bytes,
        }
    }
}

#[inline]
fn bitmap_len(field_count: usize) -> usize {
    (field_count + 7) / 8
}

pub fn encode(fields: &[Field]) -> DbResult<Vec<u8>> {
    let count = fields.len();
    if count > u16::MAX as usize {
        return Err(DbError::invalid_argument("too many fields", count.to_string()));
    }

    let bm_len = bitmap_len(count);
    let mut bitmap = vec![0u8; bm_len];
    for (i, field) in fields.iter().enumerate() {
        if field.is_null {
            if !field.payload.is_empty() {
                return Err(DbError::invalid_argument("null field had payload", i.to_string()));
            }
            bitmap[i / 8] |= 1u8 << (i % 8);
        }
    }

    let mut out = Vec::with_capacity(4 + bm_len + count * 4);
    let mut buf2 = [0u8; 2];
    LittleEndian::write_u16(&mut buf2, count as u16);
    out.extend_from_slice(&buf2);
    LittleEndian::write_u16(&mut buf2, bm_len as u16);
    out.extend_from_slice(&buf2);
    out.extend_from_slice(&bitmap);

    for (i, field) in fields.iter().enumerate() {
        out.push(field.data_type as u8);

        let mut len = 0usize;
        if !field.is_null {
            if field.payload.len() > u16::MAX as usize {
                return Err(DbError::record_too_large(field.payload.len(), u16::MAX as usize));
            }
            let expected = field.data_type.fixed_size();
            if expected > 0 && field.payload.len() != expected {
                return Err(DbError::invalid_argument(
                    "fixed-width field has wrong size",
                    format!("field {}: {} != {}", i, field.payload.len(), expected),
                ));
            }
            len = field.payload.len();
        }

        LittleEndian::write_u16(&mut buf2, len as u16);
        out.extend_from_slice(&buf2);
        if len > 0 {
            out.extend_from_slice(&field.payload);
        }

        if out.len() > MAX_RECORD_SIZE {
            return Err(DbError::record_too_large(out.len(), MAX_RECORD_SIZE));
        }
    }

    Ok(out)
}

pub fn decode(data: &[u8]) -> DbResult<Vec<Field>> {
    let bad = || DbError::new(ErrorKind::InvalidRecordFormat, "failed to decode record");

    let mut pos = 0usize;
    let take_u16 = |pos: &mut usize| -> DbResult<u16> {
        if *pos + 2 > data.len() {
            return Err(bad());
        }
        let v = LittleEndian::read_u16(&data[*pos..*pos + 2]);
        *pos += 2;
        Ok(v)
    };

    let count = take_u16(&mut pos)? as usize;
    let bm_len = take_u16(&mut pos)? as usize;
    if bm_len < bitmap_len(count) {
        return Err(bad());
    }
    if pos + bm_len > data.len() {
        return Err(bad());
    }
    let bitmap = &data[pos..pos + bm_len];
    pos += bm_len;

    let mut fields = Vec::with_capacity(count);
    for i in 0..count {
        if pos >= data.len() {
            return Err(bad());
        }
        let type_byte = data[pos];
        pos += 1;
        let data_type = DataType::from_u8(type_byte)
            .ok_or_else(|| DbError::new(ErrorKind::InvalidRecordFormat, "unknown field type")
                .with_context(type_byte.to_string()))?;

        let len = take_u16(&mut pos)? as usize;
        if pos + len > data.len() {
            return Err(bad());
        }

        let is_null = (bitmap[i / 8] & (1u8 << (i % 8))) != 0;
        if is_null && len != 0 {
            return Err(bad());
        }

        fields.push(Field {
            data_type,
            is_null,
            payload: if is_null { Vec::new() } else { data[pos..pos + len].to_vec() },
        });
        pos += len;
    }

    if pos != data.len() {
        // лишний хвост — запись не наша
        return Err(bad());
    }
    Ok(fields)
}
