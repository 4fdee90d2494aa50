//! value — типизированная модель значений исполнителя.
//!
//! NULL несёт объявленный тип (нужен для коэрций), сравнение трёхзначное:
//! любой NULL-операнд даёт Unknown, логика AND/OR/NOT — по Клини.
//! DATE хранится как число дней от 1970-01-01.

use chrono::NaiveDate;

use crate::errors::{DbError, DbResult};
use crate::types::DataType;

/// Трёхзначная логика Клини.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriBool {
    False,
    True,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Less,
    Equal,
    Greater,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(DataType),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Str { value: String, data_type: DataType },
    Date(i64),
}

impl Value {
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    pub fn boolean(v: bool) -> Self {
        Value::Bool(v)
    }

    pub fn int32(v: i32) -> Self {
        Value::Int32(v)
    }

    pub fn int64(v: i64) -> Self {
        Value::Int64(v)
    }

    pub fn double(v: f64) -> Self {
        Value::Double(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::Str {
            value: v.into(),
            data_type: DataType::Varchar,
        }
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Str {
            value: v.into(),
            data_type: DataType::Text,
        }
    }

    pub fn date(days_since_epoch: i64) -> Self {
        Value::Date(days_since_epoch)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(t) => *t,
            Value::Bool(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Integer,
            Value::Int64(_) => DataType::BigInt,
            Value::Double(_) => DataType::Double,
            Value::Str { data_type, .. } => *data_type,
            Value::Date(_) => DataType::Date,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Числовые fixed-width типы (DATE сюда не входит).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Double(_))
    }

    pub fn as_bool(&self) -> DbResult<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => Err(DbError::type_error("boolean access", "BOOLEAN", self.data_type().as_str())),
        }
    }

    pub fn as_int32(&self) -> DbResult<i32> {
        match self {
            Value::Int32(v) => Ok(*v),
            _ => Err(DbError::type_error("int32 access", "INTEGER", self.data_type().as_str())),
        }
    }

    /// BIGINT, DATE и TIMESTAMP живут в 64-битном представлении.
    pub fn as_int64(&self) -> DbResult<i64> {
        match self {
            Value::Int64(v) => Ok(*v),
            Value::Date(v) => Ok(*v),
            _ => Err(DbError::type_error("int64 access", "BIGINT", self.data_type().as_str())),
        }
    }

    pub fn as_double(&self) -> DbResult<f64> {
        match self {
            Value::Double(v) => Ok(*v),
            _ => Err(DbError::type_error("double access", "DOUBLE", self.data_type().as_str())),
        }
    }

    pub fn as_str(&self) -> DbResult<&str> {
        match self {
            Value::Str { value, .. } => Ok(value.as_str()),
            _ => Err(DbError::type_error("string access", "TEXT", self.data_type().as_str())),
        }
    }

    /// Строковое представление для вывода результата SELECT.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null(_) => "NULL".to_string(),
            Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Str { value, .. } => value.clone(),
            Value::Date(days) => format_date(*days),
        }
    }
}

fn numeric_as_f64(value: &Value) -> f64 {
    match value {
        Value::Int32(v) => *v as f64,
        Value::Int64(v) => *v as f64,
        Value::Double(v) => *v,
        _ => unreachable!("caller checks is_numeric"),
    }
}

fn order<T: PartialOrd + PartialEq>(l: T, r: T) -> CompareResult {
    if l == r {
        CompareResult::Equal
    } else if l < r {
        CompareResult::Less
    } else {
        CompareResult::Greater
    }
}

/// Сравнение значений. NULL с любой стороны — Unknown; одинаковые типы
/// сравниваются напрямую; разные числовые — через общий f64; остальное —
/// TYPE_ERROR.
pub fn compare(lhs: &Value, rhs: &Value) -> DbResult<CompareResult> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(CompareResult::Unknown);
    }

    match (lhs, rhs) {
        (Value::Bool(l), Value::Bool(r)) => Ok(order(*l, *r)),
        (Value::Int32(l), Value::Int32(r)) => Ok(order(l, r)),
        (Value::Int64(l), Value::Int64(r)) => Ok(order(l, r)),
        (Value::Date(l), Value::Date(r)) => Ok(order(l, r)),
        (Value::Double(l), Value::Double(r)) => Ok(order(l, r)),
        (Value::Str { value: l, .. }, Value::Str { value: r, .. }) => Ok(order(l, r)),
        _ => {
            if lhs.is_numeric() && rhs.is_numeric() {
                return Ok(order(numeric_as_f64(lhs), numeric_as_f64(rhs)));
            }
            Err(DbError::type_error(
                "comparison",
                lhs.data_type().as_str(),
                rhs.data_type().as_str(),
            ))
        }
    }
}

pub fn logical_and(lhs: TriBool, rhs: TriBool) -> TriBool {
    if lhs == TriBool::False || rhs == TriBool::False {
        return TriBool::False;
    }
    if lhs == TriBool::Unknown || rhs == TriBool::Unknown {
        return TriBool::Unknown;
    }
    TriBool::True
}

pub fn logical_or(lhs: TriBool, rhs: TriBool) -> TriBool {
    if lhs == TriBool::True || rhs == TriBool::True {
        return TriBool::True;
    }
    if lhs == TriBool::Unknown || rhs == TriBool::Unknown {
        return TriBool::Unknown;
    }
    TriBool::False
}

pub fn logical_not(value: TriBool) -> TriBool {
    match value {
        TriBool::True => TriBool::False,
        TriBool::False => TriBool::True,
        TriBool::Unknown => TriBool::Unknown,
    }
}

/// Разобрать строгий `YYYY-MM-DD` в дни от эпохи. None — не дата.
pub fn parse_date(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }

    let digits = |s: &str| -> Option<i64> {
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<i64>().ok()
        } else {
            None
        }
    };

    let year = digits(&text[0..4])?;
    let month = digits(&text[5..7])?;
    let day = digits(&text[8..10])?;

    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
    Some(date.signed_duration_since(epoch).num_days())
}

/// Обратное преобразование. Вне диапазона календаря печатаем число дней.
pub fn format_date(days_since_epoch: i64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
    chrono::Duration::try_days(days_since_epoch)
        .and_then(|delta| epoch.checked_add_signed(delta))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days_since_epoch.to_string())
}
