//! Базовые типы и перечисления ядра.

/// Идентификатор страницы. 0 — невалидный; реальные id начинаются с 1.
pub type PageId = u32;

/// Индекс слота внутри страницы.
pub type SlotId = u16;

/// Идентификатор таблицы в каталоге.
pub type TableId = u32;

/// Идентификатор колонки внутри таблицы.
pub type ColumnId = u32;

/// Тип страницы (байт в заголовке).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Invalid = 0,
    Data = 1,
    Index = 2,
    Overflow = 3,
    Metadata = 4,
    Free = 5,
}

impl PageType {
    pub fn from_u8(v: u8) -> Option<PageType> {
        match v {
            0 => Some(PageType::Invalid),
            1 => Some(PageType::Data),
            2 => Some(PageType::Index),
            3 => Some(PageType::Overflow),
            4 => Some(PageType::Metadata),
            5 => Some(PageType::Free),
            _ => None,
        }
    }
}

/// Типы данных колонок и полей записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Null = 0,
    Boolean = 1,
    Integer = 2,
    BigInt = 3,
    Float = 4,
    Double = 5,
    Varchar = 6,
    Text = 7,
    Date = 8,
    Timestamp = 9,
    Blob = 10,
}

impl DataType {
    pub fn from_u8(v: u8) -> Option<DataType> {
        match v {
            0 => Some(DataType::Null),
            1 => Some(DataType::Boolean),
            2 => Some(DataType::Integer),
            3 => Some(DataType::BigInt),
            4 => Some(DataType::Float),
            5 => Some(DataType::Double),
            6 => Some(DataType::Varchar),
            7 => Some(DataType::Text),
            8 => Some(DataType::Date),
            9 => Some(DataType::Timestamp),
            10 => Some(DataType::Blob),
            _ => None,
        }
    }

    /// Ширина fixed-width типа в байтах; 0 — тип переменной длины.
    pub fn fixed_size(self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Integer | DataType::Float => 4,
            DataType::BigInt | DataType::Double | DataType::Date | DataType::Timestamp => 8,
            DataType::Null | DataType::Varchar | DataType::Text | DataType::Blob => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Text => "TEXT",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Blob => "BLOB",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Положение живой строки: (страница, слот). Транзитный хэндл —
/// стабилен только до erase или переносящего update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowLocation {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RowLocation {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}
