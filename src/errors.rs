//! Структурированные ошибки движка.
//!
//! Каждая ошибка несёт тег вида (ErrorKind), короткое сообщение и
//! опциональный контекст. Числовые коды сгруппированы по подсистемам:
//! general 1–99, I/O 100–199, storage 200–299, record 300–399,
//! transaction 500–599, query 600–699, network 700–799.
//!
//! Формат для пользователя: `[KIND] message (context)`.

use std::fmt;
use thiserror::Error;

/// Тег ошибки с числовым кодом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    // General (1-99)
    InvalidArgument = 2,
    NotImplemented = 4,
    InternalError = 5,

    // I/O (100-199)
    IoError = 100,
    FileNotFound = 101,
    FileAlreadyExists = 102,
    PermissionDenied = 103,
    DiskFull = 104,
    ReadError = 105,
    WriteError = 106,
    SeekError = 107,
    FileCorrupted = 109,

    // Storage (200-299)
    PageNotFound = 200,
    PageCorrupted = 201,
    PageFull = 202,
    InvalidPageType = 203,
    CacheFull = 204,
    InvalidOffset = 206,
    PageLocked = 207,

    // Record (300-399)
    RecordNotFound = 300,
    RecordTooLarge = 301,
    InvalidRecordFormat = 302,
    DuplicateRecord = 304,
    SchemaMismatch = 305,

    // Transaction (500-599)
    DeadlockDetected = 501,
    LockTimeout = 502,

    // Query (600-699)
    SyntaxError = 600,
    SemanticError = 601,
    TypeError = 602,
    TableNotFound = 603,
    ColumnNotFound = 604,
    ConstraintViolation = 605,
    TableExists = 607,
    UnsupportedType = 608,

    // Network (700-799)
    Timeout = 702,
}

impl ErrorKind {
    /// Числовой код (стабильная часть внешнего контракта).
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Имя тега для форматирования `[KIND]`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::IoError => "IO_ERROR",
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::FileAlreadyExists => "FILE_ALREADY_EXISTS",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::DiskFull => "DISK_FULL",
            ErrorKind::ReadError => "READ_ERROR",
            ErrorKind::WriteError => "WRITE_ERROR",
            ErrorKind::SeekError => "SEEK_ERROR",
            ErrorKind::FileCorrupted => "FILE_CORRUPTED",
            ErrorKind::PageNotFound => "PAGE_NOT_FOUND",
            ErrorKind::PageCorrupted => "PAGE_CORRUPTED",
            ErrorKind::PageFull => "PAGE_FULL",
            ErrorKind::InvalidPageType => "INVALID_PAGE_TYPE",
            ErrorKind::CacheFull => "CACHE_FULL",
            ErrorKind::InvalidOffset => "INVALID_OFFSET",
            ErrorKind::PageLocked => "PAGE_LOCKED",
            ErrorKind::RecordNotFound => "RECORD_NOT_FOUND",
            ErrorKind::RecordTooLarge => "RECORD_TOO_LARGE",
            ErrorKind::InvalidRecordFormat => "INVALID_RECORD_FORMAT",
            ErrorKind::DuplicateRecord => "DUPLICATE_RECORD",
            ErrorKind::SchemaMismatch => "SCHEMA_MISMATCH",
            ErrorKind::DeadlockDetected => "DEADLOCK_DETECTED",
            ErrorKind::LockTimeout => "LOCK_TIMEOUT",
            ErrorKind::SyntaxError => "SYNTAX_ERROR",
            ErrorKind::SemanticError => "SEMANTIC_ERROR",
            ErrorKind::TypeError => "TYPE_ERROR",
            ErrorKind::TableNotFound => "TABLE_NOT_FOUND",
            ErrorKind::ColumnNotFound => "COLUMN_NOT_FOUND",
            ErrorKind::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorKind::TableExists => "TABLE_EXISTS",
            ErrorKind::UnsupportedType => "UNSUPPORTED_TYPE",
            ErrorKind::Timeout => "TIMEOUT",
        }
    }

    /// Может ли операция преуспеть при повторе / с другими параметрами.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::LockTimeout
                | ErrorKind::DeadlockDetected
                | ErrorKind::CacheFull
                | ErrorKind::PageFull
                | ErrorKind::FileAlreadyExists
        )
    }

    #[inline]
    pub fn is_io_error(self) -> bool {
        (100..200).contains(&self.code())
    }

    #[inline]
    pub fn is_storage_error(self) -> bool {
        (200..300).contains(&self.code())
    }

    #[inline]
    pub fn is_record_error(self) -> bool {
        (300..400).contains(&self.code())
    }

    #[inline]
    pub fn is_query_error(self) -> bool {
        (600..700).contains(&self.code())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn context_suffix(context: &Option<String>) -> String {
    match context {
        Some(c) if !c.is_empty() => format!(" ({})", c),
        _ => String::new(),
    }
}

/// Ошибка движка: тег + сообщение + опциональный контекст.
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}{}", context_suffix(.context))]
pub struct DbError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Option<String>,
}

impl DbError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    // ---- частые конструкторы ----

    pub fn invalid_argument(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message).with_context(context)
    }

    pub fn page_not_found(page_id: u32) -> Self {
        Self::new(ErrorKind::PageNotFound, "page not found").with_context(page_id.to_string())
    }

    pub fn invalid_page_type(message: impl Into<String>, page_id: u32) -> Self {
        Self::new(ErrorKind::InvalidPageType, message).with_context(page_id.to_string())
    }

    pub fn cache_full() -> Self {
        Self::new(ErrorKind::CacheFull, "no unpinned pages to evict")
    }

    pub fn record_too_large(size: usize, max: usize) -> Self {
        Self::new(ErrorKind::RecordTooLarge, "record too large")
            .with_context(format!("{} > {}", size, max))
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::TableNotFound, "table not found").with_context(name)
    }

    pub fn table_exists(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::TableExists, "table already exists").with_context(name)
    }

    pub fn column_not_found(column: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        let mut err = Self::new(ErrorKind::ColumnNotFound, "column not found").with_context(column);
        if !table.is_empty() {
            if let Some(ctx) = err.context.take() {
                err.context = Some(format!("{} in {}", ctx, table));
            }
        }
        err
    }

    pub fn type_error(
        operation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::TypeError,
            format!("{}: expected {}", operation.into(), expected.into()),
        )
        .with_context(actual)
    }

    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConstraintViolation, message)
    }

    pub fn unsupported_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedType, "unsupported type").with_context(name)
    }

    pub fn syntax_error(sql: impl Into<String>, position: usize, expected: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::SyntaxError,
            format!("expected {} at position {}", expected.into(), position),
        )
        .with_context(sql)
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let kind = match err.kind() {
            IoKind::NotFound => ErrorKind::FileNotFound,
            IoKind::PermissionDenied => ErrorKind::PermissionDenied,
            IoKind::AlreadyExists => ErrorKind::FileAlreadyExists,
            _ => ErrorKind::IoError,
        };
        Self::new(kind, err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
