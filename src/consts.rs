//! Общие константы форматов (страницы, записи, метаданные, каталог, файлы).

// -------- Pages --------

/// Размер страницы в байтах (фиксированный для всего файла БД).
pub const PAGE_SIZE: usize = 4096;

/// Размер заголовка страницы (LE):
/// [page_id u32][next_page_id u32][prev_page_id u32]
/// [record_count u16][free_space_offset u16][slot_count u16]
/// [page_type u8][flags u8][lsn u32]
pub const PAGE_HEADER_SIZE: usize = 24;

/// Размер одного слота в каталоге слотов (u16 offset).
pub const SLOT_SIZE: usize = 2;

/// Метка «слот освобождён» (tombstone).
pub const SLOT_TOMBSTONE: u16 = 0xFFFF;

/// Максимальный размер закодированной записи (страница минус заголовок и запас).
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE - 16;

// -------- Page ids --------

/// Невалидный page id (0 — «нет страницы»).
pub const INVALID_PAGE_ID: u32 = 0;

/// Первый валидный page id. Страница 1 зарезервирована под метаданные.
pub const FIRST_PAGE_ID: u32 = 1;

// -------- Metadata (page 1, тело после заголовка страницы, LE) --------
// [magic u32 = "KZFM"][version u32][first_trunk_id u32][free_count u32]
// [catalog_tables_root u32][catalog_columns_root u32][next_table_id u32]

/// 'KZFM' little-endian.
pub const META_MAGIC: u32 = 0x4B5A_464D;

/// Текущая версия схемы каталога. V2 добавила корни каталога и next_table_id.
pub const CATALOG_SCHEMA_VERSION: u32 = 2;

// -------- Freelist trunk (тело после заголовка страницы, LE) --------
// [next_trunk_id u32][leaf_count u32][leaf_ids u32 x cap]

/// Заголовок trunk-страницы: next_trunk(4) + leaf_count(4).
pub const TRUNK_HEADER_SIZE: usize = 8;

/// Сколько leaf id помещается в один trunk.
pub const TRUNK_CAPACITY: usize = (PAGE_SIZE - PAGE_HEADER_SIZE - TRUNK_HEADER_SIZE) / 4;

// -------- Buffer pool --------

/// Ёмкость пула страниц по умолчанию (в страницах).
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Верхняя граница ёмкости пула.
pub const MAX_CACHE_SIZE: usize = 10_000;

// -------- Schema limits --------

pub const MAX_TABLE_NAME_LENGTH: usize = 255;
pub const MAX_COLUMN_NAME_LENGTH: usize = 255;
pub const MAX_COLUMNS_PER_TABLE: usize = 1024;

// -------- Files --------

/// Расширение файла БД.
pub const DB_FILE_EXTENSION: &str = ".kz";

/// Каталог данных по умолчанию.
pub const DEFAULT_DB_DIR: &str = "./data/";

/// Расширение lock-файла (сосед файла БД).
pub const LOCK_FILE_EXTENSION: &str = ".lock";
