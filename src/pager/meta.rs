//! pager/meta — метаданные БД на странице 1.
//!
//! Тело после 24-байтного заголовка страницы (LE):
//! [magic u32 = 0x4B5A464D "KZFM"][version u32]
//! [first_trunk_id u32][free_count u32]
//! [catalog_tables_root u32][catalog_columns_root u32][next_table_id u32]
//!
//! Политика: каждое изменение freelist/корней/счётчика немедленно
//! переписывает страницу 1 через FileManager (мимо кэша; страница 1
//! никогда не ходит через fetch).

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::consts::{
    CATALOG_SCHEMA_VERSION, FIRST_PAGE_ID, INVALID_PAGE_ID, META_MAGIC, PAGE_HEADER_SIZE, PAGE_SIZE,
};
use crate::errors::DbResult;
use crate::page::Page;
use crate::types::{PageId, PageType, TableId};

use super::Pager;

#[derive(Debug, Clone, Copy)]
pub struct Metadata {
    pub version: u32,
    pub first_trunk_id: PageId,
    pub free_count: u32,
    pub catalog_tables_root: PageId,
    pub catalog_columns_root: PageId,
    pub next_table_id: TableId,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: CATALOG_SCHEMA_VERSION,
            first_trunk_id: INVALID_PAGE_ID,
            free_count: 0,
            catalog_tables_root: INVALID_PAGE_ID,
            catalog_columns_root: INVALID_PAGE_ID,
            next_table_id: 1,
        }
    }
}

const BODY: usize = PAGE_HEADER_SIZE;

/// None — magic не совпал (страница не метаданные либо мусор).
fn decode_body(buf: &[u8]) -> Option<Metadata> {
    let magic = LittleEndian::read_u32(&buf[BODY..BODY + 4]);
    if magic != META_MAGIC {
        return None;
    }
    let version = LittleEndian::read_u32(&buf[BODY + 4..BODY + 8]);
    let first_trunk_id = LittleEndian::read_u32(&buf[BODY + 8..BODY + 12]);
    let free_count = LittleEndian::read_u32(&buf[BODY + 12..BODY + 16]);

    // V1 не знала корней каталога и next_table_id.
    let (catalog_tables_root, catalog_columns_root, next_table_id) = if version >= 2 {
        (
            LittleEndian::read_u32(&buf[BODY + 16..BODY + 20]),
            LittleEndian::read_u32(&buf[BODY + 20..BODY + 24]),
            LittleEndian::read_u32(&buf[BODY + 24..BODY + 28]),
        )
    } else {
        (INVALID_PAGE_ID, INVALID_PAGE_ID, 1)
    };

    Some(Metadata {
        version,
        first_trunk_id,
        free_count,
        catalog_tables_root,
        catalog_columns_root,
        next_table_id,
    })
}

fn encode_body(buf: &mut [u8], m: &Metadata) {
    LittleEndian::write_u32(&mut buf[BODY..BODY + 4], META_MAGIC);
    LittleEndian::write_u32(&mut buf[BODY + 4..BODY + 8], m.version);
    LittleEndian::write_u32(&mut buf[BODY + 8..BODY + 12], m.first_trunk_id);
    LittleEndian::write_u32(&mut buf[BODY + 12..BODY + 16], m.free_count);
    LittleEndian::write_u32(&mut buf[BODY + 16..BODY + 20], m.catalog_tables_root);
    LittleEndian::write_u32(&mut buf[BODY + 20..BODY + 24], m.catalog_columns_root);
    LittleEndian::write_u32(&mut buf[BODY + 24..BODY + 28], m.next_table_id);
}

impl Pager {
    // ---- bootstrap / load / save ----

    /// Пустой файл: страница 1 (METADATA) + два пустых DATA-корня каталога.
    pub(super) fn init_metadata_if_needed(&mut self) -> DbResult<()> {
        if self.file.page_count()? != 0 {
            return Ok(());
        }

        let meta_id = self.file.allocate_page()?; // обязан стать 1
        let mut meta_page = Page::new();
        meta_page.init(PageType::Metadata, meta_id);
        self.file.write_page(meta_id, meta_page.data())?;

        let tables_root = self.allocate_raw_data_page()?;
        let columns_root = self.allocate_raw_data_page()?;

        self.meta = Metadata {
            version: CATALOG_SCHEMA_VERSION,
            first_trunk_id: INVALID_PAGE_ID,
            free_count: 0,
            catalog_tables_root: tables_root,
            catalog_columns_root: columns_root,
            next_table_id: 1,
        };
        self.save_metadata()
    }

    pub(super) fn load_metadata(&mut self) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(FIRST_PAGE_ID, &mut buf)?;

        let mut changed = false;
        match decode_body(&buf) {
            Some(m) => self.meta = m,
            None => {
                warn!("metadata magic mismatch, rewriting defaults");
                self.meta = Metadata::default();
                changed = true;
            }
        }

        if self.meta.catalog_tables_root == INVALID_PAGE_ID {
            self.meta.catalog_tables_root = self.allocate_raw_data_page()?;
            changed = true;
        }
        if self.meta.catalog_columns_root == INVALID_PAGE_ID {
            self.meta.catalog_columns_root = self.allocate_raw_data_page()?;
            changed = true;
        }
        if self.meta.next_table_id == 0 {
            self.meta.next_table_id = 1;
            changed = true;
        }
        if self.meta.version != CATALOG_SCHEMA_VERSION {
            self.meta.version = CATALOG_SCHEMA_VERSION;
            changed = true;
        }

        if changed {
            self.save_metadata()?;
        }
        Ok(())
    }

    /// Переписать страницу 1 текущими метаданными (заголовок не трогаем).
    pub(super) fn save_metadata(&mut self) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(FIRST_PAGE_ID, &mut buf)?;
        encode_body(&mut buf, &self.meta);
        self.file.write_page(FIRST_PAGE_ID, &buf)
    }

    /// Свежая DATA-страница напрямую через файл (для корней каталога
    /// на этапе bootstrap, когда freelist пуст по определению).
    fn allocate_raw_data_page(&mut self) -> DbResult<PageId> {
        let id = self.file.allocate_page()?;
        let mut page = Page::new();
        page.init(PageType::Data, id);
        self.file.write_page(id, page.data())?;
        Ok(id)
    }

    // ---- наружные геттеры/сеттеры ----

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    #[inline]
    pub fn first_trunk_id(&self) -> PageId {
        self.meta.first_trunk_id
    }

    #[inline]
    pub fn free_count(&self) -> u32 {
        self.meta.free_count
    }

    #[inline]
    pub fn catalog_tables_root(&self) -> PageId {
        self.meta.catalog_tables_root
    }

    #[inline]
    pub fn catalog_columns_root(&self) -> PageId {
        self.meta.catalog_columns_root
    }

    #[inline]
    pub fn next_table_id(&self) -> TableId {
        self.meta.next_table_id
    }

    pub fn set_next_table_id(&mut self, id: TableId) -> DbResult<()> {
        self.meta.next_table_id = id;
        self.save_metadata()
    }

    pub fn set_catalog_tables_root(&mut self, id: PageId) -> DbResult<()> {
        self.meta.catalog_tables_root = id;
        self.save_metadata()
    }

    pub fn set_catalog_columns_root(&mut self, id: PageId) -> DbResult<()> {
        self.meta.catalog_columns_root = id;
        self.save_metadata()
    }
}
