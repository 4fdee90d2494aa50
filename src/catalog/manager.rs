//! catalog/manager — самоописывающий каталог.
//!
//! Две логические таблицы в двух DATA-страницах, id которых живут в
//! метаданных: сериализованные TableEntry и ColumnEntry. Список таблиц
//! кэшируется в памяти и наполняется лениво сканом страницы.
//!
//! drop_table переписывает обе страницы на месте (свежий образ + запись
//! через FileManager) и выбрасывает их из пула, чтобы следующий fetch
//! прочитал диск. Переполнение переписанной страницы — PAGE_FULL:
//! цепочки каталожных страниц в этой версии нет.

use log::info;

use crate::errors::{DbError, DbResult, ErrorKind};
use crate::page::Page;
use crate::pager::Pager;
use crate::types::{ColumnId, PageId, PageType, TableId};

use super::schema::{ColumnCatalogEntry, TableCatalogEntry, TableDef};

#[derive(Debug)]
pub struct CatalogManager {
    tables_root: PageId,
    columns_root: PageId,
    tables_cache: Vec<TableCatalogEntry>,
    tables_loaded: bool,
}

/// Живые непустые payload'ы всех слотов страницы.
fn read_slot_payloads(pager: &mut Pager, page_id: PageId) -> DbResult<Vec<Vec<u8>>> {
    let result = {
        let page = pager.fetch(page_id, true)?;
        let slot_count = page.slot_count();
        let mut payloads = Vec::new();
        let mut failure = None;
        for slot in 0..slot_count {
            match page.read(slot) {
                Ok(Some(p)) if !p.is_empty() => payloads.push(p),
                Ok(_) => {}
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(payloads),
        }
    };
    pager.unpin(page_id, false)?;
    result
}

impl CatalogManager {
    /// Корни каталога гарантируются пулом при открытии.
    pub fn new(pager: &Pager) -> Self {
        Self {
            tables_root: pager.catalog_tables_root(),
            columns_root: pager.catalog_columns_root(),
            tables_cache: Vec::new(),
            tables_loaded: false,
        }
    }

    #[inline]
    pub fn tables_root(&self) -> PageId {
        self.tables_root
    }

    #[inline]
    pub fn columns_root(&self) -> PageId {
        self.columns_root
    }

    fn load_tables_cache(&mut self, pager: &mut Pager) -> DbResult<()> {
        if self.tables_loaded {
            return Ok(());
        }
        self.tables_cache.clear();
        for payload in read_slot_payloads(pager, self.tables_root)? {
            self.tables_cache.push(TableCatalogEntry::deserialize(&payload)?);
        }
        self.tables_loaded = true;
        Ok(())
    }

    /// Сбросить кэш и перечитать страницу таблиц.
    pub fn reload(&mut self, pager: &mut Pager) -> DbResult<()> {
        self.tables_loaded = false;
        self.load_tables_cache(pager)
    }

    pub fn list_tables(&mut self, pager: &mut Pager) -> DbResult<Vec<TableCatalogEntry>> {
        self.load_tables_cache(pager)?;
        Ok(self.tables_cache.clone())
    }

    pub fn table_exists(&mut self, pager: &mut Pager, name: &str) -> DbResult<bool> {
        self.load_tables_cache(pager)?;
        Ok(self.tables_cache.iter().any(|e| e.name == name))
    }

    pub fn get_table(&mut self, pager: &mut Pager, name: &str) -> DbResult<Option<TableCatalogEntry>> {
        self.load_tables_cache(pager)?;
        Ok(self.tables_cache.iter().find(|e| e.name == name).cloned())
    }

    pub fn get_table_by_id(&mut self, pager: &mut Pager, id: TableId) -> DbResult<Option<TableCatalogEntry>> {
        self.load_tables_cache(pager)?;
        Ok(self.tables_cache.iter().find(|e| e.table_id == id).cloned())
    }

    fn read_all_columns(&self, pager: &mut Pager) -> DbResult<Vec<ColumnCatalogEntry>> {
        let mut entries = Vec::new();
        for payload in read_slot_payloads(pager, self.columns_root)? {
            entries.push(ColumnCatalogEntry::deserialize(&payload)?);
        }
        entries.sort_by(|a, b| {
            (a.table_id, a.ordinal_position).cmp(&(b.table_id, b.ordinal_position))
        });
        Ok(entries)
    }

    /// Колонки таблицы в порядке ordinal — он же порядок полей на диске.
    pub fn get_columns(&self, pager: &mut Pager, table_id: TableId) -> DbResult<Vec<ColumnCatalogEntry>> {
        let mut entries: Vec<ColumnCatalogEntry> = Vec::new();
        for payload in read_slot_payloads(pager, self.columns_root)? {
            let entry = ColumnCatalogEntry::deserialize(&payload)?;
            if entry.table_id == table_id {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.ordinal_position);
        Ok(entries)
    }

    fn persist_entry(pager: &mut Pager, page_id: PageId, data: &[u8], what: &str) -> DbResult<()> {
        let insert_res = {
            let page = pager.fetch(page_id, true)?;
            page.insert(data)
        };
        match insert_res {
            Ok(Some(_slot)) => pager.unpin(page_id, true),
            Ok(None) => {
                pager.unpin(page_id, false)?;
                Err(DbError::new(ErrorKind::PageFull, format!("catalog {} page full", what))
                    .with_context(page_id.to_string()))
            }
            Err(err) => {
                pager.unpin(page_id, false)?;
                Err(err)
            }
        }
    }

    /// Переписать каталожную страницу свежим образом и выбросить её из
    /// пула: диск снова авторитетен.
    fn rewrite_page(pager: &mut Pager, page_id: PageId, entries: &[Vec<u8>], what: &str) -> DbResult<()> {
        let mut page = Page::new();
        page.init(PageType::Data, page_id);
        for data in entries {
            if page.insert(data)?.is_none() {
                return Err(DbError::new(ErrorKind::PageFull, format!("catalog {} page full", what))
                    .with_context(page_id.to_string()));
            }
        }
        pager.file_mut().write_page(page_id, page.data())?;
        pager.discard(page_id)?;
        Ok(())
    }

    /// Зарегистрировать таблицу: выдать table_id, записать TableEntry и
    /// по ColumnEntry на колонку. Имя должно быть свободно.
    pub fn create_table(
        &mut self,
        pager: &mut Pager,
        mut def: TableDef,
        root_page_id: PageId,
        create_sql: &str,
    ) -> DbResult<TableCatalogEntry> {
        self.load_tables_cache(pager)?;
        if self.tables_cache.iter().any(|e| e.name == def.name) {
            return Err(DbError::table_exists(def.name));
        }

        let new_id = pager.next_table_id();
        pager.set_next_table_id(new_id + 1)?;
        def.id = new_id;

        let entry = TableCatalogEntry::from_table_def(&def, root_page_id, create_sql);
        Self::persist_entry(pager, self.tables_root, &entry.serialize()?, "table")?;
        self.tables_cache.push(entry.clone());

        for (i, column_def) in def.columns.iter().enumerate() {
            let column_id = (i + 1) as ColumnId;
            let mut column = column_def.clone();
            column.id = column_id;
            let col_entry = ColumnCatalogEntry {
                table_id: new_id,
                column_id,
                ordinal_position: i as u32,
                column,
            };
            Self::persist_entry(pager, self.columns_root, &col_entry.serialize()?, "column")?;
        }

        info!("catalog: created table '{}' id={} root={}", entry.name, new_id, root_page_id);
        Ok(entry)
    }

    /// Убрать таблицу и её колонки из каталога. false — таблицы нет.
    pub fn drop_table(&mut self, pager: &mut Pager, name: &str, _cascade: bool) -> DbResult<bool> {
        self.load_tables_cache(pager)?;
        let position = match self.tables_cache.iter().position(|e| e.name == name) {
            Some(p) => p,
            None => return Ok(false),
        };

        let removed = self.tables_cache.remove(position);
        let mut table_payloads = Vec::with_capacity(self.tables_cache.len());
        for entry in &self.tables_cache {
            table_payloads.push(entry.serialize()?);
        }
        Self::rewrite_page(pager, self.tables_root, &table_payloads, "table")?;
        self.tables_loaded = true;

        let mut column_payloads = Vec::new();
        for entry in self.read_all_columns(pager)? {
            if entry.table_id != removed.table_id {
                column_payloads.push(entry.serialize()?);
            }
        }
        Self::rewrite_page(pager, self.columns_root, &column_payloads, "column")?;

        info!("catalog: dropped table '{}' id={}", removed.name, removed.table_id);
        Ok(true)
    }
}
