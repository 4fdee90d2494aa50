//! pager — буферный пул страниц поверх FileManager.
//!
//! Фиксированная таблица фреймов, карта page_id -> фрейм, LRU-список
//! незапиненных фреймов (front = самый свежий). Запиненные страницы не
//! выселяются; выселение грязного фрейма пишет его на диск. Пул владеет
//! метаданными (страница 1): freelist, корни каталога, next_table_id —
//! см. meta.rs и alloc.rs.

mod alloc;
mod meta;

pub use meta::Metadata;

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::consts::{FIRST_PAGE_ID, MAX_CACHE_SIZE};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::file::FileManager;
use crate::page::Page;
use crate::types::PageId;

#[derive(Debug)]
struct Frame {
    page_id: PageId, // 0 — фрейм свободен
    page: Page,
    dirty: bool,
    pin_count: u32,
    in_lru: bool,
}

impl Frame {
    fn empty() -> Self {
        Self {
            page_id: 0,
            page: Page::new(),
            dirty: false,
            pin_count: 0,
            in_lru: false,
        }
    }
}

#[derive(Debug)]
pub struct Pager {
    file: FileManager,
    capacity: usize,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, usize>,
    lru: VecDeque<PageId>,
    meta: Metadata,
}

impl Pager {
    /// Открыть пул над файлом. Пустой файл получает метаданные и два
    /// корня каталога; у существующего читается страница 1.
    pub fn open(file: FileManager, capacity: usize) -> DbResult<Self> {
        let capacity = capacity.clamp(1, MAX_CACHE_SIZE);
        let mut pager = Self {
            file,
            capacity,
            frames: (0..capacity).map(|_| Frame::empty()).collect(),
            page_table: HashMap::new(),
            lru: VecDeque::new(),
            meta: Metadata::default(),
        };
        pager.init_metadata_if_needed()?;
        pager.load_metadata()?;
        debug!(
            "pager open: {} pages on disk, cache capacity {}",
            pager.file.page_count()?,
            capacity
        );
        Ok(pager)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn file(&self) -> &FileManager {
        &self.file
    }

    #[inline]
    pub(crate) fn file_mut(&mut self) -> &mut FileManager {
        &mut self.file
    }

    // ---- fetch / pin ----

    /// Получить страницу (по умолчанию — с пином). Ссылка действительна
    /// до следующего вызова пула; данные наружу копируются.
    pub fn fetch(&mut self, page_id: PageId, pin: bool) -> DbResult<&mut Page> {
        if page_id < FIRST_PAGE_ID {
            return Err(DbError::page_not_found(page_id));
        }

        if let Some(&idx) = self.page_table.get(&page_id) {
            if pin {
                if self.frames[idx].pin_count == 0 && self.frames[idx].in_lru {
                    self.lru_remove(page_id);
                    self.frames[idx].in_lru = false;
                }
                self.frames[idx].pin_count += 1;
            } else if self.frames[idx].pin_count == 0 {
                // touch: переносим в голову LRU
                if self.frames[idx].in_lru {
                    self.lru_remove(page_id);
                }
                self.lru.push_front(page_id);
                self.frames[idx].in_lru = true;
            }
            return Ok(&mut self.frames[idx].page);
        }

        let idx = self.obtain_frame_for(page_id, pin)?;
        let Self { file, frames, .. } = self;
        if let Err(err) = file.read_page(page_id, frames[idx].page.data_mut()) {
            // загрузка не удалась — вернуть фрейм
            self.page_table.remove(&page_id);
            if self.frames[idx].pin_count == 0 && self.frames[idx].in_lru {
                self.lru_remove(page_id);
            }
            let fr = &mut self.frames[idx];
            fr.page_id = 0;
            fr.pin_count = 0;
            fr.in_lru = false;
            return Err(err);
        }
        Ok(&mut self.frames[idx].page)
    }

    /// Снять пин; dirty — липкий флаг. Unpin незакэшированной или уже
    /// незапиненной страницы — ошибка программирования.
    pub fn unpin(&mut self, page_id: PageId, dirty: bool) -> DbResult<()> {
        let idx = *self
            .page_table
            .get(&page_id)
            .ok_or_else(|| DbError::new(ErrorKind::PageNotFound, "unpin unknown page")
                .with_context(page_id.to_string()))?;
        let fr = &mut self.frames[idx];
        if fr.pin_count == 0 {
            return Err(DbError::new(ErrorKind::PageLocked, "unpin already unpinned page")
                .with_context(page_id.to_string()));
        }
        fr.pin_count -= 1;
        if dirty {
            fr.dirty = true;
        }
        if fr.pin_count == 0 {
            if fr.in_lru {
                self.lru_remove(page_id);
            }
            self.lru.push_front(page_id);
            self.frames[idx].in_lru = true;
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, page_id: PageId) -> DbResult<()> {
        let idx = *self
            .page_table
            .get(&page_id)
            .ok_or_else(|| DbError::new(ErrorKind::PageNotFound, "mark_dirty unknown page")
                .with_context(page_id.to_string()))?;
        self.frames[idx].dirty = true;
        Ok(())
    }

    /// Сбросить одну страницу, если она в кэше и грязная.
    pub fn flush(&mut self, page_id: PageId) -> DbResult<()> {
        if let Some(&idx) = self.page_table.get(&page_id) {
            let Self { file, frames, .. } = self;
            let fr = &mut frames[idx];
            if fr.dirty {
                file.write_page(fr.page_id, fr.page.data())?;
                fr.dirty = false;
            }
        }
        Ok(())
    }

    /// Сбросить все грязные фреймы.
    pub fn flush_all(&mut self) -> DbResult<()> {
        let Self {
            file,
            frames,
            page_table,
            ..
        } = self;
        for &idx in page_table.values() {
            let fr = &mut frames[idx];
            if fr.dirty {
                file.write_page(fr.page_id, fr.page.data())?;
                fr.dirty = false;
            }
        }
        Ok(())
    }

    /// Выбросить страницу из кэша без записи (диск уже авторитетен).
    /// Запиненная страница не выбрасывается.
    pub fn discard(&mut self, page_id: PageId) -> DbResult<()> {
        if let Some(&idx) = self.page_table.get(&page_id) {
            if self.frames[idx].pin_count > 0 {
                return Err(DbError::new(ErrorKind::PageLocked, "discard of pinned page")
                    .with_context(page_id.to_string()));
            }
            if self.frames[idx].in_lru {
                self.lru_remove(page_id);
            }
            self.page_table.remove(&page_id);
            let fr = &mut self.frames[idx];
            fr.page_id = 0;
            fr.dirty = false;
            fr.in_lru = false;
        }
        Ok(())
    }

    // ---- внутреннее ----

    fn lru_remove(&mut self, page_id: PageId) {
        if let Some(pos) = self.lru.iter().position(|&p| p == page_id) {
            self.lru.remove(pos);
        }
    }

    fn find_free_frame(&self) -> Option<usize> {
        self.frames.iter().position(|f| f.page_id == 0)
    }

    /// Выселить LRU-хвост. CACHE_FULL, если всё запинено.
    fn evict_frame(&mut self) -> DbResult<usize> {
        let victim = self.lru.pop_back().ok_or_else(DbError::cache_full)?;
        let idx = *self.page_table.get(&victim).ok_or_else(|| {
            DbError::new(ErrorKind::InternalError, "LRU victim not in page table")
                .with_context(victim.to_string())
        })?;
        if self.frames[idx].pin_count != 0 {
            return Err(DbError::new(ErrorKind::InternalError, "evicting pinned page")
                .with_context(victim.to_string()));
        }
        {
            let Self { file, frames, .. } = self;
            let fr = &mut frames[idx];
            if fr.dirty {
                file.write_page(fr.page_id, fr.page.data())?;
                fr.dirty = false;
            }
        }
        self.page_table.remove(&victim);
        let fr = &mut self.frames[idx];
        fr.page_id = 0;
        fr.in_lru = false;
        Ok(idx)
    }

    /// Занять фрейм под page_id: свободный либо выселенный. На выходе
    /// фрейм чистый, зарегистрирован в карте, pin_count = 1 при pin.
    fn obtain_frame_for(&mut self, page_id: PageId, pin: bool) -> DbResult<usize> {
        let idx = match self.find_free_frame() {
            Some(i) => i,
            None => self.evict_frame()?,
        };
        {
            let fr = &mut self.frames[idx];
            fr.page_id = page_id;
            fr.dirty = false;
            fr.pin_count = u32::from(pin);
            fr.in_lru = !pin;
        }
        if !pin {
            self.lru.push_front(page_id);
        }
        self.page_table.insert(page_id, idx);
        Ok(idx)
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        // best-effort: не терять грязные страницы при закрытии
        let _ = self.flush_all();
    }
}
