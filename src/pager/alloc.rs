//! pager/alloc — выделение и освобождение страниц; freelist на trunk-страницах.
//!
//! Тело trunk-страницы (LE, после заголовка):
//! [next_trunk_id u32][leaf_count u32][leaf_ids u32 x TRUNK_CAPACITY]
//!
//! new_page сперва пробует freelist: последний leaf головного trunk, при
//! пустом trunk — сам trunk (голова сдвигается на next_trunk_id); иначе
//! файл растёт. free_page переинициализирует страницу в FREE и вешает её
//! leaf'ом в головной trunk либо делает новой головой.
//!
//! Инвариант: free_count == число leaf во всех trunk + число самих trunk,
//! достижимых от first_trunk_id. Освобождённые id переиспользуются до
//! роста файла.
//!
//! Порядок записей в free_page: образ страницы -> trunk -> метаданные.
//! Последовательность не крэш-атомарна; худший исход между записями —
//! утечка одной страницы либо free_count на единицу больше.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::consts::{
    FIRST_PAGE_ID, INVALID_PAGE_ID, PAGE_HEADER_SIZE, PAGE_SIZE, TRUNK_CAPACITY, TRUNK_HEADER_SIZE,
};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::types::{PageId, PageType};

use super::Pager;

const BODY: usize = PAGE_HEADER_SIZE;

impl Pager {
    /// Выделить страницу заданного типа. Возвращает id с запиненным
    /// фреймом: вызывающий обязан сделать ровно один unpin.
    pub fn new_page(&mut self, page_type: PageType) -> DbResult<PageId> {
        let id = if self.meta.first_trunk_id != INVALID_PAGE_ID && self.meta.free_count > 0 {
            let trunk_id = self.meta.first_trunk_id;
            match self.trunk_pop_leaf(trunk_id)? {
                Some(leaf) => {
                    self.meta.free_count -= 1;
                    self.save_metadata()?;
                    leaf
                }
                None => {
                    // trunk без leaf'ов: отдаём саму trunk-страницу
                    let next = self.trunk_next(trunk_id)?;
                    self.meta.first_trunk_id = next;
                    self.meta.free_count -= 1;
                    self.save_metadata()?;
                    trunk_id
                }
            }
        } else {
            self.file.allocate_page()?
        };

        // Фрейм (pinned): свежеосвобождённая страница может ещё висеть в
        // кэше — переиспользуем её фрейм, второй не заводим.
        let idx = match self.page_table.get(&id).copied() {
            Some(idx) => {
                if self.frames[idx].pin_count == 0 && self.frames[idx].in_lru {
                    self.lru_remove(id);
                    self.frames[idx].in_lru = false;
                }
                self.frames[idx].pin_count += 1;
                idx
            }
            None => self.obtain_frame_for(id, true)?,
        };
        {
            let fr = &mut self.frames[idx];
            fr.page.zero();
            fr.page.init(page_type, id);
            fr.dirty = true;
        }
        // Немедленный flush устанавливает страницу на диске и снимает dirty.
        self.flush(id)?;
        debug!("new_page: id={} type={:?}", id, page_type);
        Ok(id)
    }

    /// Вернуть страницу во freelist. Страница 1 не освобождается.
    pub fn free_page(&mut self, id: PageId) -> DbResult<()> {
        if id <= FIRST_PAGE_ID {
            return Err(DbError::invalid_argument("cannot free reserved page", id.to_string()));
        }

        // Пометить страницу FREE и зафиксировать образ на диске. Флаг
        // dirty снимается flush'ем: дальнейшая эвикция не сможет накрыть
        // trunk устаревшим кэшированным образом.
        {
            let page = self.fetch(id, true)?;
            page.zero();
            page.init(PageType::Free, id);
        }
        self.unpin(id, true)?;
        self.flush(id)?;

        if self.meta.first_trunk_id != INVALID_PAGE_ID {
            let trunk_id = self.meta.first_trunk_id;
            let (_next, leaf_count) = self.trunk_read_header(trunk_id)?;
            if (leaf_count as usize) < TRUNK_CAPACITY {
                self.trunk_append_leaf(trunk_id, id)?;
            } else {
                // головной trunk полон — освобождаемая страница сама
                // становится новой головой
                self.trunk_write_new(id, trunk_id, 0)?;
                self.meta.first_trunk_id = id;
            }
        } else {
            self.trunk_write_new(id, INVALID_PAGE_ID, 0)?;
            self.meta.first_trunk_id = id;
        }

        self.meta.free_count += 1;
        self.save_metadata()?;
        debug!("free_page: id={} free_count={}", id, self.meta.free_count);
        Ok(())
    }

    // ---- trunk-помощники (мимо кэша, через FileManager) ----

    fn trunk_read_header(&mut self, trunk_id: PageId) -> DbResult<(PageId, u32)> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(trunk_id, &mut buf)?;
        let next = LittleEndian::read_u32(&buf[BODY..BODY + 4]);
        let leaf_count = LittleEndian::read_u32(&buf[BODY + 4..BODY + 8]);
        Ok((next, leaf_count))
    }

    fn trunk_next(&mut self, trunk_id: PageId) -> DbResult<PageId> {
        Ok(self.trunk_read_header(trunk_id)?.0)
    }

    /// Переписать заголовок trunk: страница уже помечена FREE на диске.
    fn trunk_write_new(&mut self, trunk_id: PageId, next_trunk: PageId, leaf_count: u32) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(trunk_id, &mut buf)?;
        LittleEndian::write_u32(&mut buf[BODY..BODY + 4], next_trunk);
        LittleEndian::write_u32(&mut buf[BODY + 4..BODY + 8], leaf_count);
        self.file.write_page(trunk_id, &buf)
    }

    fn trunk_append_leaf(&mut self, trunk_id: PageId, leaf_id: PageId) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(trunk_id, &mut buf)?;
        let leaf_count = LittleEndian::read_u32(&buf[BODY + 4..BODY + 8]) as usize;
        if leaf_count >= TRUNK_CAPACITY {
            return Err(DbError::new(ErrorKind::PageFull, "trunk page full")
                .with_context(trunk_id.to_string()));
        }
        let off = BODY + TRUNK_HEADER_SIZE + leaf_count * 4;
        LittleEndian::write_u32(&mut buf[off..off + 4], leaf_id);
        LittleEndian::write_u32(&mut buf[BODY + 4..BODY + 8], (leaf_count + 1) as u32);
        self.file.write_page(trunk_id, &buf)
    }

    /// Снять последний leaf головного trunk. Ok(None) — leaf'ов нет.
    fn trunk_pop_leaf(&mut self, trunk_id: PageId) -> DbResult<Option<PageId>> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_page(trunk_id, &mut buf)?;
        let leaf_count = LittleEndian::read_u32(&buf[BODY + 4..BODY + 8]);
        if leaf_count == 0 {
            return Ok(None);
        }
        let new_count = leaf_count - 1;
        let off = BODY + TRUNK_HEADER_SIZE + new_count as usize * 4;
        let leaf = LittleEndian::read_u32(&buf[off..off + 4]);
        LittleEndian::write_u32(&mut buf[BODY + 4..BODY + 8], new_count);
        self.file.write_page(trunk_id, &buf)?;
        Ok(Some(leaf))
    }
}
