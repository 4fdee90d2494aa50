//! page — слоттированная страница.
//!
//! Раскладка (LE):
//! - Заголовок 24 B: [page_id u32][next u32][prev u32][record_count u16]
//!   [free_space_offset u16][slot_count u16][page_type u8][flags u8][lsn u32]
//! - Записи растут вверх от конца заголовка: [len u16][payload len B].
//! - Каталог слотов растёт вниз от конца страницы, по 2 байта на слот:
//!   offset длины записи либо 0xFFFF (tombstone).
//!
//! Инварианты: header <= free_space_offset <= page_size - slot_count*2;
//! record_count <= slot_count. Повреждённые счётчики чинятся перед
//! очередной мутацией (сброс в пустое состояние), а не распространяются.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::consts::{
    INVALID_PAGE_ID, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE, SLOT_TOMBSTONE,
};
use crate::errors::{DbError, DbResult};
use crate::types::{PageId, PageType, SlotId};

// Смещения полей заголовка.
const OFF_PAGE_ID: usize = 0;
const OFF_NEXT: usize = 4;
const OFF_PREV: usize = 8;
const OFF_RECORD_COUNT: usize = 12;
const OFF_FREE_SPACE: usize = 14;
const OFF_SLOT_COUNT: usize = 16;
const OFF_PAGE_TYPE: usize = 18;
const OFF_FLAGS: usize = 19;
const OFF_LSN: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub page_id: PageId,
    pub next_page_id: PageId,
    pub prev_page_id: PageId,
    pub record_count: u16,
    pub free_space_offset: u16,
    pub slot_count: u16,
    pub page_type: u8,
    pub flags: u8,
    pub lsn: u32,
}

pub fn header_read(buf: &[u8]) -> PageHeader {
    PageHeader {
        page_id: LittleEndian::read_u32(&buf[OFF_PAGE_ID..OFF_PAGE_ID + 4]),
        next_page_id: LittleEndian::read_u32(&buf[OFF_NEXT..OFF_NEXT + 4]),
        prev_page_id: LittleEndian::read_u32(&buf[OFF_PREV..OFF_PREV + 4]),
        record_count: LittleEndian::read_u16(&buf[OFF_RECORD_COUNT..OFF_RECORD_COUNT + 2]),
        free_space_offset: LittleEndian::read_u16(&buf[OFF_FREE_SPACE..OFF_FREE_SPACE + 2]),
        slot_count: LittleEndian::read_u16(&buf[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2]),
        page_type: buf[OFF_PAGE_TYPE],
        flags: buf[OFF_FLAGS],
        lsn: LittleEndian::read_u32(&buf[OFF_LSN..OFF_LSN + 4]),
    }
}

pub fn header_write(buf: &mut [u8], h: &PageHeader) {
    LittleEndian::write_u32(&mut buf[OFF_PAGE_ID..OFF_PAGE_ID + 4], h.page_id);
    LittleEndian::write_u32(&mut buf[OFF_NEXT..OFF_NEXT + 4], h.next_page_id);
    LittleEndian::write_u32(&mut buf[OFF_PREV..OFF_PREV + 4], h.prev_page_id);
    LittleEndian::write_u16(&mut buf[OFF_RECORD_COUNT..OFF_RECORD_COUNT + 2], h.record_count);
    LittleEndian::write_u16(&mut buf[OFF_FREE_SPACE..OFF_FREE_SPACE + 2], h.free_space_offset);
    LittleEndian::write_u16(&mut buf[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2], h.slot_count);
    buf[OFF_PAGE_TYPE] = h.page_type;
    buf[OFF_FLAGS] = h.flags;
    LittleEndian::write_u32(&mut buf[OFF_LSN..OFF_LSN + 4], h.lsn);
}

/// Страница владеет своим буфером PAGE_SIZE байт.
#[derive(Debug)]
pub struct Page {
    buf: Box<[u8]>,
}

impl Page {
    pub fn new() -> Self {
        let mut page = Self {
            buf: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        };
        let h = PageHeader {
            page_id: 0,
            next_page_id: INVALID_PAGE_ID,
            prev_page_id: INVALID_PAGE_ID,
            record_count: 0,
            free_space_offset: PAGE_HEADER_SIZE as u16,
            slot_count: 0,
            page_type: PageType::Invalid as u8,
            flags: 0,
            lsn: 0,
        };
        header_write(&mut page.buf, &h);
        page
    }

    /// Переписать заголовок под новый тип/идентификатор. Тело не трогает.
    pub fn init(&mut self, page_type: PageType, page_id: PageId) {
        let h = PageHeader {
            page_id,
            next_page_id: INVALID_PAGE_ID,
            prev_page_id: INVALID_PAGE_ID,
            record_count: 0,
            free_space_offset: PAGE_HEADER_SIZE as u16,
            slot_count: 0,
            page_type: page_type as u8,
            flags: 0,
            lsn: 0,
        };
        header_write(&mut self.buf, &h);
    }

    /// Обнулить буфер целиком.
    pub fn zero(&mut self) {
        self.buf.fill(0);
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    #[inline]
    pub fn header(&self) -> PageHeader {
        header_read(&self.buf)
    }

    #[inline]
    pub fn write_header(&mut self, h: &PageHeader) {
        header_write(&mut self.buf, h);
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        LittleEndian::read_u32(&self.buf[OFF_PAGE_ID..OFF_PAGE_ID + 4])
    }

    #[inline]
    pub fn page_type(&self) -> u8 {
        self.buf[OFF_PAGE_TYPE]
    }

    #[inline]
    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_u32(&self.buf[OFF_NEXT..OFF_NEXT + 4])
    }

    #[inline]
    pub fn set_next_page_id(&mut self, id: PageId) {
        LittleEndian::write_u32(&mut self.buf[OFF_NEXT..OFF_NEXT + 4], id);
    }

    #[inline]
    pub fn prev_page_id(&self) -> PageId {
        LittleEndian::read_u32(&self.buf[OFF_PREV..OFF_PREV + 4])
    }

    #[inline]
    pub fn set_prev_page_id(&mut self, id: PageId) {
        LittleEndian::write_u32(&mut self.buf[OFF_PREV..OFF_PREV + 4], id);
    }

    #[inline]
    pub fn slot_count(&self) -> u16 {
        LittleEndian::read_u16(&self.buf[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2])
    }

    #[inline]
    pub fn record_count(&self) -> u16 {
        LittleEndian::read_u16(&self.buf[OFF_RECORD_COUNT..OFF_RECORD_COUNT + 2])
    }

    /// Сколько байт можно ещё занять записью с учётом одного нового слота.
    pub fn free_bytes(&self) -> usize {
        let h = self.header();
        let reserved = (h.slot_count as usize + 1) * SLOT_SIZE;
        if reserved > PAGE_SIZE {
            return 0;
        }
        let records_limit = PAGE_SIZE - reserved;
        if (h.free_space_offset as usize) > records_limit {
            return 0;
        }
        records_limit - h.free_space_offset as usize
    }

    // ---- внутреннее ----

    fn slot_pos(slot: SlotId) -> usize {
        PAGE_SIZE - (slot as usize + 1) * SLOT_SIZE
    }

    fn read_slot(&self, slot: SlotId) -> u16 {
        let pos = Self::slot_pos(slot);
        LittleEndian::read_u16(&self.buf[pos..pos + 2])
    }

    fn write_slot(&mut self, slot: SlotId, value: u16) {
        let pos = Self::slot_pos(slot);
        LittleEndian::write_u16(&mut self.buf[pos..pos + 2], value);
    }

    /// Тип должен быть DATA; INVALID молча повышается до DATA
    /// (первая мутация поверх сырой страницы).
    fn require_data_for_write(&mut self, op: &str) -> DbResult<()> {
        let t = self.page_type();
        if t == PageType::Invalid as u8 {
            self.buf[OFF_PAGE_TYPE] = PageType::Data as u8;
            return Ok(());
        }
        if t != PageType::Data as u8 {
            return Err(DbError::invalid_page_type(
                format!("{} on non-DATA page", op),
                self.page_id(),
            ));
        }
        Ok(())
    }

    /// Привести счётчики к здравому состоянию перед мутацией.
    fn repair_header(&mut self) {
        let mut h = self.header();
        let max_slots = ((PAGE_SIZE - PAGE_HEADER_SIZE) / SLOT_SIZE) as u16;
        let mut repaired = false;
        if h.slot_count > max_slots {
            h.slot_count = 0;
            h.record_count = 0;
            repaired = true;
        }
        if h.record_count > h.slot_count {
            h.record_count = h.slot_count;
            repaired = true;
        }
        if (h.free_space_offset as usize) < PAGE_HEADER_SIZE
            || (h.free_space_offset as usize) > PAGE_SIZE
        {
            h.free_space_offset = PAGE_HEADER_SIZE as u16;
            repaired = true;
        }
        if repaired {
            warn!("page {}: corrupt header counters, reset to empty state", h.page_id);
            self.write_header(&h);
        }
    }

    // ---- операции ----

    /// Вставить запись. Ok(None) — не хватает места (нужно len + 2 + слот).
    pub fn insert(&mut self, payload: &[u8]) -> DbResult<Option<SlotId>> {
        if payload.len() > u16::MAX as usize {
            return Err(DbError::record_too_large(payload.len(), u16::MAX as usize));
        }
        self.require_data_for_write("insert")?;
        self.repair_header();

        let mut h = self.header();
        let len = payload.len();
        let needed = len + 2 + SLOT_SIZE;
        if needed > self.free_bytes() {
            return Ok(None);
        }

        let records_limit = PAGE_SIZE - (h.slot_count as usize + 1) * SLOT_SIZE;
        let record_start = h.free_space_offset as usize;
        if record_start + 2 + len > records_limit {
            return Ok(None);
        }

        LittleEndian::write_u16(&mut self.buf[record_start..record_start + 2], len as u16);
        self.buf[record_start + 2..record_start + 2 + len].copy_from_slice(payload);

        let slot = h.slot_count;
        self.write_slot(slot, record_start as u16);

        h.slot_count += 1;
        h.record_count += 1;
        h.free_space_offset = (record_start + 2 + len) as u16;
        self.write_header(&h);
        Ok(Some(slot))
    }

    /// Прочитать запись слота. Ok(None) — слота нет, tombstone или запись
    /// не укладывается в [header, free_space_offset).
    pub fn read(&self, slot: SlotId) -> DbResult<Option<Vec<u8>>> {
        let t = self.page_type();
        if t != PageType::Data as u8 && t != PageType::Invalid as u8 {
            return Err(DbError::invalid_page_type("read on non-DATA page", self.page_id()));
        }
        let h = self.header();
        if slot >= h.slot_count {
            return Ok(None);
        }
        let record_off = self.read_slot(slot) as usize;
        if record_off == SLOT_TOMBSTONE as usize {
            return Ok(None);
        }

        let mut records_end = h.free_space_offset as usize;
        if records_end < PAGE_HEADER_SIZE || records_end > PAGE_SIZE {
            records_end = PAGE_HEADER_SIZE;
        }
        if record_off < PAGE_HEADER_SIZE || record_off + 2 > records_end {
            return Ok(None);
        }
        let len = LittleEndian::read_u16(&self.buf[record_off..record_off + 2]) as usize;
        if record_off + 2 + len > records_end {
            return Ok(None);
        }
        Ok(Some(self.buf[record_off + 2..record_off + 2 + len].to_vec()))
    }

    /// Пометить слот tombstone. Байты записи на странице не освобождаются.
    pub fn erase(&mut self, slot: SlotId) -> DbResult<bool> {
        self.require_data_for_write("erase")?;
        self.repair_header();

        let mut h = self.header();
        if slot >= h.slot_count {
            return Ok(false);
        }
        if self.read_slot(slot) == SLOT_TOMBSTONE {
            return Ok(false);
        }
        self.write_slot(slot, SLOT_TOMBSTONE);
        h.record_count = h.record_count.saturating_sub(1);
        self.write_header(&h);
        Ok(true)
    }

    /// Обновить запись на месте. Ok(false) — слот пуст либо новая длина
    /// больше старой; рост записи решает вызывающий (перенос).
    pub fn update(&mut self, slot: SlotId, payload: &[u8]) -> DbResult<bool> {
        if payload.len() > u16::MAX as usize {
            return Err(DbError::record_too_large(payload.len(), u16::MAX as usize));
        }
        self.require_data_for_write("update")?;
        self.repair_header();

        let h = self.header();
        if slot >= h.slot_count {
            return Ok(false);
        }
        let record_off = self.read_slot(slot) as usize;
        if record_off == SLOT_TOMBSTONE as usize {
            return Ok(false);
        }
        let current_len = LittleEndian::read_u16(&self.buf[record_off..record_off + 2]) as usize;
        let len = payload.len();
        if len > current_len {
            return Ok(false);
        }
        LittleEndian::write_u16(&mut self.buf[record_off..record_off + 2], len as u16);
        self.buf[record_off + 2..record_off + 2 + len].copy_from_slice(payload);
        if current_len > len {
            self.buf[record_off + 2 + len..record_off + 2 + current_len].fill(0);
        }
        Ok(true)
    }

    /// Сбросить страницу-цепочку к пустому состоянию: обнулить тело,
    /// счётчики и ссылки, сохранив id и тип.
    pub fn reset_content(&mut self) {
        let mut h = self.header();
        h.next_page_id = INVALID_PAGE_ID;
        h.prev_page_id = INVALID_PAGE_ID;
        h.record_count = 0;
        h.slot_count = 0;
        h.free_space_offset = PAGE_HEADER_SIZE as u16;
        self.write_header(&h);
        self.buf[PAGE_HEADER_SIZE..].fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
