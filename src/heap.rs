//! heap — цепная куча таблицы.
//!
//! Строки таблицы живут в двусвязной цепочке DATA-страниц, начиная с
//! корня. Вставка идёт с хвоста; при нехватке места цепочка наращивается
//! новой страницей через пул. Update растущей записи переносит строку
//! (erase + insert), поэтому RowLocation — транзитный хэндл.
//!
//! Дисциплина пинов: каждый fetch уравновешен unpin на всех путях;
//! итератор не держит ссылку на страницу через yield — payload
//! копируется наружу.

use crate::consts::{FIRST_PAGE_ID, INVALID_PAGE_ID};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::pager::Pager;
use crate::types::{PageId, PageType, RowLocation, SlotId};

#[derive(Debug)]
pub struct TableHeap<'p> {
    pager: &'p mut Pager,
    root_page_id: PageId,
    tail_page_id: PageId,
}

impl<'p> TableHeap<'p> {
    /// Привязаться к корню таблицы. Корень обязан быть DATA-страницей;
    /// хвост цепочки кэшируется на время жизни кучи.
    pub fn new(pager: &'p mut Pager, root_page_id: PageId) -> DbResult<Self> {
        if root_page_id < FIRST_PAGE_ID {
            return Err(DbError::invalid_argument("invalid table root", root_page_id.to_string()));
        }

        let page_type = {
            let page = pager.fetch(root_page_id, true)?;
            page.page_type()
        };
        if page_type != PageType::Data as u8 {
            pager.unpin(root_page_id, false)?;
            return Err(DbError::invalid_page_type("table root is not DATA", root_page_id));
        }
        pager.unpin(root_page_id, false)?;

        let mut heap = Self {
            pager,
            root_page_id,
            tail_page_id: root_page_id,
        };
        heap.tail_page_id = heap.find_tail(root_page_id)?;
        Ok(heap)
    }

    #[inline]
    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    #[inline]
    pub fn tail_page_id(&self) -> PageId {
        self.tail_page_id
    }

    fn find_tail(&mut self, start: PageId) -> DbResult<PageId> {
        let mut current = start;
        while current >= FIRST_PAGE_ID {
            let next = {
                let page = self.pager.fetch(current, true)?;
                page.next_page_id()
            };
            self.pager.unpin(current, false)?;
            if next < FIRST_PAGE_ID {
                return Ok(current);
            }
            current = next;
        }
        Ok(start)
    }

    /// Вставить запись, начиная с хвоста цепочки.
    pub fn insert(&mut self, payload: &[u8]) -> DbResult<RowLocation> {
        if payload.len() > u16::MAX as usize {
            return Err(DbError::record_too_large(payload.len(), u16::MAX as usize));
        }

        let mut current = self.tail_page_id;
        while current >= FIRST_PAGE_ID {
            let (insert_res, next) = {
                let page = self.pager.fetch(current, true)?;
                let res = page.insert(payload);
                let next = page.next_page_id();
                (res, next)
            };
            match insert_res {
                Ok(Some(slot)) => {
                    self.pager.unpin(current, true)?;
                    self.tail_page_id = current;
                    return Ok(RowLocation::new(current, slot));
                }
                Ok(None) => {
                    self.pager.unpin(current, false)?;
                    if next >= FIRST_PAGE_ID {
                        current = next;
                        continue;
                    }
                    return self.append_new_page(current, payload);
                }
                Err(err) => {
                    self.pager.unpin(current, false)?;
                    return Err(err);
                }
            }
        }
        let root = self.root_page_id;
        self.append_new_page(root, payload)
    }

    /// Нарастить цепочку новой страницей и вставить запись в неё.
    fn append_new_page(&mut self, previous_tail: PageId, payload: &[u8]) -> DbResult<RowLocation> {
        let new_page_id = self.pager.new_page(PageType::Data)?; // вернулась запиненной

        let insert_res = {
            let page = self.pager.fetch(new_page_id, false)?; // пин уже наш
            page.set_prev_page_id(previous_tail);
            page.set_next_page_id(INVALID_PAGE_ID);
            page.insert(payload)
        };
        match insert_res {
            Ok(Some(slot)) => {
                self.pager.unpin(new_page_id, true)?;
                // замкнуть ссылку из старого хвоста
                {
                    let prev = self.pager.fetch(previous_tail, true)?;
                    prev.set_next_page_id(new_page_id);
                }
                self.pager.unpin(previous_tail, true)?;
                self.tail_page_id = new_page_id;
                Ok(RowLocation::new(new_page_id, slot))
            }
            Ok(None) => {
                self.pager.unpin(new_page_id, false)?;
                self.pager.free_page(new_page_id)?;
                Err(DbError::new(ErrorKind::PageFull, "record does not fit in empty page")
                    .with_context(payload.len().to_string()))
            }
            Err(err) => {
                self.pager.unpin(new_page_id, false)?;
                Err(err)
            }
        }
    }

    /// Прочитать строку. Ok(None) — слота нет или он затёрт.
    pub fn read(&mut self, loc: RowLocation) -> DbResult<Option<Vec<u8>>> {
        if loc.page_id < FIRST_PAGE_ID {
            return Ok(None);
        }
        let res = {
            let page = self.pager.fetch(loc.page_id, true)?;
            page.read(loc.slot_id)
        };
        self.pager.unpin(loc.page_id, false)?;
        res
    }

    /// Затереть строку tombstone'ом.
    pub fn erase(&mut self, loc: RowLocation) -> DbResult<bool> {
        if loc.page_id < FIRST_PAGE_ID {
            return Ok(false);
        }
        let res = {
            let page = self.pager.fetch(loc.page_id, true)?;
            page.erase(loc.slot_id)
        };
        match res {
            Ok(erased) => {
                self.pager.unpin(loc.page_id, erased)?;
                Ok(erased)
            }
            Err(err) => {
                self.pager.unpin(loc.page_id, false)?;
                Err(err)
            }
        }
    }

    /// Обновить строку: на месте, если новая запись не длиннее старой,
    /// иначе перенос (erase + insert) — RowLocation меняется.
    pub fn update(&mut self, loc: RowLocation, payload: &[u8]) -> DbResult<RowLocation> {
        if payload.len() > u16::MAX as usize {
            return Err(DbError::record_too_large(payload.len(), u16::MAX as usize));
        }
        if loc.page_id < FIRST_PAGE_ID {
            return Err(DbError::new(ErrorKind::RecordNotFound, "invalid page for update")
                .with_context(loc.page_id.to_string()));
        }

        let res = {
            let page = self.pager.fetch(loc.page_id, true)?;
            page.update(loc.slot_id, payload)
        };
        match res {
            Ok(true) => {
                self.pager.unpin(loc.page_id, true)?;
                Ok(loc)
            }
            Ok(false) => {
                self.pager.unpin(loc.page_id, false)?;
                if !self.erase(loc)? {
                    return Err(DbError::new(ErrorKind::RecordNotFound, "update erase failed")
                        .with_context(loc.page_id.to_string()));
                }
                self.insert(payload)
            }
            Err(err) => {
                self.pager.unpin(loc.page_id, false)?;
                Err(err)
            }
        }
    }

    /// Освободить все страницы цепочки, кроме корня; корень опустошить.
    pub fn truncate(&mut self) -> DbResult<()> {
        let next = {
            let root = self.pager.fetch(self.root_page_id, true)?;
            let next = root.next_page_id();
            root.reset_content();
            next
        };
        self.pager.unpin(self.root_page_id, true)?;

        let mut current = next;
        while current >= FIRST_PAGE_ID {
            let nxt = {
                let page = self.pager.fetch(current, true)?;
                page.next_page_id()
            };
            self.pager.unpin(current, false)?;
            self.pager.free_page(current)?;
            current = nxt;
        }

        self.tail_page_id = self.root_page_id;
        Ok(())
    }

    /// Итератор живых строк в порядке вставки. Payload копируется;
    /// между страницами пин не удерживается. Небезопасен поверх
    /// одновременных мутаций той же кучи.
    pub fn iter(&mut self) -> HeapIter<'_, 'p> {
        let page_id = self.root_page_id;
        HeapIter {
            heap: self,
            page_id,
            slot: 0,
            done: false,
        }
    }

    /// Собрать все живые строки (двухфазным мутациям нужен список целиком).
    pub fn scan(&mut self) -> DbResult<Vec<(RowLocation, Vec<u8>)>> {
        let mut rows = Vec::new();
        for item in self.iter() {
            rows.push(item?);
        }
        Ok(rows)
    }
}

pub struct HeapIter<'h, 'p> {
    heap: &'h mut TableHeap<'p>,
    page_id: PageId,
    slot: SlotId,
    done: bool,
}

impl<'h, 'p> Iterator for HeapIter<'h, 'p> {
    type Item = DbResult<(RowLocation, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.page_id >= FIRST_PAGE_ID {
            let (slot_count, next) = match self.heap.pager.fetch(self.page_id, true) {
                Ok(page) => (page.slot_count(), page.next_page_id()),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            while self.slot < slot_count {
                // страница запинена нами; повторный fetch без пина
                let read_res = match self.heap.pager.fetch(self.page_id, false) {
                    Ok(page) => page.read(self.slot),
                    Err(err) => {
                        let _ = self.heap.pager.unpin(self.page_id, false);
                        self.done = true;
                        return Some(Err(err));
                    }
                };
                match read_res {
                    Ok(Some(payload)) => {
                        let loc = RowLocation::new(self.page_id, self.slot);
                        self.slot += 1;
                        if let Err(err) = self.heap.pager.unpin(self.page_id, false) {
                            self.done = true;
                            return Some(Err(err));
                        }
                        return Some(Ok((loc, payload)));
                    }
                    Ok(None) => {
                        // tombstone либо битый слот — пропускаем
                        self.slot += 1;
                    }
                    Err(err) => {
                        let _ = self.heap.pager.unpin(self.page_id, false);
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }

            if let Err(err) = self.heap.pager.unpin(self.page_id, false) {
                self.done = true;
                return Some(Err(err));
            }
            self.page_id = next;
            self.slot = 0;
        }

        self.done = true;
        None
    }
}
