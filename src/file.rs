//! file — постраничный ввод/вывод в единственном файле БД.
//!
//! Страницы адресуются 1-based id; байтовое смещение на диске:
//! (id - 1) * PAGE_SIZE. Каждая запись страницы завершается fsync —
//! «последняя успешная запись страницы долговечна».

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::consts::{DB_FILE_EXTENSION, FIRST_PAGE_ID, PAGE_SIZE};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::types::{PageId, TableId};

#[derive(Debug)]
pub struct FileManager {
    path: PathBuf,
    file: File,
}

impl FileManager {
    /// Открыть (или создать при create_if_missing) файл БД на чтение/запись.
    pub fn open(path: impl Into<PathBuf>, create_if_missing: bool) -> DbResult<Self> {
        let path = path.into();

        if create_if_missing {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| {
                        DbError::new(ErrorKind::IoError, format!("create parent dir: {}", e))
                            .with_context(parent.display().to_string())
                    })?;
                }
            }
        }

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_if_missing)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DbError::new(ErrorKind::FileNotFound, "failed to open database file")
                    .with_context(path.display().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(DbError::new(ErrorKind::PermissionDenied, "failed to open database file")
                    .with_context(path.display().to_string()));
            }
            Err(e) => {
                return Err(DbError::new(ErrorKind::IoError, e.to_string())
                    .with_context(path.display().to_string()));
            }
        };

        Ok(Self { path, file })
    }

    /// Закрыть файл, сбросив буферы ОС.
    pub fn close(self) -> DbResult<()> {
        self.file
            .sync_all()
            .map_err(|e| DbError::new(ErrorKind::IoError, e.to_string()))?;
        Ok(())
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> DbResult<u64> {
        let md = self
            .file
            .metadata()
            .map_err(|e| DbError::new(ErrorKind::IoError, format!("file size: {}", e)))?;
        Ok(md.len())
    }

    pub fn page_count(&self) -> DbResult<u64> {
        Ok(self.size_bytes()? / PAGE_SIZE as u64)
    }

    #[inline]
    fn page_offset(page_id: PageId) -> u64 {
        // Страница 1 начинается со смещения 0.
        (page_id as u64 - 1) * PAGE_SIZE as u64
    }

    pub fn read_page(&mut self, page_id: PageId, out: &mut [u8]) -> DbResult<()> {
        if out.len() != PAGE_SIZE {
            return Err(DbError::invalid_argument(
                "invalid read length (must be PAGE_SIZE)",
                out.len().to_string(),
            ));
        }
        if page_id < FIRST_PAGE_ID {
            return Err(DbError::page_not_found(page_id));
        }

        let off = Self::page_offset(page_id);
        let size = self.size_bytes()?;
        if off + PAGE_SIZE as u64 > size {
            return Err(DbError::new(ErrorKind::PageNotFound, "page beyond EOF")
                .with_context(page_id.to_string()));
        }

        self.file
            .seek(SeekFrom::Start(off))
            .map_err(|e| DbError::new(ErrorKind::SeekError, format!("seek for read: {}", e)))?;
        self.file
            .read_exact(out)
            .map_err(|e| DbError::new(ErrorKind::ReadError, format!("short read: {}", e))
                .with_context(page_id.to_string()))?;
        Ok(())
    }

    pub fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> DbResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DbError::invalid_argument(
                "invalid write length (must be PAGE_SIZE)",
                buf.len().to_string(),
            ));
        }
        if page_id < FIRST_PAGE_ID {
            return Err(DbError::new(ErrorKind::InvalidOffset, "invalid page id for write")
                .with_context(page_id.to_string()));
        }

        let off = Self::page_offset(page_id);
        self.file
            .seek(SeekFrom::Start(off))
            .map_err(|e| DbError::new(ErrorKind::SeekError, format!("seek for write: {}", e)))?;
        self.file
            .write_all(buf)
            .map_err(|e| DbError::new(ErrorKind::WriteError, format!("write page: {}", e))
                .with_context(page_id.to_string()))?;
        self.file
            .sync_all()
            .map_err(|e| DbError::new(ErrorKind::WriteError, format!("fsync: {}", e)))?;
        Ok(())
    }

    /// Дописать нулевую страницу в конец файла, вернуть её 1-based id.
    pub fn allocate_page(&mut self) -> DbResult<PageId> {
        let next_id = self.page_count()? + 1;
        let zeros = vec![0u8; PAGE_SIZE];
        self.write_page(next_id as PageId, &zeros)?;
        Ok(next_id as PageId)
    }

    // ---- sidecar-файлы таблиц ----

    /// Имя sidecar-файла таблицы по её id.
    pub fn table_filename(table_id: TableId) -> String {
        format!("table_{:06}{}", table_id, DB_FILE_EXTENSION)
    }

    /// Путь sidecar-файла таблицы в каталоге directory.
    pub fn table_path(table_id: TableId, directory: &Path) -> PathBuf {
        directory.join(Self::table_filename(table_id))
    }
}
