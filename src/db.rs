//! db — фасад базы данных.
//!
//! Владеет пулом страниц и каталогом, держит эксклюзивный lock-файл на
//! всё время жизни (второй открыватель получает LOCK_TIMEOUT) и
//! диспетчеризует SQL-текст в DDL/DML-исполнители.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::info;

use crate::catalog::{CatalogManager, TableCatalogEntry};
use crate::consts::{DEFAULT_CACHE_SIZE, LOCK_FILE_EXTENSION};
use crate::engine::{DdlExecutor, DmlExecutor, SelectResult};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::file::FileManager;
use crate::pager::Pager;
use crate::sql::{self, ast::Statement};

/// Результат выполнения одного стейтмента.
#[derive(Debug, Clone)]
pub enum ExecOutput {
    TableCreated(String),
    TableDropped(String),
    /// DROP TABLE IF EXISTS по отсутствующей таблице.
    NoOp(String),
    Inserted(usize),
    Select(SelectResult),
    Deleted(usize),
    Updated(usize),
    Truncated,
}

impl ExecOutput {
    /// Человекочитаемая строка результата.
    pub fn render(&self) -> String {
        match self {
            ExecOutput::TableCreated(name) => format!("Table created: {}", name),
            ExecOutput::TableDropped(name) => format!("Table dropped: {}", name),
            ExecOutput::NoOp(name) => format!("Table not found (no-op): {}", name),
            ExecOutput::Inserted(n) => format!("Rows inserted: {}", n),
            ExecOutput::Select(result) => format!("Rows returned: {}", result.rows.len()),
            ExecOutput::Deleted(n) => format!("Rows deleted: {}", n),
            ExecOutput::Updated(n) => format!("Rows updated: {}", n),
            ExecOutput::Truncated => "Table truncated".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    pager: Pager,
    catalog: CatalogManager,
    _lock: File, // держим дескриптор до закрытия
}

impl Database {
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> DbResult<Self> {
        Self::open_with_capacity(path, create_if_missing, DEFAULT_CACHE_SIZE)
    }

    pub fn open_with_capacity(
        path: impl AsRef<Path>,
        create_if_missing: bool,
        cache_capacity: usize,
    ) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = Self::acquire_lock(&path)?;

        let file = FileManager::open(path.clone(), create_if_missing)?;
        let pager = Pager::open(file, cache_capacity)?;
        let catalog = CatalogManager::new(&pager);

        info!("database open: {}", path.display());
        Ok(Self {
            path,
            pager,
            catalog,
            _lock: lock,
        })
    }

    fn acquire_lock(path: &Path) -> DbResult<File> {
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_FILE_EXTENSION));
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| DbError::new(ErrorKind::IoError, format!("open lock file: {}", e))
                .with_context(lock_path.display().to_string()))?;
        lock.try_lock_exclusive().map_err(|_| {
            DbError::new(ErrorKind::LockTimeout, "database is locked by another process")
                .with_context(lock_path.display().to_string())
        })?;
        Ok(lock)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    #[inline]
    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    /// Выполнить один SQL-стейтмент.
    pub fn execute(&mut self, sql_text: &str) -> DbResult<ExecOutput> {
        let statement = sql::parse_statement(sql_text)?;
        match statement {
            Statement::CreateTable(stmt) => {
                let entry = DdlExecutor::new(&mut self.catalog, &mut self.pager)
                    .create_table(&stmt, sql_text)?;
                Ok(ExecOutput::TableCreated(entry.name))
            }
            Statement::DropTable(stmt) => {
                let dropped =
                    DdlExecutor::new(&mut self.catalog, &mut self.pager).drop_table(&stmt)?;
                if dropped {
                    Ok(ExecOutput::TableDropped(stmt.table_name))
                } else {
                    Ok(ExecOutput::NoOp(stmt.table_name))
                }
            }
            Statement::Insert(stmt) => {
                let n = DmlExecutor::new(&mut self.catalog, &mut self.pager).insert(&stmt)?;
                Ok(ExecOutput::Inserted(n))
            }
            Statement::Select(stmt) => {
                let result = DmlExecutor::new(&mut self.catalog, &mut self.pager).select(&stmt)?;
                Ok(ExecOutput::Select(result))
            }
            Statement::Delete(stmt) => {
                let n = DmlExecutor::new(&mut self.catalog, &mut self.pager).delete(&stmt)?;
                Ok(ExecOutput::Deleted(n))
            }
            Statement::Update(stmt) => {
                let n = DmlExecutor::new(&mut self.catalog, &mut self.pager).update(&stmt)?;
                Ok(ExecOutput::Updated(n))
            }
            Statement::Truncate(stmt) => {
                DmlExecutor::new(&mut self.catalog, &mut self.pager).truncate(&stmt)?;
                Ok(ExecOutput::Truncated)
            }
        }
    }

    pub fn list_tables(&mut self) -> DbResult<Vec<TableCatalogEntry>> {
        self.catalog.list_tables(&mut self.pager)
    }

    /// Сбросить все грязные страницы на диск.
    pub fn flush(&mut self) -> DbResult<()> {
        self.pager.flush_all()
    }
}
