//! engine/ddl — исполнитель CREATE TABLE / DROP TABLE.
//!
//! CREATE валидирует схему, выделяет корневую DATA-страницу, пишет
//! запись каталога и создаёт sidecar-файл таблицы; провал sidecar'а
//! откатывает каталог и возвращает корень во freelist. DROP убирает
//! записи каталога, освобождает корень и удаляет sidecar.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use log::{info, warn};

use crate::catalog::{
    CatalogManager, ColumnConstraint, ColumnDef, TableCatalogEntry, TableDef,
};
use crate::consts::{DEFAULT_DB_DIR, MAX_COLUMNS_PER_TABLE};
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::file::FileManager;
use crate::pager::Pager;
use crate::sql::ast::{ColumnConstraintAst, ColumnDefAst, CreateTableStatement, DropTableStatement};
use crate::types::{ColumnId, PageType};

pub struct DdlExecutor<'a> {
    catalog: &'a mut CatalogManager,
    pager: &'a mut Pager,
}

fn map_constraint(constraint: &ColumnConstraintAst) -> ColumnConstraint {
    ColumnConstraint {
        not_null: constraint.not_null || constraint.primary_key,
        primary_key: constraint.primary_key,
        unique: constraint.unique || constraint.primary_key,
        has_default: constraint.default_literal.is_some(),
        default_value: constraint.default_literal.clone().unwrap_or_default(),
    }
}

fn map_column(index: usize, ast: &ColumnDefAst) -> ColumnDef {
    ColumnDef {
        id: (index + 1) as ColumnId,
        name: ast.name.clone(),
        data_type: ast.data_type,
        length: ast.length,
        constraint: map_constraint(&ast.constraint),
    }
}

impl<'a> DdlExecutor<'a> {
    pub fn new(catalog: &'a mut CatalogManager, pager: &'a mut Pager) -> Self {
        Self { catalog, pager }
    }

    /// Каталог sidecar-файлов: рядом с файлом БД.
    fn sidecar_dir(&self) -> PathBuf {
        self.pager
            .file()
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR))
    }

    pub fn create_table(
        &mut self,
        stmt: &CreateTableStatement,
        original_sql: &str,
    ) -> DbResult<TableCatalogEntry> {
        if stmt.table_name.is_empty() {
            return Err(DbError::syntax_error(original_sql, 0, "table name"));
        }
        if stmt.columns.is_empty() {
            return Err(DbError::syntax_error(original_sql, 0, "column list"));
        }
        if stmt.columns.len() > MAX_COLUMNS_PER_TABLE {
            return Err(DbError::constraint_violation("too many columns"));
        }

        let mut seen_names = HashSet::new();
        let mut primary_key_seen = false;
        let mut columns = Vec::with_capacity(stmt.columns.len());
        for (i, column_ast) in stmt.columns.iter().enumerate() {
            if column_ast.name.is_empty() {
                return Err(DbError::syntax_error(original_sql, 0, "column name"));
            }
            if !seen_names.insert(column_ast.name.to_ascii_uppercase()) {
                return Err(DbError::new(ErrorKind::SemanticError, "duplicate column name")
                    .with_context(column_ast.name.clone()));
            }
            let column = map_column(i, column_ast);
            if column.constraint.primary_key {
                if primary_key_seen {
                    return Err(DbError::constraint_violation("multiple PRIMARY KEY columns"));
                }
                primary_key_seen = true;
            }
            columns.push(column);
        }

        let def = TableDef {
            id: 0, // каталог выдаст
            name: stmt.table_name.clone(),
            columns,
        };

        let root_page_id = self.pager.new_page(PageType::Data)?;
        self.pager.unpin(root_page_id, false)?;

        let entry = self.catalog.create_table(self.pager, def, root_page_id, original_sql)?;

        // sidecar для внешнего инструментария; провал — откат
        let dir = self.sidecar_dir();
        let table_file = FileManager::table_path(entry.table_id, &dir);
        let touch = (|| -> std::io::Result<()> {
            fs::create_dir_all(&dir)?;
            fs::File::create(&table_file)?;
            Ok(())
        })();
        if let Err(io_err) = touch {
            warn!("sidecar create failed for '{}': {}", entry.name, io_err);
            self.catalog.drop_table(self.pager, &entry.name, true)?;
            self.pager.free_page(entry.root_page_id)?;
            return Err(DbError::new(ErrorKind::WriteError, "failed to create table file")
                .with_context(table_file.display().to_string()));
        }

        info!("ddl: created table '{}' root={}", entry.name, entry.root_page_id);
        Ok(entry)
    }

    /// true — таблица удалена; false — не было и IF EXISTS.
    pub fn drop_table(&mut self, stmt: &DropTableStatement) -> DbResult<bool> {
        let entry = match self.catalog.get_table(self.pager, &stmt.table_name)? {
            Some(entry) => entry,
            None => {
                if stmt.if_exists {
                    return Ok(false);
                }
                return Err(DbError::table_not_found(stmt.table_name.clone()));
            }
        };

        let removed = self.catalog.drop_table(self.pager, &stmt.table_name, stmt.cascade)?;
        if !removed {
            if stmt.if_exists {
                return Ok(false);
            }
            return Err(DbError::table_not_found(stmt.table_name.clone()));
        }

        self.pager.free_page(entry.root_page_id)?;

        let table_file = FileManager::table_path(entry.table_id, &self.sidecar_dir());
        if table_file.exists() {
            if let Err(io_err) = fs::remove_file(&table_file) {
                warn!("sidecar remove failed for '{}': {}", entry.name, io_err);
            }
        }

        info!("ddl: dropped table '{}'", entry.name);
        Ok(true)
    }
}
