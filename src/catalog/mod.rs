//! catalog — самоописывающие метаданные таблиц и колонок.

mod manager;
mod schema;

pub use manager::CatalogManager;
pub use schema::{
    decode_constraints, encode_constraints, ColumnCatalogEntry, ColumnConstraint, ColumnDef,
    TableCatalogEntry, TableDef,
};
