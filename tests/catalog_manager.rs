use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use kizuna::catalog::{CatalogManager, ColumnConstraint, ColumnDef, TableDef};
use kizuna::errors::ErrorKind;
use kizuna::file::FileManager;
use kizuna::pager::Pager;
use kizuna::types::{DataType, PageId, PageType};

// ---------- helpers ----------

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_db(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("kz-catalog-{prefix}-{pid}-{t}-{id}.kz"))
}

fn open_pager(path: &PathBuf) -> Pager {
    let fm = FileManager::open(path.clone(), true).expect("file open");
    Pager::open(fm, 16).expect("pager open")
}

fn make_root(pager: &mut Pager) -> PageId {
    let root = pager.new_page(PageType::Data).expect("root page");
    pager.unpin(root, false).expect("unpin root");
    root
}

fn users_def() -> TableDef {
    TableDef {
        id: 0,
        name: "users".to_string(),
        columns: vec![
            ColumnDef {
                id: 0,
                name: "id".to_string(),
                data_type: DataType::Integer,
                length: 0,
                constraint: ColumnConstraint {
                    not_null: true,
                    primary_key: true,
                    unique: true,
                    has_default: false,
                    default_value: String::new(),
                },
            },
            ColumnDef {
                id: 0,
                name: "name".to_string(),
                data_type: DataType::Varchar,
                length: 32,
                constraint: ColumnConstraint {
                    not_null: true,
                    ..Default::default()
                },
            },
            ColumnDef {
                id: 0,
                name: "active".to_string(),
                data_type: DataType::Boolean,
                length: 0,
                constraint: ColumnConstraint::default(),
            },
        ],
    }
}

fn tags_def() -> TableDef {
    TableDef {
        id: 0,
        name: "tags".to_string(),
        columns: vec![ColumnDef {
            id: 0,
            name: "tag".to_string(),
            data_type: DataType::Varchar,
            length: 16,
            constraint: ColumnConstraint::default(),
        }],
    }
}

// ---------- tests ----------

#[test]
fn create_table_assigns_ids_and_persists_columns() {
    let path = unique_db("create");
    let mut pager = open_pager(&path);
    let root = make_root(&mut pager);
    let mut catalog = CatalogManager::new(&pager);

    let sql = "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(32) NOT NULL, active BOOLEAN)";
    let entry = catalog.create_table(&mut pager, users_def(), root, sql).unwrap();

    assert_eq!(entry.table_id, 1);
    assert_eq!(entry.root_page_id, root);
    assert_eq!(entry.create_sql, sql);
    assert_eq!(pager.next_table_id(), 2);

    let found = catalog.get_table(&mut pager, "users").unwrap().unwrap();
    assert_eq!(found, entry);
    let by_id = catalog.get_table_by_id(&mut pager, 1).unwrap().unwrap();
    assert_eq!(by_id, entry);

    let columns = catalog.get_columns(&mut pager, entry.table_id).unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].column.name, "id");
    assert!(columns[0].column.constraint.primary_key);
    assert!(columns[0].column.constraint.not_null);
    assert_eq!(columns[1].column.name, "name");
    assert_eq!(columns[1].column.data_type, DataType::Varchar);
    assert_eq!(columns[1].column.length, 32);
    assert_eq!(columns[2].column.name, "active");
    assert_eq!(columns[2].ordinal_position, 2);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn duplicate_table_name_is_rejected() {
    let path = unique_db("dup");
    let mut pager = open_pager(&path);
    let root = make_root(&mut pager);
    let mut catalog = CatalogManager::new(&pager);

    catalog.create_table(&mut pager, users_def(), root, "sql").unwrap();
    let root2 = make_root(&mut pager);
    let err = catalog
        .create_table(&mut pager, users_def(), root2, "sql")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TableExists);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn drop_table_rewrites_both_catalog_pages() {
    let path = unique_db("drop");
    let mut pager = open_pager(&path);
    let users_root = make_root(&mut pager);
    let tags_root = make_root(&mut pager);
    let mut catalog = CatalogManager::new(&pager);

    let users = catalog.create_table(&mut pager, users_def(), users_root, "u").unwrap();
    let tags = catalog.create_table(&mut pager, tags_def(), tags_root, "t").unwrap();

    assert!(catalog.drop_table(&mut pager, "users", false).unwrap());
    assert!(!catalog.drop_table(&mut pager, "users", false).unwrap());

    let tables = catalog.list_tables(&mut pager).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "tags");

    // колонки удалённой таблицы выметены, чужие целы
    assert!(catalog.get_columns(&mut pager, users.table_id).unwrap().is_empty());
    let tag_columns = catalog.get_columns(&mut pager, tags.table_id).unwrap();
    assert_eq!(tag_columns.len(), 1);
    assert_eq!(tag_columns[0].column.name, "tag");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn catalog_survives_reopen() {
    let path = unique_db("reopen");
    {
        let mut pager = open_pager(&path);
        let root = make_root(&mut pager);
        let mut catalog = CatalogManager::new(&pager);
        catalog.create_table(&mut pager, users_def(), root, "sql-text").unwrap();
        pager.flush_all().unwrap();
    }
    {
        let mut pager = open_pager(&path);
        let mut catalog = CatalogManager::new(&pager);
        let tables = catalog.list_tables(&mut pager).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
        assert_eq!(tables[0].create_sql, "sql-text");
        let columns = catalog.get_columns(&mut pager, tables[0].table_id).unwrap();
        assert_eq!(columns.len(), 3);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn table_ids_are_not_reused_after_drop() {
    let path = unique_db("fresh-ids");
    let mut pager = open_pager(&path);
    let mut catalog = CatalogManager::new(&pager);

    let root1 = make_root(&mut pager);
    let first = catalog.create_table(&mut pager, users_def(), root1, "a").unwrap();
    assert_eq!(first.table_id, 1);

    assert!(catalog.drop_table(&mut pager, "users", false).unwrap());

    let root2 = make_root(&mut pager);
    let second = catalog.create_table(&mut pager, users_def(), root2, "b").unwrap();
    assert_eq!(second.table_id, 2, "dropped table id must not be recycled");

    let _ = std::fs::remove_file(&path);
}
