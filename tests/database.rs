use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use kizuna::errors::ErrorKind;
use kizuna::{Database, ExecOutput};

// ---------- helpers ----------

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("kz-db-{prefix}-{pid}-{t}-{id}"))
}

// ---------- tests ----------

#[test]
fn fresh_database_has_empty_catalog() {
    let root = unique_root("fresh");
    std::fs::create_dir_all(&root).unwrap();
    let mut db = Database::open(root.join("app.kz"), true).unwrap();

    assert!(db.list_tables().unwrap().is_empty());
    assert_eq!(db.pager().file().page_count().unwrap(), 3);
    assert_eq!(db.pager().free_count(), 0);
    assert_eq!(db.pager().next_table_id(), 1);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn execute_renders_result_lines() {
    let root = unique_root("render");
    std::fs::create_dir_all(&root).unwrap();
    let mut db = Database::open(root.join("app.kz"), true).unwrap();

    let out = db.execute("CREATE TABLE users (id INTEGER, name VARCHAR(16));").unwrap();
    assert_eq!(out.render(), "Table created: users");

    let out = db.execute("INSERT INTO users (id,name) VALUES (1,'a'),(2,'b');").unwrap();
    assert_eq!(out.render(), "Rows inserted: 2");

    let out = db.execute("SELECT * FROM users;").unwrap();
    assert_eq!(out.render(), "Rows returned: 2");

    let out = db.execute("UPDATE users SET name='c' WHERE id=1;").unwrap();
    assert_eq!(out.render(), "Rows updated: 1");

    let out = db.execute("DELETE FROM users WHERE id=2;").unwrap();
    assert_eq!(out.render(), "Rows deleted: 1");

    let out = db.execute("TRUNCATE users;").unwrap();
    assert_eq!(out.render(), "Table truncated");

    let out = db.execute("DROP TABLE users;").unwrap();
    assert_eq!(out.render(), "Table dropped: users");

    let out = db.execute("DROP TABLE IF EXISTS users;").unwrap();
    assert_eq!(out.render(), "Table not found (no-op): users");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn data_survives_close_and_reopen() {
    let root = unique_root("reopen");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join("app.kz");

    {
        let mut db = Database::open(&path, true).unwrap();
        db.execute("CREATE TABLE notes (id INTEGER, body VARCHAR(32));").unwrap();
        db.execute("INSERT INTO notes (id,body) VALUES (1,'first'),(2,'second');").unwrap();
        db.flush().unwrap();
    }

    {
        let mut db = Database::open(&path, false).unwrap();
        let out = db.execute("SELECT body FROM notes WHERE id = 2;").unwrap();
        match out {
            ExecOutput::Select(result) => {
                assert_eq!(result.rows, vec![vec!["second".to_string()]]);
            }
            other => panic!("expected select, got {:?}", other),
        }
    }

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn second_opener_hits_the_lock() {
    let root = unique_root("lock");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join("app.kz");

    let _db = Database::open(&path, true).unwrap();
    let err = Database::open(&path, true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LockTimeout);
    assert!(err.is_recoverable());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn lock_is_released_on_close() {
    let root = unique_root("unlock");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join("app.kz");

    {
        let _db = Database::open(&path, true).unwrap();
    }
    // после Drop фасада lock свободен
    let _db = Database::open(&path, false).unwrap();

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn open_missing_without_create_fails() {
    let root = unique_root("missing");
    std::fs::create_dir_all(&root).unwrap();
    let err = Database::open(root.join("ghost.kz"), false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FileNotFound);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn syntax_error_carries_statement_context() {
    let root = unique_root("syntax");
    std::fs::create_dir_all(&root).unwrap();
    let mut db = Database::open(root.join("app.kz"), true).unwrap();

    let err = db.execute("SELEKT * FROM t;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    let rendered = err.to_string();
    assert!(rendered.starts_with("[SYNTAX_ERROR]"), "got: {rendered}");

    let _ = std::fs::remove_dir_all(&root);
}
