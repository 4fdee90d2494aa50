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
    std::env::temp_dir().join(format!("kz-dml-{prefix}-{pid}-{t}-{id}"))
}

fn open_db(prefix: &str) -> (Database, PathBuf) {
    let root = unique_root(prefix);
    std::fs::create_dir_all(&root).expect("create root dir");
    let path = root.join("app.kz");
    let db = Database::open(&path, true).expect("db open");
    (db, root)
}

fn select_rows(db: &mut Database, sql: &str) -> (Vec<String>, Vec<Vec<String>>) {
    match db.execute(sql).expect("select") {
        ExecOutput::Select(result) => (result.column_names, result.rows),
        other => panic!("expected select output, got {:?}", other),
    }
}

fn setup_users(db: &mut Database) {
    db.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(32) NOT NULL, active BOOLEAN);",
    )
    .expect("create users");
    db.execute(
        "INSERT INTO users (id,name,active) VALUES (1,'alice',TRUE),(2,'bob',FALSE),(3,'cara',TRUE);",
    )
    .expect("insert users");
}

// ---------- tests ----------

#[test]
fn insert_select_with_predicate_and_limit() {
    let (mut db, root) = open_db("select");
    setup_users(&mut db);

    let (header, rows) = select_rows(&mut db, "SELECT name FROM users WHERE active LIMIT 1;");
    assert_eq!(header, vec!["name"]);
    assert_eq!(rows, vec![vec!["alice".to_string()]]);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn select_star_expansion_and_limit_zero() {
    let (mut db, root) = open_db("star");
    setup_users(&mut db);

    let (header, rows) = select_rows(&mut db, "SELECT * FROM users;");
    assert_eq!(header, vec!["id", "name", "active"]);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["1", "alice", "TRUE"]);

    // повторная звёздочка не дублирует колонки, именованная — добавляет
    let (header, rows) = select_rows(&mut db, "SELECT *, *, id FROM users LIMIT 2;");
    assert_eq!(header, vec!["id", "name", "active", "id"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], vec!["2", "bob", "FALSE", "2"]);

    // LIMIT 0: заголовки есть, строк нет
    let (header, rows) = select_rows(&mut db, "SELECT id FROM users LIMIT 0;");
    assert_eq!(header, vec!["id"]);
    assert!(rows.is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn update_in_place_and_relocated() {
    let (mut db, root) = open_db("update");
    setup_users(&mut db);

    // короче — на месте
    let out = db.execute("UPDATE users SET name='ally' WHERE id=1;").unwrap();
    assert!(matches!(out, ExecOutput::Updated(1)));

    // длиннее — перенос строки
    let out = db
        .execute("UPDATE users SET name='this string is definitely longe' WHERE id=3;")
        .unwrap();
    assert!(matches!(out, ExecOutput::Updated(1)));

    let (_, rows) = select_rows(&mut db, "SELECT id,name FROM users;");
    assert_eq!(
        rows,
        vec![
            vec!["1".to_string(), "ally".to_string()],
            vec!["2".to_string(), "bob".to_string()],
            vec!["3".to_string(), "this string is definitely longe".to_string()],
        ]
    );

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn update_rhs_uses_pre_update_values() {
    let (mut db, root) = open_db("two-pass");
    db.execute("CREATE TABLE pairs (a INTEGER, b INTEGER);").unwrap();
    db.execute("INSERT INTO pairs (a,b) VALUES (1,10),(2,20);").unwrap();

    // b := a, a := b — обе части считаются от старой строки
    let out = db.execute("UPDATE pairs SET a = b, b = a;").unwrap();
    assert!(matches!(out, ExecOutput::Updated(2)));

    let (_, rows) = select_rows(&mut db, "SELECT a,b FROM pairs;");
    assert_eq!(
        rows,
        vec![
            vec!["10".to_string(), "1".to_string()],
            vec!["20".to_string(), "2".to_string()],
        ]
    );

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn three_valued_predicates() {
    let (mut db, root) = open_db("tri");
    db.execute("CREATE TABLE e (id INTEGER, nickname VARCHAR(32), active BOOLEAN);")
        .unwrap();
    db.execute(
        "INSERT INTO e (id,nickname,active) VALUES \
         (1,'ace',TRUE), (2,NULL,TRUE), (3,'cee',FALSE), (4,NULL,TRUE);",
    )
    .unwrap();

    let (_, rows) = select_rows(&mut db, "SELECT id FROM e WHERE nickname IS NULL;");
    assert_eq!(rows, vec![vec!["2".to_string()], vec!["4".to_string()]]);

    let (_, rows) = select_rows(&mut db, "SELECT id FROM e WHERE nickname IS NOT NULL;");
    assert_eq!(rows, vec![vec!["1".to_string()], vec!["3".to_string()]]);

    // NULL-сравнение даёт Unknown и отфильтровывает строку
    let (_, rows) = select_rows(&mut db, "SELECT id FROM e WHERE nickname = 'ace' OR NOT active;");
    assert_eq!(rows, vec![vec!["1".to_string()], vec!["3".to_string()]]);

    let (_, rows) = select_rows(&mut db, "SELECT id FROM e WHERE nickname <> 'ace';");
    assert_eq!(rows, vec![vec!["3".to_string()]]);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn delete_with_and_without_predicate() {
    let (mut db, root) = open_db("delete");
    setup_users(&mut db);

    let out = db.execute("DELETE FROM users WHERE active = FALSE;").unwrap();
    assert!(matches!(out, ExecOutput::Deleted(1)));

    let (_, rows) = select_rows(&mut db, "SELECT id FROM users;");
    assert_eq!(rows, vec![vec!["1".to_string()], vec!["3".to_string()]]);

    let out = db.execute("DELETE FROM users;").unwrap();
    assert!(matches!(out, ExecOutput::Deleted(2)));
    let (_, rows) = select_rows(&mut db, "SELECT id FROM users;");
    assert!(rows.is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn truncate_empties_table() {
    let (mut db, root) = open_db("truncate");
    setup_users(&mut db);

    let out = db.execute("TRUNCATE TABLE users;").unwrap();
    assert!(matches!(out, ExecOutput::Truncated));
    let (_, rows) = select_rows(&mut db, "SELECT id FROM users;");
    assert!(rows.is_empty());

    // таблица живая: вставка после truncate работает
    db.execute("INSERT INTO users (id,name,active) VALUES (9,'zed',TRUE);").unwrap();
    let (_, rows) = select_rows(&mut db, "SELECT name FROM users;");
    assert_eq!(rows, vec![vec!["zed".to_string()]]);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn varchar_length_is_enforced() {
    let (mut db, root) = open_db("varchar");
    db.execute("CREATE TABLE notes (body VARCHAR(8));").unwrap();

    // ровно в границу — проходит
    db.execute("INSERT INTO notes (body) VALUES ('12345678');").unwrap();

    let err = db
        .execute("INSERT INTO notes (body) VALUES ('123456789');")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstraintViolation);

    let err = db
        .execute("UPDATE notes SET body = 'way too long for varchar8';")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstraintViolation);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn not_null_violation_reports_offending_row() {
    let (mut db, root) = open_db("notnull");
    db.execute("CREATE TABLE t (id INTEGER, name VARCHAR(16) NOT NULL);").unwrap();

    let err = db
        .execute("INSERT INTO t (id,name) VALUES (1,'ok'), (2,NULL);")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstraintViolation);
    let ctx = err.context.clone().unwrap_or_default();
    assert!(ctx.contains("row 1"), "context must name the bad row: {ctx}");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn type_mismatches_are_type_errors() {
    let (mut db, root) = open_db("types");
    db.execute("CREATE TABLE t (id INTEGER, joined DATE);").unwrap();

    let err = db.execute("INSERT INTO t (id,joined) VALUES ('abc','2024-01-01');").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    let err = db.execute("INSERT INTO t (id,joined) VALUES (1,'not-a-date');").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    // строка в голове предиката — TYPE_ERROR
    db.execute("CREATE TABLE s (name VARCHAR(8));").unwrap();
    db.execute("INSERT INTO s (name) VALUES ('x');").unwrap();
    let err = db.execute("SELECT name FROM s WHERE name;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn date_columns_roundtrip_and_compare() {
    let (mut db, root) = open_db("dates");
    db.execute("CREATE TABLE ev (id INTEGER, day DATE);").unwrap();
    db.execute(
        "INSERT INTO ev (id,day) VALUES (1,'2024-02-29'), (2,'2024-03-01'), (3,NULL);",
    )
    .unwrap();

    let (_, rows) = select_rows(&mut db, "SELECT day FROM ev WHERE id = 1;");
    assert_eq!(rows, vec![vec!["2024-02-29".to_string()]]);

    let (_, rows) = select_rows(&mut db, "SELECT id FROM ev WHERE day > '2024-02-29';");
    assert_eq!(rows, vec![vec!["2".to_string()]]);

    let (_, rows) = select_rows(&mut db, "SELECT id FROM ev WHERE day IS NULL;");
    assert_eq!(rows, vec![vec!["3".to_string()]]);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unknown_table_and_column_errors() {
    let (mut db, root) = open_db("missing");
    let err = db.execute("SELECT * FROM ghosts;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TableNotFound);

    setup_users(&mut db);
    let err = db.execute("SELECT shoe_size FROM users;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ColumnNotFound);

    let err = db.execute("SELECT other.id FROM users;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ColumnNotFound);

    let err = db.execute("INSERT INTO users (id,name) VALUES (1,'x');").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstraintViolation);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn drop_table_frees_pages_and_new_table_gets_fresh_id() {
    let (mut db, root) = open_db("drop-cleanup");
    setup_users(&mut db);

    let tables = db.list_tables().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table_id, 1);

    let free_before = db.pager().free_count();
    let out = db.execute("DROP TABLE users;").unwrap();
    assert!(matches!(out, ExecOutput::TableDropped(_)));

    assert!(db.list_tables().unwrap().is_empty());
    assert!(db.pager().free_count() > free_before, "root page must be freed");

    // новая таблица получает свежий table_id
    db.execute("CREATE TABLE users (id INTEGER);").unwrap();
    let tables = db.list_tables().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table_id, 2);

    let (_, rows) = select_rows(&mut db, "SELECT * FROM users;");
    assert!(rows.is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn drop_if_exists_is_a_noop_for_missing_table() {
    let (mut db, root) = open_db("drop-noop");
    let out = db.execute("DROP TABLE IF EXISTS nothing;").unwrap();
    assert!(matches!(out, ExecOutput::NoOp(_)));

    let err = db.execute("DROP TABLE nothing;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TableNotFound);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn sidecar_file_follows_table_lifecycle() {
    let (mut db, root) = open_db("sidecar");
    db.execute("CREATE TABLE users (id INTEGER);").unwrap();

    let sidecar = root.join("table_000001.kz");
    assert!(sidecar.exists(), "CREATE must touch the sidecar file");

    db.execute("DROP TABLE users;").unwrap();
    assert!(!sidecar.exists(), "DROP must remove the sidecar file");

    let _ = std::fs::remove_dir_all(&root);
}
