use kizuna::errors::ErrorKind;
use kizuna::sql::ast::{
    BinaryOperator, ColumnRef, Expression, LiteralValue, SelectItem, Statement, UnaryOperator,
};
use kizuna::sql::{
    parse_create_table, parse_delete, parse_drop_table, parse_insert, parse_select,
    parse_statement, parse_truncate, parse_update,
};
use kizuna::types::DataType;

// ---------- DDL ----------

#[test]
fn create_table_with_types_and_constraints() {
    let stmt = parse_create_table(
        "CREATE TABLE users (\
         id INTEGER PRIMARY KEY, \
         ref_id BIGINT, \
         name VARCHAR(32) NOT NULL, \
         score DOUBLE DEFAULT 0, \
         ratio FLOAT, \
         active BOOL UNIQUE, \
         joined DATE, \
         cnt INT DEFAULT 7);",
    )
    .unwrap();

    assert_eq!(stmt.table_name, "users");
    assert_eq!(stmt.columns.len(), 8);

    let id = &stmt.columns[0];
    assert_eq!(id.data_type, DataType::Integer);
    assert!(id.constraint.primary_key);
    assert!(id.constraint.not_null);
    assert!(id.constraint.unique);

    assert_eq!(stmt.columns[1].data_type, DataType::BigInt);

    let name = &stmt.columns[2];
    assert_eq!(name.data_type, DataType::Varchar);
    assert_eq!(name.length, 32);
    assert!(name.constraint.not_null);
    assert!(!name.constraint.primary_key);

    let score = &stmt.columns[3];
    assert_eq!(score.data_type, DataType::Double);
    assert_eq!(score.constraint.default_literal.as_deref(), Some("0"));

    // FLOAT и DOUBLE — один и тот же 8-байтный тип
    assert_eq!(stmt.columns[4].data_type, DataType::Double);

    let active = &stmt.columns[5];
    assert_eq!(active.data_type, DataType::Boolean);
    assert!(active.constraint.unique);

    assert_eq!(stmt.columns[6].data_type, DataType::Date);
    assert_eq!(stmt.columns[7].constraint.default_literal.as_deref(), Some("7"));
}

#[test]
fn create_table_rejects_unknown_type_and_bad_length() {
    let err = parse_create_table("CREATE TABLE t (x BLOBBY)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedType);

    let err = parse_create_table("CREATE TABLE t (x VARCHAR(abc))").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);

    let err = parse_create_table("CREATE TABLE t ()").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}

#[test]
fn drop_table_variants() {
    let stmt = parse_drop_table("DROP TABLE users;").unwrap();
    assert_eq!(stmt.table_name, "users");
    assert!(!stmt.if_exists);
    assert!(!stmt.cascade);

    let stmt = parse_drop_table("DROP TABLE IF EXISTS users CASCADE").unwrap();
    assert!(stmt.if_exists);
    assert!(stmt.cascade);

    let err = parse_drop_table("DROP TABLE IF users").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}

// ---------- INSERT ----------

#[test]
fn insert_multi_row_with_column_list() {
    let stmt = parse_insert(
        "INSERT INTO users (id, name, active) VALUES (1, 'alice', TRUE), (2, 'bob', FALSE);",
    )
    .unwrap();
    assert_eq!(stmt.table_name, "users");
    assert_eq!(stmt.column_names, vec!["id", "name", "active"]);
    assert_eq!(stmt.rows.len(), 2);
    assert_eq!(
        stmt.rows[0],
        vec![
            LiteralValue::Integer("1".to_string()),
            LiteralValue::String("alice".to_string()),
            LiteralValue::Boolean(true),
        ]
    );
    assert_eq!(stmt.rows[1][2], LiteralValue::Boolean(false));
}

#[test]
fn insert_without_column_list_and_quote_escape() {
    let stmt = parse_insert("INSERT INTO t VALUES (NULL, 'it''s', 2.5)").unwrap();
    assert!(stmt.column_names.is_empty());
    assert_eq!(
        stmt.rows[0],
        vec![
            LiteralValue::Null,
            LiteralValue::String("it's".to_string()),
            LiteralValue::Double("2.5".to_string()),
        ]
    );
}

#[test]
fn insert_rejects_empty_row() {
    let err = parse_insert("INSERT INTO t VALUES ()").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}

// ---------- SELECT ----------

#[test]
fn select_star_and_named_columns() {
    let stmt = parse_select("SELECT * FROM users").unwrap();
    assert_eq!(stmt.columns, vec![SelectItem::Star]);
    assert!(stmt.where_clause.is_none());
    assert!(stmt.limit.is_none());

    let stmt = parse_select("SELECT id, users.name FROM users LIMIT 10;").unwrap();
    assert_eq!(
        stmt.columns,
        vec![
            SelectItem::Column(ColumnRef::bare("id")),
            SelectItem::Column(ColumnRef::qualified("users", "name")),
        ]
    );
    assert_eq!(stmt.limit, Some(10));
}

#[test]
fn where_precedence_not_tighter_than_and_tighter_than_or() {
    let stmt = parse_select("SELECT id FROM t WHERE a OR b AND NOT c").unwrap();
    let expected = Expression::binary(
        BinaryOperator::Or,
        Expression::column(ColumnRef::bare("a")),
        Expression::binary(
            BinaryOperator::And,
            Expression::column(ColumnRef::bare("b")),
            Expression::unary(
                UnaryOperator::Not,
                Expression::column(ColumnRef::bare("c")),
            ),
        ),
    );
    assert_eq!(stmt.where_clause.unwrap(), expected);
}

#[test]
fn where_comparisons_null_tests_and_parens() {
    let stmt = parse_select("SELECT id FROM t WHERE (a <> 1) AND b IS NOT NULL").unwrap();
    let expected = Expression::binary(
        BinaryOperator::And,
        Expression::binary(
            BinaryOperator::NotEqual,
            Expression::column(ColumnRef::bare("a")),
            Expression::literal(LiteralValue::Integer("1".to_string())),
        ),
        Expression::null_test(Expression::column(ColumnRef::bare("b")), true),
    );
    assert_eq!(stmt.where_clause.unwrap(), expected);

    // != и <> эквивалентны
    let alt = parse_select("SELECT id FROM t WHERE (a != 1) AND b IS NOT NULL").unwrap();
    assert_eq!(alt.where_clause, stmt_where("SELECT id FROM t WHERE (a <> 1) AND b IS NOT NULL"));

    let stmt = parse_select("SELECT id FROM t WHERE nickname IS NULL").unwrap();
    assert_eq!(
        stmt.where_clause.unwrap(),
        Expression::null_test(Expression::column(ColumnRef::bare("nickname")), false)
    );
}

fn stmt_where(sql: &str) -> Option<Expression> {
    parse_select(sql).unwrap().where_clause
}

#[test]
fn select_requires_from_and_sane_limit() {
    let err = parse_select("SELECT id users").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);

    let err = parse_select("SELECT id FROM t LIMIT 1.5").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);

    let err = parse_select("SELECT id FROM t LIMIT x").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}

// ---------- UPDATE / DELETE / TRUNCATE ----------

#[test]
fn update_with_assignments_and_where() {
    let stmt = parse_update("UPDATE users SET name = 'ally', active = TRUE WHERE id = 1;").unwrap();
    assert_eq!(stmt.table_name, "users");
    assert_eq!(stmt.assignments.len(), 2);
    assert_eq!(stmt.assignments[0].column_name, "name");
    assert_eq!(
        stmt.assignments[0].value,
        Expression::literal(LiteralValue::String("ally".to_string()))
    );
    assert!(stmt.where_clause.is_some());
}

#[test]
fn delete_with_and_without_where() {
    let stmt = parse_delete("DELETE FROM users").unwrap();
    assert!(stmt.where_clause.is_none());

    let stmt = parse_delete("DELETE FROM users WHERE active = FALSE;").unwrap();
    assert!(stmt.where_clause.is_some());
}

#[test]
fn truncate_with_optional_table_keyword() {
    assert_eq!(parse_truncate("TRUNCATE users").unwrap().table_name, "users");
    assert_eq!(parse_truncate("TRUNCATE TABLE users;").unwrap().table_name, "users");
}

// ---------- dispatch ----------

#[test]
fn parse_statement_dispatches_by_keyword() {
    assert!(matches!(
        parse_statement("CREATE TABLE t (id INT)").unwrap(),
        Statement::CreateTable(_)
    ));
    assert!(matches!(
        parse_statement("DROP TABLE t").unwrap(),
        Statement::DropTable(_)
    ));
    assert!(matches!(
        parse_statement("INSERT INTO t VALUES (1)").unwrap(),
        Statement::Insert(_)
    ));
    assert!(matches!(
        parse_statement("SELECT * FROM t").unwrap(),
        Statement::Select(_)
    ));
    assert!(matches!(
        parse_statement("DELETE FROM t").unwrap(),
        Statement::Delete(_)
    ));
    assert!(matches!(
        parse_statement("UPDATE t SET x = 1").unwrap(),
        Statement::Update(_)
    ));
    assert!(matches!(
        parse_statement("TRUNCATE t").unwrap(),
        Statement::Truncate(_)
    ));

    let err = parse_statement("GRANT ALL").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);

    // хвост после стейтмента — ошибка
    let err = parse_statement("SELECT * FROM t garbage").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}
