//! sql/ddl — разбор CREATE TABLE / DROP TABLE.
//!
//! Типы: INTEGER|INT, BIGINT, FLOAT|DOUBLE (оба — 8-байтный DOUBLE),
//! BOOLEAN|BOOL, VARCHAR(n), DATE. Ограничения: PRIMARY KEY (влечёт
//! NOT NULL и UNIQUE), NOT NULL, UNIQUE, DEFAULT literal.

use crate::errors::DbResult;
use crate::types::DataType;

use super::ast::{ColumnConstraintAst, ColumnDefAst, CreateTableStatement, DropTableStatement};
use super::lexer::{Cursor, TokenKind};

pub fn parse_create_table(sql: &str) -> DbResult<CreateTableStatement> {
    let mut cur = Cursor::new(sql);
    let stmt = parse_create_inner(&mut cur)?;
    cur.consume_semicolon();
    cur.expect_end()?;
    Ok(stmt)
}

pub fn parse_drop_table(sql: &str) -> DbResult<DropTableStatement> {
    let mut cur = Cursor::new(sql);
    let stmt = parse_drop_inner(&mut cur)?;
    cur.consume_semicolon();
    cur.expect_end()?;
    Ok(stmt)
}

pub(super) fn parse_create_inner(cur: &mut Cursor<'_>) -> DbResult<CreateTableStatement> {
    cur.expect_keyword("CREATE")?;
    cur.expect_keyword("TABLE")?;
    let table_name = cur.expect_identifier("table name")?;
    cur.expect_symbol("(")?;

    let mut columns = Vec::new();
    loop {
        columns.push(parse_column_def(cur)?);
        if cur.match_symbol(")") {
            break;
        }
        cur.expect_symbol(",")?;
    }

    Ok(CreateTableStatement {
        table_name,
        columns,
    })
}

pub(super) fn parse_drop_inner(cur: &mut Cursor<'_>) -> DbResult<DropTableStatement> {
    cur.expect_keyword("DROP")?;
    cur.expect_keyword("TABLE")?;

    let mut if_exists = false;
    if cur.match_keyword("IF") {
        cur.expect_keyword("EXISTS")?;
        if_exists = true;
    }

    let table_name = cur.expect_identifier("table name")?;
    let cascade = cur.match_keyword("CASCADE");

    Ok(DropTableStatement {
        table_name,
        if_exists,
        cascade,
    })
}

fn parse_column_def(cur: &mut Cursor<'_>) -> DbResult<ColumnDefAst> {
    let name = cur.expect_identifier("column name")?;
    let type_token = cur.expect_identifier("column type")?;
    let type_upper = type_token.to_ascii_uppercase();

    let mut length = 0u32;
    let data_type = match type_upper.as_str() {
        "INTEGER" | "INT" => DataType::Integer,
        "BIGINT" => DataType::BigInt,
        "FLOAT" | "DOUBLE" => DataType::Double,
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "DATE" => DataType::Date,
        "VARCHAR" => {
            cur.expect_symbol("(")?;
            let tok = cur.peek().clone();
            if tok.kind != TokenKind::Number || tok.text.contains('.') {
                return Err(cur.syntax_error("length"));
            }
            length = tok
                .text
                .parse::<u32>()
                .map_err(|_| cur.syntax_error("length"))?;
            cur.advance();
            cur.expect_symbol(")")?;
            DataType::Varchar
        }
        _ => return Err(crate::errors::DbError::unsupported_type(type_token)),
    };

    let constraint = parse_column_constraints(cur)?;

    Ok(ColumnDefAst {
        name,
        data_type,
        length,
        constraint,
    })
}

fn parse_column_constraints(cur: &mut Cursor<'_>) -> DbResult<ColumnConstraintAst> {
    let mut constraint = ColumnConstraintAst::default();
    loop {
        if cur.match_keyword("NOT") {
            cur.expect_keyword("NULL")?;
            constraint.not_null = true;
            continue;
        }
        if cur.match_keyword("PRIMARY") {
            cur.expect_keyword("KEY")?;
            constraint.primary_key = true;
            constraint.not_null = true;
            constraint.unique = true;
            continue;
        }
        if cur.match_keyword("UNIQUE") {
            constraint.unique = true;
            continue;
        }
        if cur.match_keyword("DEFAULT") {
            let tok = cur.peek().clone();
            match tok.kind {
                TokenKind::Str | TokenKind::Number | TokenKind::Ident => {
                    constraint.default_literal = Some(tok.text);
                    cur.advance();
                    continue;
                }
                _ => return Err(cur.syntax_error("default literal")),
            }
        }
        break;
    }
    Ok(constraint)
}
