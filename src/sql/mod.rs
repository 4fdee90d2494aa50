//! sql — лексер, AST и рекурсивный спуск по диалекту движка.

pub mod ast;
mod ddl;
mod dml;
mod lexer;

pub use ddl::{parse_create_table, parse_drop_table};
pub use dml::{parse_delete, parse_insert, parse_select, parse_truncate, parse_update};
pub use lexer::{tokenize, Token, TokenKind};

use crate::errors::{DbError, DbResult};

use ast::Statement;
use lexer::Cursor;

/// Разобрать один стейтмент, диспетчеризуя по первому ключевому слову.
pub fn parse_statement(sql: &str) -> DbResult<Statement> {
    let mut cur = Cursor::new(sql);
    let first = cur.peek().clone();
    if first.kind != TokenKind::Ident {
        return Err(DbError::syntax_error(sql, first.position, "statement"));
    }

    let stmt = match first.upper.as_str() {
        "CREATE" => Statement::CreateTable(ddl::parse_create_inner(&mut cur)?),
        "DROP" => Statement::DropTable(ddl::parse_drop_inner(&mut cur)?),
        "INSERT" => Statement::Insert(dml::parse_insert_inner(&mut cur)?),
        "SELECT" => Statement::Select(dml::parse_select_inner(&mut cur)?),
        "DELETE" => Statement::Delete(dml::parse_delete_inner(&mut cur)?),
        "UPDATE" => Statement::Update(dml::parse_update_inner(&mut cur)?),
        "TRUNCATE" => Statement::Truncate(dml::parse_truncate_inner(&mut cur)?),
        _ => return Err(DbError::syntax_error(sql, first.position, "statement")),
    };

    cur.consume_semicolon();
    cur.expect_end()?;
    Ok(stmt)
}
