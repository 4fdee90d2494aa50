//! sql/dml — разбор INSERT/SELECT/DELETE/UPDATE/TRUNCATE.
//!
//! Приоритет в выражениях: OR < AND < NOT < сравнение; скобки и
//! IS [NOT] NULL поверх primary. Сравнения не ассоциативны.

use crate::errors::DbResult;

use super::ast::{
    BinaryOperator, ColumnRef, DeleteStatement, Expression, InsertStatement, LiteralValue,
    SelectItem, SelectStatement, TruncateStatement, UnaryOperator, UpdateAssignment,
    UpdateStatement,
};
use super::lexer::{Cursor, TokenKind};

pub fn parse_insert(sql: &str) -> DbResult<InsertStatement> {
    finish(sql, parse_insert_inner)
}

pub fn parse_select(sql: &str) -> DbResult<SelectStatement> {
    finish(sql, parse_select_inner)
}

pub fn parse_delete(sql: &str) -> DbResult<DeleteStatement> {
    finish(sql, parse_delete_inner)
}

pub fn parse_update(sql: &str) -> DbResult<UpdateStatement> {
    finish(sql, parse_update_inner)
}

pub fn parse_truncate(sql: &str) -> DbResult<TruncateStatement> {
    finish(sql, parse_truncate_inner)
}

fn finish<T>(sql: &str, parse: fn(&mut Cursor<'_>) -> DbResult<T>) -> DbResult<T> {
    let mut cur = Cursor::new(sql);
    let stmt = parse(&mut cur)?;
    cur.consume_semicolon();
    cur.expect_end()?;
    Ok(stmt)
}

pub(super) fn parse_insert_inner(cur: &mut Cursor<'_>) -> DbResult<InsertStatement> {
    cur.expect_keyword("INSERT")?;
    cur.expect_keyword("INTO")?;
    let table_name = cur.expect_identifier("table name")?;

    let mut column_names = Vec::new();
    if cur.match_symbol("(") {
        if cur.match_symbol(")") {
            return Err(cur.syntax_error("column list"));
        }
        loop {
            column_names.push(cur.expect_identifier("column name")?);
            if !cur.match_symbol(",") {
                break;
            }
        }
        cur.expect_symbol(")")?;
    }

    cur.expect_keyword("VALUES")?;
    let mut rows = Vec::new();
    loop {
        rows.push(parse_row(cur)?);
        if !cur.match_symbol(",") {
            break;
        }
    }

    Ok(InsertStatement {
        table_name,
        column_names,
        rows,
    })
}

pub(super) fn parse_select_inner(cur: &mut Cursor<'_>) -> DbResult<SelectStatement> {
    cur.expect_keyword("SELECT")?;
    let columns = parse_select_list(cur)?;
    cur.expect_keyword("FROM")?;
    let table_name = cur.expect_identifier("table name")?;

    let where_clause = if cur.match_keyword("WHERE") {
        Some(parse_expression(cur)?)
    } else {
        None
    };

    let limit = if cur.match_keyword("LIMIT") {
        Some(parse_limit_value(cur)?)
    } else {
        None
    };

    Ok(SelectStatement {
        table_name,
        columns,
        where_clause,
        limit,
    })
}

pub(super) fn parse_delete_inner(cur: &mut Cursor<'_>) -> DbResult<DeleteStatement> {
    cur.expect_keyword("DELETE")?;
    cur.expect_keyword("FROM")?;
    let table_name = cur.expect_identifier("table name")?;
    let where_clause = if cur.match_keyword("WHERE") {
        Some(parse_expression(cur)?)
    } else {
        None
    };
    Ok(DeleteStatement {
        table_name,
        where_clause,
    })
}

pub(super) fn parse_update_inner(cur: &mut Cursor<'_>) -> DbResult<UpdateStatement> {
    cur.expect_keyword("UPDATE")?;
    let table_name = cur.expect_identifier("table name")?;
    cur.expect_keyword("SET")?;

    let mut assignments = Vec::new();
    loop {
        let column_name = cur.expect_identifier("column name")?;
        cur.expect_symbol("=")?;
        let value = parse_expression(cur)?;
        assignments.push(UpdateAssignment { column_name, value });
        if !cur.match_symbol(",") {
            break;
        }
    }

    let where_clause = if cur.match_keyword("WHERE") {
        Some(parse_expression(cur)?)
    } else {
        None
    };

    Ok(UpdateStatement {
        table_name,
        assignments,
        where_clause,
    })
}

pub(super) fn parse_truncate_inner(cur: &mut Cursor<'_>) -> DbResult<TruncateStatement> {
    cur.expect_keyword("TRUNCATE")?;
    let _ = cur.match_keyword("TABLE");
    let table_name = cur.expect_identifier("table name")?;
    Ok(TruncateStatement { table_name })
}

// ---- кирпичики ----

fn parse_row(cur: &mut Cursor<'_>) -> DbResult<Vec<LiteralValue>> {
    cur.expect_symbol("(")?;
    if cur.match_symbol(")") {
        return Err(cur.syntax_error("value"));
    }
    let mut values = Vec::new();
    loop {
        values.push(parse_literal(cur)?);
        if !cur.match_symbol(",") {
            break;
        }
    }
    cur.expect_symbol(")")?;
    Ok(values)
}

fn parse_select_list(cur: &mut Cursor<'_>) -> DbResult<Vec<SelectItem>> {
    let mut items = Vec::new();
    loop {
        if cur.match_symbol("*") {
            items.push(SelectItem::Star);
        } else {
            items.push(SelectItem::Column(parse_column_ref(cur)?));
        }
        if !cur.match_symbol(",") {
            break;
        }
    }
    Ok(items)
}

fn parse_column_ref(cur: &mut Cursor<'_>) -> DbResult<ColumnRef> {
    let first = cur.expect_identifier("column")?;
    if cur.match_symbol(".") {
        let column = cur.expect_identifier("column")?;
        Ok(ColumnRef::qualified(first, column))
    } else {
        Ok(ColumnRef::bare(first))
    }
}

pub(super) fn parse_expression(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    parse_or(cur)
}

fn parse_or(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    let mut expr = parse_and(cur)?;
    while cur.match_keyword("OR") {
        let rhs = parse_and(cur)?;
        expr = Expression::binary(BinaryOperator::Or, expr, rhs);
    }
    Ok(expr)
}

fn parse_and(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    let mut expr = parse_not(cur)?;
    while cur.match_keyword("AND") {
        let rhs = parse_not(cur)?;
        expr = Expression::binary(BinaryOperator::And, expr, rhs);
    }
    Ok(expr)
}

fn parse_not(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    if cur.match_keyword("NOT") {
        let operand = parse_not(cur)?;
        return Ok(Expression::unary(UnaryOperator::Not, operand));
    }
    parse_comparison(cur)
}

fn parse_comparison(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    let left = parse_primary(cur)?;
    let op = if cur.match_symbol("=") {
        BinaryOperator::Equal
    } else if cur.match_symbol("!=") || cur.match_symbol("<>") {
        BinaryOperator::NotEqual
    } else if cur.match_symbol("<=") {
        BinaryOperator::LessEqual
    } else if cur.match_symbol(">=") {
        BinaryOperator::GreaterEqual
    } else if cur.match_symbol("<") {
        BinaryOperator::Less
    } else if cur.match_symbol(">") {
        BinaryOperator::Greater
    } else {
        return Ok(left);
    };
    let right = parse_primary(cur)?;
    Ok(Expression::binary(op, left, right))
}

fn parse_primary(cur: &mut Cursor<'_>) -> DbResult<Expression> {
    if cur.match_symbol("(") {
        let expr = parse_expression(cur)?;
        cur.expect_symbol(")")?;
        return Ok(expr);
    }

    let tok = cur.peek().clone();
    if is_literal_token(cur) {
        let literal = parse_literal(cur)?;
        return parse_null_test(cur, Expression::literal(literal));
    }
    if tok.kind == TokenKind::Ident {
        let column = parse_column_ref(cur)?;
        return parse_null_test(cur, Expression::column(column));
    }
    Err(cur.syntax_error("expression"))
}

fn parse_null_test(cur: &mut Cursor<'_>, base: Expression) -> DbResult<Expression> {
    if cur.match_keyword("IS") {
        let is_not = cur.match_keyword("NOT");
        cur.expect_keyword("NULL")?;
        return Ok(Expression::null_test(base, is_not));
    }
    Ok(base)
}

fn is_literal_token(cur: &Cursor<'_>) -> bool {
    let tok = cur.peek();
    match tok.kind {
        TokenKind::Str | TokenKind::Number => true,
        TokenKind::Ident => matches!(tok.upper.as_str(), "NULL" | "TRUE" | "FALSE"),
        _ => false,
    }
}

fn parse_literal(cur: &mut Cursor<'_>) -> DbResult<LiteralValue> {
    let tok = cur.peek().clone();
    match tok.kind {
        TokenKind::Str => {
            cur.advance();
            Ok(LiteralValue::String(tok.text))
        }
        TokenKind::Number => {
            cur.advance();
            if tok.text.contains('.') {
                Ok(LiteralValue::Double(tok.text))
            } else {
                Ok(LiteralValue::Integer(tok.text))
            }
        }
        TokenKind::Ident => match tok.upper.as_str() {
            "NULL" => {
                cur.advance();
                Ok(LiteralValue::Null)
            }
            "TRUE" => {
                cur.advance();
                Ok(LiteralValue::Boolean(true))
            }
            "FALSE" => {
                cur.advance();
                Ok(LiteralValue::Boolean(false))
            }
            _ => Err(cur.syntax_error("literal")),
        },
        _ => Err(cur.syntax_error("literal")),
    }
}

fn parse_limit_value(cur: &mut Cursor<'_>) -> DbResult<i64> {
    let tok = cur.peek().clone();
    if tok.kind != TokenKind::Number || tok.text.contains('.') {
        return Err(cur.syntax_error("integer literal"));
    }
    cur.advance();
    match tok.text.parse::<i64>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(cur.syntax_error("non-negative integer")),
    }
}
