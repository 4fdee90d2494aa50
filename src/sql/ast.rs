//! sql/ast — дерево разбора DDL/DML.
//!
//! Выражение — рекурсивная помеченная сумма с владеющими поддеревьями;
//! исполнитель обходит его pattern match'ем.

use crate::types::DataType;

// ---- литералы ----

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    /// Текст числа без точки; разбор в конкретный тип делает исполнитель.
    Integer(String),
    /// Текст числа с точкой.
    Double(String),
    String(String),
}

// ---- выражения ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(LiteralValue),
    Column(ColumnRef),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    NullTest {
        operand: Box<Expression>,
        is_not: bool,
    },
}

impl Expression {
    pub fn literal(value: LiteralValue) -> Self {
        Expression::Literal(value)
    }

    pub fn column(column: ColumnRef) -> Self {
        Expression::Column(column)
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn null_test(operand: Expression, is_not: bool) -> Self {
        Expression::NullTest {
            operand: Box::new(operand),
            is_not,
        }
    }
}

// ---- DDL ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnConstraintAst {
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default_literal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefAst {
    pub name: String,
    pub data_type: DataType,
    pub length: u32,
    pub constraint: ColumnConstraintAst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub columns: Vec<ColumnDefAst>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTableStatement {
    pub table_name: String,
    pub if_exists: bool,
    pub cascade: bool,
}

// ---- DML ----

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Star,
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Пустой список — порядок колонок каталога.
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<LiteralValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table_name: String,
    pub columns: Vec<SelectItem>,
    pub where_clause: Option<Expression>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAssignment {
    pub column_name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Vec<UpdateAssignment>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateStatement {
    pub table_name: String,
}

/// Любой разобранный стейтмент диалекта.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
    Delete(DeleteStatement),
    Update(UpdateStatement),
    Truncate(TruncateStatement),
}
