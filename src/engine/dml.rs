//! engine/dml — исполнитель INSERT/SELECT/DELETE/UPDATE/TRUNCATE.
//!
//! DELETE и UPDATE двухфазны: сперва собираются совпавшие
//! (RowLocation, значения), затем мутации — строка, перенесённая
//! update'ом, не может совпасть повторно внутри того же стейтмента.
//! UPDATE считает правые части присваиваний по значениям строки до
//! обновления.

use std::collections::HashMap;

use log::debug;

use crate::catalog::{CatalogManager, ColumnCatalogEntry};
use crate::errors::{DbError, DbResult};
use crate::heap::TableHeap;
use crate::pager::Pager;
use crate::record::{self, Field};
use crate::sql::ast::{
    BinaryOperator, DeleteStatement, Expression, InsertStatement, LiteralValue, SelectItem,
    SelectStatement, TruncateStatement, UpdateAssignment, UpdateStatement,
};
use crate::types::DataType;
use crate::value::{parse_date, TriBool, Value};

use super::eval::ExpressionEvaluator;

#[derive(Debug, Clone, Default)]
pub struct SelectResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub struct DmlExecutor<'a> {
    catalog: &'a mut CatalogManager,
    pager: &'a mut Pager,
}

/// Дописать к ошибке индекс строки-виновницы.
fn with_row_context(mut err: DbError, row_index: usize) -> DbError {
    let row = format!("row {}", row_index);
    err.context = Some(match err.context.take() {
        Some(ctx) => format!("{}, {}", ctx, row),
        None => row,
    });
    err
}

impl<'a> DmlExecutor<'a> {
    pub fn new(catalog: &'a mut CatalogManager, pager: &'a mut Pager) -> Self {
        Self { catalog, pager }
    }

    // ---- INSERT ----

    pub fn insert(&mut self, stmt: &InsertStatement) -> DbResult<usize> {
        let table = self
            .catalog
            .get_table(self.pager, &stmt.table_name)?
            .ok_or_else(|| DbError::table_not_found(stmt.table_name.clone()))?;
        let columns = self.catalog.get_columns(self.pager, table.table_id)?;
        if columns.is_empty() {
            return Err(DbError::constraint_violation("table has no columns"));
        }

        let column_names: Vec<String> = if stmt.column_names.is_empty() {
            columns.iter().map(|c| c.column.name.clone()).collect()
        } else {
            stmt.column_names.clone()
        };
        if column_names.len() != columns.len() {
            return Err(DbError::constraint_violation("column count mismatch"));
        }

        let evaluator = ExpressionEvaluator::new(&columns, &table.name);
        let mut heap = TableHeap::new(self.pager, table.root_page_id)?;

        let mut inserted = 0usize;
        for (row_index, row) in stmt.rows.iter().enumerate() {
            if row.len() != column_names.len() {
                return Err(with_row_context(
                    DbError::constraint_violation("row value count mismatch"),
                    row_index,
                ));
            }
            let payload = encode_row(&evaluator, &columns, &column_names, row)
                .map_err(|e| with_row_context(e, row_index))?;
            heap.insert(&payload).map_err(|e| with_row_context(e, row_index))?;
            inserted += 1;
        }

        debug!("[INSERT] table={} rows={}", table.name, inserted);
        Ok(inserted)
    }

    // ---- SELECT ----

    pub fn select(&mut self, stmt: &SelectStatement) -> DbResult<SelectResult> {
        let table = self
            .catalog
            .get_table(self.pager, &stmt.table_name)?
            .ok_or_else(|| DbError::table_not_found(stmt.table_name.clone()))?;
        let columns = self.catalog.get_columns(self.pager, table.table_id)?;
        if columns.is_empty() {
            return Ok(SelectResult::default());
        }

        let (mut projection, mut names) = build_projection(stmt, &columns, &table.name)?;
        if projection.is_empty() {
            for (i, entry) in columns.iter().enumerate() {
                projection.push(i);
                names.push(entry.column.name.clone());
            }
        }

        let evaluator = ExpressionEvaluator::new(&columns, &table.name);
        let limit = stmt.limit.map(|v| v as usize).unwrap_or(usize::MAX);

        debug!(
            "[SELECT] table={} projection=[{}] predicate={} limit={}",
            table.name,
            names.join(", "),
            stmt.where_clause
                .as_ref()
                .map(describe_expression)
                .unwrap_or_else(|| "<none>".to_string()),
            stmt.limit
                .map(|v| v.to_string())
                .unwrap_or_else(|| "ALL".to_string()),
        );

        let mut result = SelectResult {
            column_names: names,
            rows: Vec::new(),
        };
        if limit == 0 {
            return Ok(result);
        }

        let mut heap = TableHeap::new(self.pager, table.root_page_id)?;
        for item in heap.iter() {
            let (_loc, payload) = item?;
            let values = decode_row_values(&columns, &payload)?;
            if let Some(predicate) = &stmt.where_clause {
                if evaluator.evaluate_predicate(predicate, &values)? != TriBool::True {
                    continue;
                }
            }
            let row = projection
                .iter()
                .map(|&idx| values[idx].to_display_string())
                .collect();
            result.rows.push(row);
            if result.rows.len() >= limit {
                break;
            }
        }
        Ok(result)
    }

    // ---- DELETE ----

    pub fn delete(&mut self, stmt: &DeleteStatement) -> DbResult<usize> {
        let table = self
            .catalog
            .get_table(self.pager, &stmt.table_name)?
            .ok_or_else(|| DbError::table_not_found(stmt.table_name.clone()))?;
        let columns = self.catalog.get_columns(self.pager, table.table_id)?;
        let evaluator = ExpressionEvaluator::new(&columns, &table.name);

        debug!(
            "[DELETE] table={} predicate={}",
            table.name,
            stmt.where_clause
                .as_ref()
                .map(describe_expression)
                .unwrap_or_else(|| "<none>".to_string()),
        );

        let mut heap = TableHeap::new(self.pager, table.root_page_id)?;
        let rows = heap.scan()?;

        let mut deleted = 0usize;
        match &stmt.where_clause {
            None => {
                for (loc, _payload) in rows {
                    if heap.erase(loc)? {
                        deleted += 1;
                    }
                }
            }
            Some(predicate) => {
                for (loc, payload) in rows {
                    let values = decode_row_values(&columns, &payload)?;
                    if evaluator.evaluate_predicate(predicate, &values)? == TriBool::True
                        && heap.erase(loc)?
                    {
                        deleted += 1;
                    }
                }
            }
        }
        Ok(deleted)
    }

    // ---- UPDATE ----

    pub fn update(&mut self, stmt: &UpdateStatement) -> DbResult<usize> {
        if stmt.assignments.is_empty() {
            return Err(DbError::constraint_violation(
                "UPDATE requires at least one assignment",
            ));
        }

        let table = self
            .catalog
            .get_table(self.pager, &stmt.table_name)?
            .ok_or_else(|| DbError::table_not_found(stmt.table_name.clone()))?;
        let columns = self.catalog.get_columns(self.pager, table.table_id)?;

        let mut column_index: HashMap<&str, usize> = HashMap::with_capacity(columns.len());
        for (i, entry) in columns.iter().enumerate() {
            column_index.insert(entry.column.name.as_str(), i);
        }

        let evaluator = ExpressionEvaluator::new(&columns, &table.name);

        debug!(
            "[UPDATE] table={} assignments={} predicate={}",
            table.name,
            describe_assignments(&stmt.assignments),
            stmt.where_clause
                .as_ref()
                .map(describe_expression)
                .unwrap_or_else(|| "<none>".to_string()),
        );

        let mut heap = TableHeap::new(self.pager, table.root_page_id)?;

        // фаза 1: собрать цели по предикату
        let mut targets = Vec::new();
        for (loc, payload) in heap.scan()? {
            let values = decode_row_values(&columns, &payload)?;
            if let Some(predicate) = &stmt.where_clause {
                if evaluator.evaluate_predicate(predicate, &values)? != TriBool::True {
                    continue;
                }
            }
            targets.push((loc, values));
        }

        // фаза 2: вычислить и записать
        let mut updated = 0usize;
        for (target_index, (loc, current_values)) in targets.into_iter().enumerate() {
            let mut new_values = current_values.clone();
            for assignment in &stmt.assignments {
                let idx = *column_index.get(assignment.column_name.as_str()).ok_or_else(|| {
                    DbError::column_not_found(assignment.column_name.clone(), stmt.table_name.clone())
                })?;
                let evaluated = evaluator
                    .evaluate_scalar(&assignment.value, &current_values)
                    .map_err(|e| with_row_context(e, target_index))?;
                let coerced = coerce_value_for_column(&columns[idx], &evaluated)
                    .map_err(|e| with_row_context(e, target_index))?;
                new_values[idx] = coerced;
            }

            let payload = encode_values(&columns, &new_values)
                .map_err(|e| with_row_context(e, target_index))?;
            heap.update(loc, &payload)
                .map_err(|e| with_row_context(e, target_index))?;
            updated += 1;
        }

        Ok(updated)
    }

    // ---- TRUNCATE ----

    pub fn truncate(&mut self, stmt: &TruncateStatement) -> DbResult<()> {
        let table = self
            .catalog
            .get_table(self.pager, &stmt.table_name)?
            .ok_or_else(|| DbError::table_not_found(stmt.table_name.clone()))?;
        let mut heap = TableHeap::new(self.pager, table.root_page_id)?;
        heap.truncate()
    }
}

// ---- строки <-> значения ----

/// Раскодировать payload в значения по типам колонок каталога.
pub fn decode_row_values(columns: &[ColumnCatalogEntry], payload: &[u8]) -> DbResult<Vec<Value>> {
    let fields = record::decode(payload)?;
    if fields.len() != columns.len() {
        return Err(DbError::invalid_argument(
            "decoded field count mismatch",
            format!("{} != {}", fields.len(), columns.len()),
        ));
    }

    let mut values = Vec::with_capacity(columns.len());
    for (entry, field) in columns.iter().zip(fields.iter()) {
        let col = &entry.column;
        if field.is_null {
            values.push(Value::null(col.data_type));
            continue;
        }

        let value = match col.data_type {
            DataType::Boolean => {
                // отсутствующий payload ненулевого поля считаем false
                Value::boolean(field.payload.first().copied().unwrap_or(0) != 0)
            }
            DataType::Integer => {
                let bytes: [u8; 4] = field.payload.as_slice().try_into().map_err(|_| {
                    DbError::invalid_argument("INTEGER payload must be 4 bytes", col.name.clone())
                })?;
                Value::int32(i32::from_le_bytes(bytes))
            }
            DataType::BigInt | DataType::Timestamp => {
                let bytes: [u8; 8] = field.payload.as_slice().try_into().map_err(|_| {
                    DbError::invalid_argument("BIGINT payload must be 8 bytes", col.name.clone())
                })?;
                Value::int64(i64::from_le_bytes(bytes))
            }
            DataType::Date => {
                let bytes: [u8; 8] = field.payload.as_slice().try_into().map_err(|_| {
                    DbError::invalid_argument("DATE payload must be 8 bytes", col.name.clone())
                })?;
                Value::date(i64::from_le_bytes(bytes))
            }
            DataType::Float => {
                let bytes: [u8; 4] = field.payload.as_slice().try_into().map_err(|_| {
                    DbError::invalid_argument("FLOAT payload must be 4 bytes", col.name.clone())
                })?;
                Value::double(f32::from_le_bytes(bytes) as f64)
            }
            DataType::Double => {
                let bytes: [u8; 8] = field.payload.as_slice().try_into().map_err(|_| {
                    DbError::invalid_argument("DOUBLE payload must be 8 bytes", col.name.clone())
                })?;
                Value::double(f64::from_le_bytes(bytes))
            }
            DataType::Varchar | DataType::Text => {
                let text = String::from_utf8_lossy(&field.payload).into_owned();
                if col.data_type == DataType::Text {
                    Value::text(text)
                } else {
                    Value::string(text)
                }
            }
            _ => {
                return Err(DbError::unsupported_type(col.data_type.as_str()));
            }
        };
        values.push(value);
    }
    Ok(values)
}

/// Закодировать значения обратно в запись; NOT NULL и длина VARCHAR
/// проверяются здесь.
pub fn encode_values(columns: &[ColumnCatalogEntry], values: &[Value]) -> DbResult<Vec<u8>> {
    let mut fields = Vec::with_capacity(columns.len());
    for (entry, value) in columns.iter().zip(values.iter()) {
        let col = &entry.column;
        if value.is_null() {
            if col.constraint.not_null {
                return Err(DbError::constraint_violation(format!(
                    "column '{}' is NOT NULL",
                    col.name
                )));
            }
            fields.push(Field::from_null(col.data_type));
            continue;
        }

        let field = match col.data_type {
            DataType::Boolean => Field::from_bool(value.as_bool()?),
            DataType::Integer => Field::from_int32(value.as_int32()?),
            DataType::BigInt => Field::from_int64(value.as_int64()?),
            DataType::Float | DataType::Double => Field::from_double(value.as_double()?),
            DataType::Date => Field::from_date(value.as_int64()?),
            DataType::Timestamp => Field::from_timestamp(value.as_int64()?),
            DataType::Varchar | DataType::Text => {
                let text = value.as_str()?;
                if col.data_type == DataType::Varchar
                    && col.length > 0
                    && text.len() > col.length as usize
                {
                    return Err(DbError::constraint_violation(format!(
                        "value too long for column '{}'",
                        col.name
                    )));
                }
                if col.data_type == DataType::Text {
                    Field::from_text(text)
                } else {
                    Field::from_string(text)
                }
            }
            _ => return Err(DbError::unsupported_type(col.data_type.as_str())),
        };
        fields.push(field);
    }
    record::encode(&fields)
}

/// Привести вычисленное значение к типу колонки перед записью.
pub fn coerce_value_for_column(entry: &ColumnCatalogEntry, value: &Value) -> DbResult<Value> {
    let col = &entry.column;
    if value.is_null() {
        if col.constraint.not_null {
            return Err(DbError::constraint_violation(format!(
                "column '{}' is NOT NULL",
                col.name
            )));
        }
        return Ok(Value::null(col.data_type));
    }

    match col.data_type {
        DataType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Int32(v) => Ok(Value::boolean(*v != 0)),
            Value::Int64(v) => Ok(Value::boolean(*v != 0)),
            _ => Err(DbError::type_error("coercion", "BOOLEAN", value.to_display_string())),
        },
        DataType::Integer => match value {
            Value::Int32(_) => Ok(value.clone()),
            Value::Int64(v) => {
                let narrow = i32::try_from(*v)
                    .map_err(|_| DbError::type_error("coercion", "INTEGER", v.to_string()))?;
                Ok(Value::int32(narrow))
            }
            _ => Err(DbError::type_error("coercion", "INTEGER", value.to_display_string())),
        },
        DataType::BigInt => match value {
            Value::Int64(_) => Ok(value.clone()),
            Value::Int32(v) => Ok(Value::int64(*v as i64)),
            _ => Err(DbError::type_error("coercion", "BIGINT", value.to_display_string())),
        },
        DataType::Float | DataType::Double => match value {
            Value::Double(_) => Ok(value.clone()),
            Value::Int32(v) => Ok(Value::double(*v as f64)),
            Value::Int64(v) => Ok(Value::double(*v as f64)),
            _ => Err(DbError::type_error("coercion", "DOUBLE", value.to_display_string())),
        },
        DataType::Date => match value {
            Value::Date(_) => Ok(value.clone()),
            Value::Str { value: text, .. } => {
                let days = parse_date(text)
                    .ok_or_else(|| DbError::type_error("coercion", "DATE", text.clone()))?;
                Ok(Value::date(days))
            }
            // целое число — счётчик дней
            Value::Int32(v) => Ok(Value::date(*v as i64)),
            Value::Int64(v) => Ok(Value::date(*v)),
            _ => Err(DbError::type_error("coercion", "DATE", value.to_display_string())),
        },
        DataType::Timestamp => match value {
            Value::Int64(_) => Ok(value.clone()),
            Value::Int32(v) => Ok(Value::int64(*v as i64)),
            _ => Err(DbError::type_error("coercion", "TIMESTAMP", value.to_display_string())),
        },
        DataType::Varchar | DataType::Text => match value {
            Value::Str { value: text, .. } => Ok(Value::Str {
                value: text.clone(),
                data_type: col.data_type,
            }),
            _ => Err(DbError::type_error("coercion", "STRING", value.to_display_string())),
        },
        _ => Err(DbError::unsupported_type(col.data_type.as_str())),
    }
}

/// Строка INSERT: имя -> литерал, затем значения в порядке каталога.
fn encode_row(
    evaluator: &ExpressionEvaluator,
    columns: &[ColumnCatalogEntry],
    column_names: &[String],
    literals: &[LiteralValue],
) -> DbResult<Vec<u8>> {
    let mut lookup: HashMap<&str, &LiteralValue> = HashMap::with_capacity(column_names.len());
    for (name, literal) in column_names.iter().zip(literals.iter()) {
        lookup.insert(name.as_str(), literal);
    }

    let mut values = Vec::with_capacity(columns.len());
    for entry in columns {
        let col = &entry.column;
        let literal = lookup
            .get(col.name.as_str())
            .copied()
            .ok_or_else(|| DbError::column_not_found(col.name.clone(), String::new()))?;

        if matches!(literal, LiteralValue::Null) {
            if col.constraint.not_null {
                return Err(DbError::constraint_violation(format!(
                    "column '{}' is NOT NULL",
                    col.name
                )));
            }
            values.push(Value::null(col.data_type));
            continue;
        }

        let value = evaluator.literal_to_value(literal, Some(col.data_type))?;
        values.push(coerce_value_for_column(entry, &value)?);
    }

    encode_values(columns, &values)
}

/// Проекция SELECT: `*` разворачивается один раз, имена — в индексы.
fn build_projection(
    stmt: &SelectStatement,
    columns: &[ColumnCatalogEntry],
    table_name: &str,
) -> DbResult<(Vec<usize>, Vec<String>)> {
    let mut projection = Vec::new();
    let mut names = Vec::new();
    let mut expanded_star = false;

    for item in &stmt.columns {
        match item {
            SelectItem::Star => {
                if !expanded_star {
                    for (i, entry) in columns.iter().enumerate() {
                        projection.push(i);
                        names.push(entry.column.name.clone());
                    }
                    expanded_star = true;
                }
            }
            SelectItem::Column(column_ref) => {
                let idx = find_column_index(columns, table_name, column_ref)?;
                projection.push(idx);
                names.push(column_ref.column.clone());
            }
        }
    }

    Ok((projection, names))
}

fn find_column_index(
    columns: &[ColumnCatalogEntry],
    table_name: &str,
    column_ref: &crate::sql::ast::ColumnRef,
) -> DbResult<usize> {
    if let Some(table) = &column_ref.table {
        if table != table_name {
            return Err(DbError::column_not_found(column_ref.column.clone(), table.clone()));
        }
    }
    columns
        .iter()
        .position(|e| e.column.name == column_ref.column)
        .ok_or_else(|| DbError::column_not_found(column_ref.column.clone(), table_name.to_string()))
}

// ---- описания для debug-лога ----

fn describe_literal(literal: &LiteralValue) -> String {
    match literal {
        LiteralValue::Null => "NULL".to_string(),
        LiteralValue::Boolean(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        LiteralValue::Integer(text) | LiteralValue::Double(text) => text.clone(),
        LiteralValue::String(text) => format!("'{}'", text),
    }
}

fn describe_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Equal => "=",
        BinaryOperator::NotEqual => "!=",
        BinaryOperator::Less => "<",
        BinaryOperator::LessEqual => "<=",
        BinaryOperator::Greater => ">",
        BinaryOperator::GreaterEqual => ">=",
        BinaryOperator::And => "AND",
        BinaryOperator::Or => "OR",
    }
}

fn describe_expression(expr: &Expression) -> String {
    match expr {
        Expression::Literal(literal) => describe_literal(literal),
        Expression::Column(c) => match &c.table {
            Some(t) => format!("{}.{}", t, c.column),
            None => c.column.clone(),
        },
        Expression::Unary { operand, .. } => format!("NOT ({})", describe_expression(operand)),
        Expression::Binary { op, left, right } => format!(
            "({} {} {})",
            describe_expression(left),
            describe_operator(*op),
            describe_expression(right)
        ),
        Expression::NullTest { operand, is_not } => format!(
            "{}{}",
            describe_expression(operand),
            if *is_not { " IS NOT NULL" } else { " IS NULL" }
        ),
    }
}

fn describe_assignments(assignments: &[UpdateAssignment]) -> String {
    assignments
        .iter()
        .map(|a| format!("{}={}", a.column_name, describe_expression(&a.value)))
        .collect::<Vec<_>>()
        .join(", ")
}
