//! engine/eval — вычислитель выражений над строкой таблицы.
//!
//! Связывает ссылки на колонки (включая квалифицированные table.col),
//! жадно коэрцит литералы к типу колонки-оппонента и считает предикаты
//! в трёхзначной логике. Истинность определена только для BOOLEAN и
//! числовых значений; строка или дата в голове предиката — TYPE_ERROR.

use std::collections::HashMap;

use crate::catalog::ColumnCatalogEntry;
use crate::errors::{DbError, DbResult, ErrorKind};
use crate::sql::ast::{BinaryOperator, ColumnRef, Expression, LiteralValue, UnaryOperator};
use crate::types::DataType;
use crate::value::{
    compare, logical_and, logical_not, logical_or, parse_date, CompareResult, TriBool, Value,
};

#[derive(Debug, Clone, Copy)]
pub struct ColumnBinding {
    pub index: usize,
    pub data_type: DataType,
}

pub struct ExpressionEvaluator {
    table_name: String,
    column_map: HashMap<String, ColumnBinding>,
}

fn value_to_tristate(value: &Value) -> DbResult<TriBool> {
    if value.is_null() {
        return Ok(TriBool::Unknown);
    }
    let truthy = match value {
        Value::Bool(v) => *v,
        Value::Int32(v) => *v != 0,
        Value::Int64(v) => *v != 0,
        Value::Double(v) => *v != 0.0,
        _ => {
            return Err(DbError::type_error(
                "predicate",
                "BOOLEAN",
                value.data_type().as_str(),
            ))
        }
    };
    Ok(if truthy { TriBool::True } else { TriBool::False })
}

impl ExpressionEvaluator {
    pub fn new(columns: &[ColumnCatalogEntry], table_name: &str) -> Self {
        let mut column_map = HashMap::with_capacity(columns.len());
        for entry in columns {
            let binding = ColumnBinding {
                index: entry.ordinal_position as usize,
                data_type: entry.column.data_type,
            };
            column_map.insert(entry.column.name.clone(), binding);
        }
        Self {
            table_name: table_name.to_string(),
            column_map,
        }
    }

    /// Квалифицированная ссылка обязана совпасть с именем привязанной
    /// таблицы; чужой квалификатор не разрешается.
    pub fn lookup_column(&self, column_ref: &ColumnRef) -> Option<&ColumnBinding> {
        if let Some(table) = &column_ref.table {
            if table != &self.table_name {
                return None;
            }
        }
        self.column_map.get(&column_ref.column)
    }

    /// Литерал в Value; target применяется жадно.
    pub fn literal_to_value(
        &self,
        literal: &LiteralValue,
        target: Option<DataType>,
    ) -> DbResult<Value> {
        match literal {
            LiteralValue::Null => Ok(Value::null(target.unwrap_or(DataType::Null))),
            LiteralValue::Boolean(v) => Ok(Value::boolean(*v)),
            LiteralValue::Integer(text) => {
                let parsed: i64 = text
                    .parse()
                    .map_err(|_| DbError::type_error("literal", "INTEGER", text.clone()))?;
                if let Some(target) = target {
                    match target {
                        DataType::Boolean => return Ok(Value::boolean(parsed != 0)),
                        DataType::Integer => {
                            let narrow = i32::try_from(parsed).map_err(|_| {
                                DbError::type_error("literal", "INTEGER", text.clone())
                            })?;
                            return Ok(Value::int32(narrow));
                        }
                        DataType::BigInt | DataType::Date | DataType::Timestamp => {
                            return Ok(Value::int64(parsed));
                        }
                        _ => {}
                    }
                }
                if let Ok(narrow) = i32::try_from(parsed) {
                    Ok(Value::int32(narrow))
                } else {
                    Ok(Value::int64(parsed))
                }
            }
            LiteralValue::Double(text) => {
                let parsed: f64 = text
                    .parse()
                    .map_err(|_| DbError::type_error("literal", "DOUBLE", text.clone()))?;
                Ok(Value::double(parsed))
            }
            LiteralValue::String(text) => {
                if let Some(target) = target {
                    if target == DataType::Date {
                        let days = parse_date(text)
                            .ok_or_else(|| DbError::type_error("literal", "DATE", text.clone()))?;
                        return Ok(Value::date(days));
                    }
                    if target == DataType::Boolean {
                        if text.eq_ignore_ascii_case("true") {
                            return Ok(Value::boolean(true));
                        }
                        if text.eq_ignore_ascii_case("false") {
                            return Ok(Value::boolean(false));
                        }
                        return Err(DbError::type_error("literal", "BOOLEAN", text.clone()));
                    }
                }
                Ok(Value::string(text.clone()))
            }
        }
    }

    /// Мягкая коэрция значения к типу колонки перед сравнением.
    pub fn coerce_to_type(&self, value: &Value, target: DataType) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::null(target));
        }
        if value.data_type() == target {
            return Ok(value.clone());
        }
        match target {
            DataType::Boolean => match value {
                Value::Int32(v) => Ok(Value::boolean(*v != 0)),
                Value::Int64(v) => Ok(Value::boolean(*v != 0)),
                _ => Ok(value.clone()),
            },
            DataType::Integer => match value {
                Value::Int64(v) => {
                    let narrow = i32::try_from(*v).map_err(|_| {
                        DbError::type_error("coercion", "INTEGER", v.to_string())
                    })?;
                    Ok(Value::int32(narrow))
                }
                _ => Ok(value.clone()),
            },
            DataType::BigInt => match value {
                Value::Int32(v) => Ok(Value::int64(*v as i64)),
                _ => Ok(value.clone()),
            },
            DataType::Double => match value {
                Value::Int32(v) => Ok(Value::double(*v as f64)),
                Value::Int64(v) => Ok(Value::double(*v as f64)),
                Value::Date(v) => Ok(Value::double(*v as f64)),
                _ => Ok(value.clone()),
            },
            _ => Ok(value.clone()),
        }
    }

    fn evaluate_value(
        &self,
        expression: &Expression,
        row_values: &[Value],
        target_hint: Option<DataType>,
    ) -> DbResult<Value> {
        match expression {
            Expression::Literal(literal) => self.literal_to_value(literal, target_hint),
            Expression::Column(column_ref) => {
                let binding = self.lookup_column(column_ref).ok_or_else(|| {
                    DbError::column_not_found(column_ref.column.clone(), self.table_name.clone())
                })?;
                if binding.index >= row_values.len() {
                    return Err(DbError::new(
                        ErrorKind::SchemaMismatch,
                        "row does not contain column",
                    )
                    .with_context(column_ref.column.clone()));
                }
                Ok(row_values[binding.index].clone())
            }
            Expression::Unary { .. } | Expression::Binary { .. } | Expression::NullTest { .. } => {
                Err(DbError::type_error("expression", "scalar", "predicate"))
            }
        }
    }

    /// Скалярное значение: литералы и ссылки на колонки. Реляционные и
    /// логические узлы скалярами не являются.
    pub fn evaluate_scalar(&self, expression: &Expression, row_values: &[Value]) -> DbResult<Value> {
        self.evaluate_value(expression, row_values, None)
    }

    /// Предикат с трёхзначным результатом.
    pub fn evaluate_predicate(
        &self,
        expression: &Expression,
        row_values: &[Value],
    ) -> DbResult<TriBool> {
        match expression {
            Expression::Literal(literal) => {
                let value = self.literal_to_value(literal, None)?;
                value_to_tristate(&value)
            }
            Expression::Column(_) => {
                let value = self.evaluate_value(expression, row_values, None)?;
                value_to_tristate(&value)
            }
            Expression::Unary {
                op: UnaryOperator::Not,
                operand,
            } => {
                let inner = self.evaluate_predicate(operand, row_values)?;
                Ok(logical_not(inner))
            }
            Expression::Binary { op, left, right } => match op {
                BinaryOperator::And => {
                    let lhs = self.evaluate_predicate(left, row_values)?;
                    let rhs = self.evaluate_predicate(right, row_values)?;
                    Ok(logical_and(lhs, rhs))
                }
                BinaryOperator::Or => {
                    let lhs = self.evaluate_predicate(left, row_values)?;
                    let rhs = self.evaluate_predicate(right, row_values)?;
                    Ok(logical_or(lhs, rhs))
                }
                _ => self.evaluate_comparison(*op, left, right, row_values),
            },
            Expression::NullTest { operand, is_not } => {
                let value = self.evaluate_value(operand, row_values, None)?;
                let is_null = value.is_null();
                let result = if *is_not { !is_null } else { is_null };
                Ok(if result { TriBool::True } else { TriBool::False })
            }
        }
    }

    fn evaluate_comparison(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        row_values: &[Value],
    ) -> DbResult<TriBool> {
        let left_binding = match left {
            Expression::Column(c) => self.lookup_column(c).copied(),
            _ => None,
        };
        let right_binding = match right {
            Expression::Column(c) => self.lookup_column(c).copied(),
            _ => None,
        };

        // литерал подтягивается к типу колонки с другой стороны
        let left_hint = match (left, right_binding) {
            (Expression::Literal(_), Some(b)) => Some(b.data_type),
            _ => None,
        };
        let right_hint = match (right, left_binding) {
            (Expression::Literal(_), Some(b)) => Some(b.data_type),
            _ => None,
        };

        let mut left_value = self.evaluate_value(left, row_values, left_hint)?;
        let mut right_value = self.evaluate_value(right, row_values, right_hint)?;

        if let Some(binding) = left_binding {
            left_value = self.coerce_to_type(&left_value, binding.data_type)?;
        }
        if let Some(binding) = right_binding {
            right_value = self.coerce_to_type(&right_value, binding.data_type)?;
        }

        let cmp = compare(&left_value, &right_value)?;
        if cmp == CompareResult::Unknown {
            return Ok(TriBool::Unknown);
        }

        let result = match op {
            BinaryOperator::Equal => cmp == CompareResult::Equal,
            BinaryOperator::NotEqual => cmp != CompareResult::Equal,
            BinaryOperator::Less => cmp == CompareResult::Less,
            BinaryOperator::LessEqual => {
                cmp == CompareResult::Less || cmp == CompareResult::Equal
            }
            BinaryOperator::Greater => cmp == CompareResult::Greater,
            BinaryOperator::GreaterEqual => {
                cmp == CompareResult::Greater || cmp == CompareResult::Equal
            }
            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
        };
        Ok(if result { TriBool::True } else { TriBool::False })
    }
}
