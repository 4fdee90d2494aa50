//! engine — исполнители DDL/DML и вычислитель выражений.

mod ddl;
mod dml;
mod eval;

pub use ddl::DdlExecutor;
pub use dml::{
    coerce_value_for_column, decode_row_values, encode_values, DmlExecutor, SelectResult,
};
pub use eval::{ColumnBinding, ExpressionEvaluator};
