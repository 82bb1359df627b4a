//! Tabular and list built-ins.
//!
//! The higher-order operators (`filter`, `count_if`) take the predicate
//! as a closure; the evaluator supplies one that binds the row to the
//! lambda parameter. Everything here is pure over its inputs.

use crate::error::EvalError;
use crate::value::{Table, Value};

fn expect_table<'a>(name: &str, value: &'a Value) -> Result<&'a Table, EvalError> {
    match value {
        Value::Table(t) => Ok(t),
        other => Err(EvalError::TypeMismatch(format!(
            "`{name}` expects a table, got {}",
            other.type_name()
        ))),
    }
}

fn expect_index(name: &str, value: &Value) -> Result<usize, EvalError> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        Value::Int(n) => Err(EvalError::IndexOutOfRange(format!(
            "`{name}` index {n} is negative"
        ))),
        other => Err(EvalError::TypeMismatch(format!(
            "`{name}` expects an integer index, got {}",
            other.type_name()
        ))),
    }
}

fn expect_numeric_list(name: &str, value: &Value) -> Result<Vec<f64>, EvalError> {
    let items = match value {
        Value::List(items) => items,
        other => {
            return Err(EvalError::TypeMismatch(format!(
                "`{name}` expects a list, got {}",
                other.type_name()
            )))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(f) => Ok(*f),
            other => Err(EvalError::TypeMismatch(format!(
                "`{name}` expects a numeric list, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// `col(t, i)`: column `i` of the table as a list.
pub fn col(table: &Value, index: &Value) -> Result<Value, EvalError> {
    let table = expect_table("col", table)?;
    let idx = expect_index("col", index)?;
    let width = table.rows.first().map(|r| r.len()).unwrap_or(0);
    if !table.rows.is_empty() && idx >= width {
        return Err(EvalError::IndexOutOfRange(format!(
            "column {idx} of a {width}-column table"
        )));
    }
    Ok(Value::List(
        table
            .rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
            .collect(),
    ))
}

/// `row(t, i)`: row `i` of the table as a list.
pub fn row(table: &Value, index: &Value) -> Result<Value, EvalError> {
    let table = expect_table("row", table)?;
    let idx = expect_index("row", index)?;
    match table.rows.get(idx) {
        Some(row) => Ok(Value::List(row.clone())),
        None => Err(EvalError::IndexOutOfRange(format!(
            "row {idx} of a {}-row table",
            table.rows.len()
        ))),
    }
}

/// `len(x)`: rows of a table or elements of a list.
pub fn len(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Table(t) => Ok(Value::Int(t.rows.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(EvalError::TypeMismatch(format!(
            "`len` expects a table or list, got {}",
            other.type_name()
        ))),
    }
}

/// `sum(xs)`: 0 for an empty list; stays an int when every element is.
pub fn sum(value: &Value) -> Result<Value, EvalError> {
    let numbers = expect_numeric_list("sum", value)?;
    let all_ints = match value {
        Value::List(items) => items.iter().all(|v| matches!(v, Value::Int(_))),
        _ => false,
    };
    let total: f64 = numbers.iter().sum();
    if all_ints {
        Ok(Value::Int(total as i64))
    } else {
        Ok(Value::Float(total))
    }
}

/// `avg(xs)`: always a float; `0.0` for an empty list.
pub fn avg(value: &Value) -> Result<Value, EvalError> {
    let numbers = expect_numeric_list("avg", value)?;
    if numbers.is_empty() {
        return Ok(Value::Float(0.0));
    }
    Ok(Value::Float(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

/// `min(xs)` / `max(xs)`: the extremal element as-is; null for empty.
pub fn extremum(name: &str, value: &Value, want_max: bool) -> Result<Value, EvalError> {
    let items = match value {
        Value::List(items) => items,
        other => {
            return Err(EvalError::TypeMismatch(format!(
                "`{name}` expects a list, got {}",
                other.type_name()
            )))
        }
    };
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let numbers = expect_numeric_list(name, value)?;
    let mut best = 0;
    for (i, n) in numbers.iter().enumerate() {
        let current = numbers[best];
        if (want_max && *n > current) || (!want_max && *n < current) {
            best = i;
        }
    }
    Ok(items[best].clone())
}

/// `filter(t, f)`: rows satisfying the predicate, header preserved.
pub fn filter(
    table: &Value,
    mut pred: impl FnMut(&[Value]) -> Result<bool, EvalError>,
) -> Result<Value, EvalError> {
    let table = expect_table("filter", table)?;
    let mut rows = Vec::new();
    for row in &table.rows {
        if pred(row)? {
            rows.push(row.clone());
        }
    }
    Ok(Value::Table(Table {
        header: table.header.clone(),
        rows,
    }))
}

/// `count_if(t, f)`: number of rows satisfying the predicate.
pub fn count_if(
    table: &Value,
    mut pred: impl FnMut(&[Value]) -> Result<bool, EvalError>,
) -> Result<Value, EvalError> {
    let table = expect_table("count_if", table)?;
    let mut count = 0i64;
    for row in &table.rows {
        if pred(row)? {
            count += 1;
        }
    }
    Ok(Value::Int(count))
}
