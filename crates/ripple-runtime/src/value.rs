//! Dynamically tagged runtime values.
//!
//! Arithmetic dispatches on tag pairs with implicit int→float promotion;
//! `+` concatenates strings; `&&`/`||` are short-circuited by the
//! evaluator and only validated here. Division always yields a float and
//! a zero divisor is an error, integer or not.
//!
//! Change detection (`observably_equal`) is distinct from the language's
//! `==`: floats compare bitwise and NaN is never equal to anything, so a
//! NaN-producing node keeps propagating rather than wedging its
//! downstream in a stale state.

use crate::error::EvalError;
use ripple_lang::ast::{BinaryOp, UnaryOp};
use std::fmt;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    List(Vec<Value>),
    Table(Table),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Rows of values with an optional header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Table(_) => "table",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view, promoting ints.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Equality for change detection. Structural over lists and tables;
    /// floats compare bitwise; NaN never equals anything.
    pub fn observably_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => {
                !a.is_nan() && !b.is_nan() && a.to_bits() == b.to_bits()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.observably_equal(y))
            }
            (Value::Table(a), Value::Table(b)) => {
                a.header == b.header
                    && a.rows.len() == b.rows.len()
                    && a.rows.iter().zip(&b.rows).all(|(x, y)| {
                        x.len() == y.len() && x.iter().zip(y).all(|(u, v)| u.observably_equal(v))
                    })
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Table(t) => {
                let cols = t.rows.first().map(|r| r.len()).unwrap_or(0);
                write!(f, "table({} rows x {} cols)", t.rows.len(), cols)
            }
        }
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch(format!(
        "`{op}` is not defined for {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary operator to two evaluated operands.
///
/// `&&`/`||` are handled by the evaluator for short-circuiting; reaching
/// them here still validates the right operand's tag.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    use Value::*;

    match op {
        Add => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_add(*b))),
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            _ => numeric_op(op, left, right, |a, b| a + b),
        },
        Sub => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_sub(*b))),
            _ => numeric_op(op, left, right, |a, b| a - b),
        },
        Mul => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_mul(*b))),
            _ => numeric_op(op, left, right, |a, b| a * b),
        },
        Div => {
            let (a, b) = both_numeric(op, left, right)?;
            if b == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Float(a / b))
            }
        }
        Mod => match (left, right) {
            (Int(_), Int(0)) => Err(EvalError::DivisionByZero),
            (Int(a), Int(b)) => Ok(Int(a.wrapping_rem(*b))),
            _ => {
                let (a, b) = both_numeric(op, left, right)?;
                if b == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Float(a % b))
                }
            }
        },
        Eq => Ok(Bool(left == right)),
        Ne => Ok(Bool(left != right)),
        Lt | Le | Gt | Ge => compare(op, left, right),
        And | Or => match (left, right) {
            (Bool(a), Bool(b)) => Ok(Bool(if op == And { *a && *b } else { *a || *b })),
            _ => Err(type_error(op.symbol(), left, right)),
        },
    }
}

fn numeric_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let (a, b) = both_numeric(op, left, right)?;
    Ok(Value::Float(f(a, b)))
}

fn both_numeric(op: BinaryOp, left: &Value, right: &Value) -> Result<(f64, f64), EvalError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(type_error(op.symbol(), left, right)),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;
    let ordering = if left.is_numeric() && right.is_numeric() {
        let (a, b) = both_numeric(op, left, right)?;
        a.partial_cmp(&b)
    } else if let (Value::Str(a), Value::Str(b)) = (left, right) {
        Some(a.cmp(b))
    } else {
        return Err(type_error(op.symbol(), left, right));
    };

    // NaN comparisons are false across the board.
    let result = match ordering {
        None => false,
        Some(ord) => match op {
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::Ge => ord != Ordering::Less,
            _ => unreachable!("compare called with non-comparison operator"),
        },
    };
    Ok(Value::Bool(result))
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        _ => Err(EvalError::TypeMismatch(format!(
            "`{}` is not defined for {}",
            op.symbol(),
            operand.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(2), &Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Value::Int(4), &Value::Int(5)).unwrap(),
            Value::Int(20)
        );
        assert_eq!(
            binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(3)).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(2), &Value::Float(0.5)).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn division_always_floats() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(6), &Value::Int(4)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            binary(BinaryOp::Mod, &Value::Float(1.0), &Value::Float(0.0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            binary(
                BinaryOp::Add,
                &Value::Str("ab".into()),
                &Value::Str("cd".into())
            )
            .unwrap(),
            Value::Str("abcd".into())
        );
    }

    #[test]
    fn equality_is_tag_then_value() {
        assert_eq!(
            binary(BinaryOp::Eq, &Value::Int(1), &Value::Float(1.0)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            binary(BinaryOp::Eq, &Value::Int(1), &Value::Int(1)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn comparisons_on_numbers_and_strings() {
        assert_eq!(
            binary(BinaryOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(
                BinaryOp::Ge,
                &Value::Str("b".into()),
                &Value::Str("a".into())
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinaryOp::Lt, &Value::Bool(true), &Value::Bool(false)).is_err());
    }

    #[test]
    fn nan_changes_are_always_observable() {
        let nan = Value::Float(f64::NAN);
        assert!(!nan.observably_equal(&nan));
        assert!(Value::Float(1.0).observably_equal(&Value::Float(1.0)));
    }

    #[test]
    fn structural_change_detection() {
        let a = Value::List(vec![Value::Int(1), Value::Float(2.0)]);
        let b = Value::List(vec![Value::Int(1), Value::Float(2.0)]);
        let c = Value::List(vec![Value::Int(1), Value::Float(2.5)]);
        assert!(a.observably_equal(&b));
        assert!(!a.observably_equal(&c));
    }

    #[test]
    fn null_arithmetic_is_a_type_error() {
        assert!(binary(BinaryOp::Add, &Value::Null, &Value::Int(1)).is_err());
    }
}
