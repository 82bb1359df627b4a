//! Formula evaluation.
//!
//! Tree-walking evaluation of a node's expression against the current
//! graph caches. Lambda parameters live in a local environment consulted
//! before the global caches; lambda evaluation performs no reactive
//! tracking. `pre` reads the node's wave-start snapshot, `fold` reads and
//! updates its persistent cell — the engine passes a scratch copy of the
//! node state and commits it only after a successful evaluation.

use crate::builtins;
use crate::csv;
use crate::error::EvalError;
use crate::graph::{Graph, NodeState};
use crate::value::{self, Value};
use ripple_lang::ast::{BinaryOp, Expr, ExprKind};
use std::path::Path;

/// Everything a formula can see while evaluating.
pub struct EvalContext<'a> {
    pub graph: &'a Graph,
    /// Scratch state of the node under evaluation.
    pub state: &'a mut NodeState,
}

/// Evaluate `expr` to a value.
pub fn evaluate(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    let mut locals = Vec::new();
    eval_expr(expr, ctx, &mut locals)
}

fn eval_expr(
    expr: &Expr,
    ctx: &mut EvalContext<'_>,
    locals: &mut Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::IntLiteral(n) => Ok(Value::Int(*n)),
        ExprKind::FloatLiteral(f) => Ok(Value::Float(*f)),
        ExprKind::BoolLiteral(b) => Ok(Value::Bool(*b)),
        ExprKind::StringLiteral(s) => Ok(Value::Str(s.clone())),

        ExprKind::Ident(name) => {
            if let Some((_, value)) = locals.iter().rev().find(|(n, _)| n == name) {
                return Ok(value.clone());
            }
            match ctx.graph.value(name) {
                Some(value) => Ok(value.clone()),
                None if ctx.graph.contains(name) => Ok(Value::Null),
                None => Err(EvalError::TypeMismatch(format!("unknown name `{name}`"))),
            }
        }

        ExprKind::Binary { op, left, right } => {
            // Short-circuit the logical operators.
            if matches!(op, BinaryOp::And | BinaryOp::Or) {
                let lhs = eval_expr(left, ctx, locals)?;
                let lhs = lhs.as_bool().ok_or_else(|| {
                    EvalError::TypeMismatch(format!(
                        "`{}` expects booleans, got {}",
                        op.symbol(),
                        lhs.type_name()
                    ))
                })?;
                match (op, lhs) {
                    (BinaryOp::And, false) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let rhs = eval_expr(right, ctx, locals)?;
                return match rhs {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(EvalError::TypeMismatch(format!(
                        "`{}` expects booleans, got {}",
                        op.symbol(),
                        other.type_name()
                    ))),
                };
            }
            let lhs = eval_expr(left, ctx, locals)?;
            let rhs = eval_expr(right, ctx, locals)?;
            value::binary(*op, &lhs, &rhs)
        }

        ExprKind::Unary { op, operand } => {
            let operand = eval_expr(operand, ctx, locals)?;
            value::unary(*op, &operand)
        }

        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let cond = eval_expr(condition, ctx, locals)?;
            match cond.as_bool() {
                Some(true) => eval_expr(then_branch, ctx, locals),
                Some(false) => eval_expr(else_branch, ctx, locals),
                None => Err(EvalError::TypeMismatch(format!(
                    "`if` condition must be a bool, got {}",
                    cond.type_name()
                ))),
            }
        }

        ExprKind::Call { name, args } => eval_call(name, args, ctx, locals),

        ExprKind::Lambda { .. } => Err(EvalError::TypeMismatch(
            "lambda has no value outside fold/filter/count_if".to_string(),
        )),

        ExprKind::Pre { name, initial } => match ctx.state.pre.get(name) {
            Some(Some(value)) => Ok(value.clone()),
            _ => eval_expr(initial, ctx, locals),
        },

        ExprKind::Fold {
            slot,
            input,
            initial: _,
            step,
        } => {
            let input_value = eval_expr(input, ctx, locals)?;
            let acc = match ctx.state.folds.get(slot) {
                Some(cell) => {
                    if let Some(last) = &cell.last_input {
                        if last.observably_equal(&input_value) {
                            return Ok(cell.acc.clone());
                        }
                    }
                    cell.acc.clone()
                }
                None => {
                    return Err(EvalError::TypeMismatch(
                        "fold accumulator is not allocated".to_string(),
                    ))
                }
            };

            let (params, body) = match &step.kind {
                ExprKind::Lambda { params, body } if params.len() == 2 => (params, body),
                _ => {
                    return Err(EvalError::TypeMismatch(
                        "fold step must be a two-parameter lambda".to_string(),
                    ))
                }
            };
            locals.push((params[0].clone(), acc));
            locals.push((params[1].clone(), input_value.clone()));
            let result = eval_expr(body, ctx, locals);
            locals.pop();
            locals.pop();
            let result = result?;

            let cell = ctx
                .state
                .folds
                .get_mut(slot)
                .expect("fold cell checked above");
            cell.acc = result.clone();
            cell.last_input = Some(input_value);
            Ok(result)
        }
    }
}

fn eval_call(
    name: &str,
    args: &[Expr],
    ctx: &mut EvalContext<'_>,
    locals: &mut Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    let arity = match name {
        "csv_header" | "len" | "sum" | "avg" | "min" | "max" => 1,
        _ => 2,
    };
    if args.len() < arity {
        return Err(EvalError::TypeMismatch(format!(
            "`{name}` expects {arity} argument{}",
            if arity == 1 { "" } else { "s" }
        )));
    }
    match name {
        "load_csv" => {
            let path = eval_string_arg("load_csv", &args[0], ctx, locals)?;
            let has_header = match eval_expr(&args[1], ctx, locals)? {
                Value::Bool(b) => b,
                other => {
                    return Err(EvalError::TypeMismatch(format!(
                        "`load_csv` header flag must be a bool, got {}",
                        other.type_name()
                    )))
                }
            };
            csv::load(Path::new(&path), has_header)
                .map(Value::Table)
                .map_err(|e| EvalError::Io(e.to_string()))
        }
        "csv_header" => {
            let path = eval_string_arg("csv_header", &args[0], ctx, locals)?;
            csv::header(Path::new(&path))
                .map(|names| Value::List(names.into_iter().map(Value::Str).collect()))
                .map_err(|e| EvalError::Io(e.to_string()))
        }
        "col" => {
            let table = eval_expr(&args[0], ctx, locals)?;
            let index = eval_expr(&args[1], ctx, locals)?;
            builtins::col(&table, &index)
        }
        "row" => {
            let table = eval_expr(&args[0], ctx, locals)?;
            let index = eval_expr(&args[1], ctx, locals)?;
            builtins::row(&table, &index)
        }
        "len" => {
            let value = eval_expr(&args[0], ctx, locals)?;
            builtins::len(&value)
        }
        "sum" => {
            let value = eval_expr(&args[0], ctx, locals)?;
            builtins::sum(&value)
        }
        "avg" => {
            let value = eval_expr(&args[0], ctx, locals)?;
            builtins::avg(&value)
        }
        "min" => {
            let value = eval_expr(&args[0], ctx, locals)?;
            builtins::extremum("min", &value, false)
        }
        "max" => {
            let value = eval_expr(&args[0], ctx, locals)?;
            builtins::extremum("max", &value, true)
        }
        "filter" => {
            let table = eval_expr(&args[0], ctx, locals)?;
            let (param, body) = lambda_parts("filter", &args[1])?;
            builtins::filter(&table, |row| {
                apply_predicate("filter", param, body, row, ctx, locals)
            })
        }
        "count_if" => {
            let table = eval_expr(&args[0], ctx, locals)?;
            let (param, body) = lambda_parts("count_if", &args[1])?;
            builtins::count_if(&table, |row| {
                apply_predicate("count_if", param, body, row, ctx, locals)
            })
        }
        other => Err(EvalError::TypeMismatch(format!(
            "unknown function `{other}`"
        ))),
    }
}

fn eval_string_arg(
    name: &str,
    arg: &Expr,
    ctx: &mut EvalContext<'_>,
    locals: &mut Vec<(String, Value)>,
) -> Result<String, EvalError> {
    match eval_expr(arg, ctx, locals)? {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::TypeMismatch(format!(
            "`{name}` expects a string path, got {}",
            other.type_name()
        ))),
    }
}

fn lambda_parts<'e>(name: &str, expr: &'e Expr) -> Result<(&'e str, &'e Expr), EvalError> {
    match &expr.kind {
        ExprKind::Lambda { params, body } if params.len() == 1 => Ok((&params[0], body)),
        _ => Err(EvalError::TypeMismatch(format!(
            "`{name}` expects a one-parameter lambda"
        ))),
    }
}

fn apply_predicate(
    name: &str,
    param: &str,
    body: &Expr,
    row: &[Value],
    ctx: &mut EvalContext<'_>,
    locals: &mut Vec<(String, Value)>,
) -> Result<bool, EvalError> {
    locals.push((param.to_string(), Value::List(row.to_vec())));
    let result = eval_expr(body, ctx, locals);
    locals.pop();
    match result? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch(format!(
            "`{name}` predicate must return a bool, got {}",
            other.type_name()
        ))),
    }
}
