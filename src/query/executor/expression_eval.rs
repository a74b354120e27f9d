// Expression Evaluation Utility
//
// Evaluates scalar expressions against an optional row. Variables and user
// function calls are resolved through the `EvalEnv` supplied by the caller.

use std::cmp::Ordering;

use crate::query::ast::{BinaryOp, Expr, UnaryOp};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};

/// Resolves `@name` references
pub trait VariableLookup {
    fn lookup_variable(&self, name: &str) -> Option<DataValue>;
}

/// Invokes stored user functions
pub trait FunctionInvoker {
    fn invoke(&self, name: &str, args: Vec<DataValue>) -> QueryResult<DataValue>;
}

struct NoVariables;

impl VariableLookup for NoVariables {
    fn lookup_variable(&self, _name: &str) -> Option<DataValue> {
        None
    }
}

struct NoFunctions;

impl FunctionInvoker for NoFunctions {
    fn invoke(&self, name: &str, _args: Vec<DataValue>) -> QueryResult<DataValue> {
        Err(QueryError::ObjectNotFound {
            kind: crate::catalog::ObjectKind::Function,
            name: name.to_string(),
        })
    }
}

/// Everything an expression may reach outside its row
#[derive(Clone, Copy)]
pub struct EvalEnv<'a> {
    pub variables: &'a dyn VariableLookup,
    pub functions: &'a dyn FunctionInvoker,
}

impl<'a> EvalEnv<'a> {
    pub fn new(variables: &'a dyn VariableLookup, functions: &'a dyn FunctionInvoker) -> Self {
        Self { variables, functions }
    }

    /// Environment with no variables and no user functions
    pub fn empty() -> EvalEnv<'static> {
        EvalEnv { variables: &NoVariables, functions: &NoFunctions }
    }
}

/// Fold an expression that depends on nothing at runtime into its value
pub fn fold_constant(expr: &Expr) -> Option<DataValue> {
    if !expr.is_constant() {
        return None;
    }
    evaluate_expression(expr, None, &EvalEnv::empty()).ok()
}

// Evaluate an expression in the context of an optional row.
pub fn evaluate_expression(expr: &Expr, row: Option<&Row>, env: &EvalEnv<'_>) -> QueryResult<DataValue> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column { table, name } => match row {
            Some(row) => row.resolve(table.as_deref(), name).cloned(),
            None => Err(QueryError::ColumnNotFound(match table {
                Some(t) => format!("{}.{} (no row in scope)", t, name),
                None => format!("{} (no row in scope)", name),
            })),
        },
        Expr::Variable(name) => env
            .variables
            .lookup_variable(name)
            .ok_or_else(|| QueryError::VariableNotFound(name.clone())),
        Expr::Binary { left, op: BinaryOp::And, right } => {
            let l = evaluate_expression(left, row, env)?;
            if l.as_bool() == Some(false) {
                return Ok(DataValue::Boolean(false));
            }
            let r = evaluate_expression(right, row, env)?;
            logical_and(l, r)
        }
        Expr::Binary { left, op: BinaryOp::Or, right } => {
            let l = evaluate_expression(left, row, env)?;
            if l.as_bool() == Some(true) {
                return Ok(DataValue::Boolean(true));
            }
            let r = evaluate_expression(right, row, env)?;
            logical_or(l, r)
        }
        Expr::Binary { left, op, right } => {
            let l = evaluate_expression(left, row, env)?;
            let r = evaluate_expression(right, row, env)?;
            apply_binary(*op, l, r)
        }
        Expr::Unary { op, expr } => {
            let val = evaluate_expression(expr, row, env)?;
            match (op, val) {
                (_, DataValue::Null) => Ok(DataValue::Null),
                (UnaryOp::Minus, DataValue::Integer(i)) => {
                    i.checked_neg().map(DataValue::Integer).ok_or(QueryError::NumericOverflow)
                }
                (UnaryOp::Minus, DataValue::Float(f)) => Ok(DataValue::Float(-f)),
                (UnaryOp::Not, DataValue::Boolean(b)) => Ok(DataValue::Boolean(!b)),
                (op, val) => Err(QueryError::TypeError(format!(
                    "Unary {:?} not supported for {}",
                    op,
                    val.to_sql_literal()
                ))),
            }
        }
        Expr::IsNull { expr, negated } => {
            let is_null = evaluate_expression(expr, row, env)?.is_null();
            Ok(DataValue::Boolean(is_null != *negated))
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate_expression(arg, row, env))
                .collect::<QueryResult<Vec<_>>>()?;
            match call_builtin(name, &values) {
                Some(result) => result,
                None => env.functions.invoke(name, values),
            }
        }
    }
}

fn logical_and(l: DataValue, r: DataValue) -> QueryResult<DataValue> {
    match (l, r) {
        (DataValue::Boolean(a), DataValue::Boolean(b)) => Ok(DataValue::Boolean(a && b)),
        (DataValue::Boolean(false), DataValue::Null) | (DataValue::Null, DataValue::Boolean(false)) => {
            Ok(DataValue::Boolean(false))
        }
        (DataValue::Boolean(_) | DataValue::Null, DataValue::Boolean(_) | DataValue::Null) => Ok(DataValue::Null),
        _ => Err(QueryError::TypeError("AND requires boolean operands".to_string())),
    }
}

fn logical_or(l: DataValue, r: DataValue) -> QueryResult<DataValue> {
    match (l, r) {
        (DataValue::Boolean(a), DataValue::Boolean(b)) => Ok(DataValue::Boolean(a || b)),
        (DataValue::Boolean(true), DataValue::Null) | (DataValue::Null, DataValue::Boolean(true)) => {
            Ok(DataValue::Boolean(true))
        }
        (DataValue::Boolean(_) | DataValue::Null, DataValue::Boolean(_) | DataValue::Null) => Ok(DataValue::Null),
        _ => Err(QueryError::TypeError("OR requires boolean operands".to_string())),
    }
}

fn compare_with(l: &DataValue, r: &DataValue, accept: fn(Ordering) -> bool) -> QueryResult<DataValue> {
    let ordering = l.compare(r)?;
    Ok(DataValue::Boolean(accept(ordering)))
}

fn apply_binary(op: BinaryOp, l: DataValue, r: DataValue) -> QueryResult<DataValue> {
    if l.is_null() || r.is_null() {
        return Ok(DataValue::Null);
    }

    match op {
        BinaryOp::Equals => compare_with(&l, &r, |o| o == Ordering::Equal),
        BinaryOp::NotEquals => compare_with(&l, &r, |o| o != Ordering::Equal),
        BinaryOp::LessThan => compare_with(&l, &r, |o| o == Ordering::Less),
        BinaryOp::LessEquals => compare_with(&l, &r, |o| o != Ordering::Greater),
        BinaryOp::GreaterThan => compare_with(&l, &r, |o| o == Ordering::Greater),
        BinaryOp::GreaterEquals => compare_with(&l, &r, |o| o != Ordering::Less),
        BinaryOp::Concat => Ok(DataValue::Text(format!("{}{}", l, r))),
        BinaryOp::Add => match (l, r) {
            (DataValue::Text(a), DataValue::Text(b)) => Ok(DataValue::Text(a + &b)),
            (l, r) => arithmetic(l, r, "+", i64::checked_add, |a, b| Some(a + b)),
        },
        BinaryOp::Subtract => arithmetic(l, r, "-", i64::checked_sub, |a, b| Some(a - b)),
        BinaryOp::Multiply => arithmetic(l, r, "*", i64::checked_mul, |a, b| Some(a * b)),
        BinaryOp::Divide => {
            if is_zero(&r) {
                return Err(QueryError::DivisionByZero);
            }
            arithmetic(l, r, "/", i64::checked_div, |a, b| Some(a / b))
        }
        BinaryOp::Modulo => match (l, r) {
            (DataValue::Integer(_), DataValue::Integer(0)) => Err(QueryError::DivisionByZero),
            (DataValue::Integer(a), DataValue::Integer(b)) => {
                a.checked_rem(b).map(DataValue::Integer).ok_or(QueryError::NumericOverflow)
            }
            _ => Err(QueryError::TypeError("Modulo operator only supports integers".to_string())),
        },
        BinaryOp::And | BinaryOp::Or => unreachable_logical(op),
    }
}

fn unreachable_logical(op: BinaryOp) -> QueryResult<DataValue> {
    Err(QueryError::InvalidOperation(format!("{:?} must be evaluated lazily", op)))
}

fn is_zero(value: &DataValue) -> bool {
    match value {
        DataValue::Integer(i) => *i == 0,
        DataValue::Float(f) => *f == 0.0,
        _ => false,
    }
}

fn arithmetic(
    l: DataValue,
    r: DataValue,
    symbol: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> Option<f64>,
) -> QueryResult<DataValue> {
    match (l, r) {
        (DataValue::Integer(a), DataValue::Integer(b)) => {
            int_op(a, b).map(DataValue::Integer).ok_or(QueryError::NumericOverflow)
        }
        (DataValue::Float(a), DataValue::Float(b)) => float_result(float_op(a, b)),
        (DataValue::Integer(a), DataValue::Float(b)) => float_result(float_op(a as f64, b)),
        (DataValue::Float(a), DataValue::Integer(b)) => float_result(float_op(a, b as f64)),
        (l, r) => Err(QueryError::TypeError(format!(
            "Unsupported operands for {}: {} and {}",
            symbol,
            l.to_sql_literal(),
            r.to_sql_literal()
        ))),
    }
}

fn float_result(value: Option<f64>) -> QueryResult<DataValue> {
    match value {
        Some(v) if v.is_finite() => Ok(DataValue::Float(v)),
        _ => Err(QueryError::NumericOverflow),
    }
}

/// Built-in scalar functions; `None` when the name is not a built-in
fn call_builtin(name: &str, args: &[DataValue]) -> Option<QueryResult<DataValue>> {
    let arity = |n: usize| -> QueryResult<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(QueryError::ExecutionError(format!(
                "{} expects {} argument(s), got {}",
                name.to_uppercase(),
                n,
                args.len()
            )))
        }
    };

    let result = match name.to_ascii_lowercase().as_str() {
        "coalesce" | "isnull" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(DataValue::Null)),
        "upper" => arity(1).map(|_| match &args[0] {
            DataValue::Text(s) => DataValue::Text(s.to_uppercase()),
            other => other.clone(),
        }),
        "lower" => arity(1).map(|_| match &args[0] {
            DataValue::Text(s) => DataValue::Text(s.to_lowercase()),
            other => other.clone(),
        }),
        "len" | "length" => arity(1).map(|_| match &args[0] {
            DataValue::Null => DataValue::Null,
            DataValue::Blob(b) => DataValue::Integer(b.len() as i64),
            other => DataValue::Integer(other.to_string().chars().count() as i64),
        }),
        "abs" => arity(1).and_then(|_| match &args[0] {
            DataValue::Integer(i) => i.checked_abs().map(DataValue::Integer).ok_or(QueryError::NumericOverflow),
            DataValue::Float(f) => Ok(DataValue::Float(f.abs())),
            DataValue::Null => Ok(DataValue::Null),
            other => Err(QueryError::TypeError(format!("ABS of {}", other.to_sql_literal()))),
        }),
        _ => return None,
    };
    Some(result)
}
