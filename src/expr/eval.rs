use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::ast::{BinOpKind, Expr, UnaryOpKind};
use crate::expr::parser::parse_expr;
use crate::value::{ops, Value, ValueMap};

/// The table of callables expressions may invoke by name.
///
/// Holds the fixed builtin functions plus host registered globals; it is
/// read-only during rendering.
pub type FunctionTable = BTreeMap<String, Value>;

/// Everything the evaluator needs besides the expression itself.
///
/// Injected per render rather than accessed ambiently so that engines
/// with different configurations cannot interfere.
pub struct EvalEnv<'a> {
    pub scope: &'a Context,
    pub functions: &'a Arc<FunctionTable>,
    pub strict: bool,
}

/// Parses and evaluates an expression against a context.
///
/// The evaluator walks a closed syntax form; any construct outside of it
/// never parses, and attribute or index names reaching for underscored
/// internals fail with a [`SandboxViolation`](ErrorKind::SandboxViolation).
/// Evaluation never mutates the scope.
pub fn evaluate(source: &str, env: &EvalEnv<'_>) -> Result<Value, Error> {
    let source = source.trim();
    if source.is_empty() {
        return Ok(Value::from(()));
    }
    let expr = ok!(parse_expr(source));
    eval(&expr, env)
}

/// Evaluates an expression and reduces it to its truthiness.
pub fn evaluate_bool(source: &str, env: &EvalEnv<'_>) -> Result<bool, Error> {
    Ok(ok!(evaluate(source, env)).is_true())
}

fn sandbox_violation(detail: String) -> Error {
    Error::new(ErrorKind::SandboxViolation, detail)
}

fn check_attr_name(name: &str) -> Result<(), Error> {
    if name.starts_with('_') {
        Err(sandbox_violation(format!(
            "access to internal attribute {name:?} is forbidden"
        )))
    } else {
        Ok(())
    }
}

fn lookup_name(name: &str, env: &EvalEnv<'_>) -> Result<Value, Error> {
    if name.starts_with("__") && name.ends_with("__") {
        return Err(sandbox_violation(format!(
            "access to internal name {name:?} is forbidden"
        )));
    }
    match env.scope.lookup(name) {
        Some(value) => Ok(value),
        None if env.strict => Err(Error::new(
            ErrorKind::UndefinedVariable,
            format!("{name} is undefined"),
        )),
        None => Ok(Value::UNDEFINED),
    }
}

pub(crate) fn eval(expr: &Expr, env: &EvalEnv<'_>) -> Result<Value, Error> {
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Var(name) => lookup_name(name, env),
        Expr::List(items) | Expr::Tuple(items) => items
            .iter()
            .map(|item| eval(item, env))
            .collect::<Result<Value, Error>>(),
        Expr::Set(items) => {
            let mut rv: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                let value = ok!(eval(item, env));
                if !rv.contains(&value) {
                    rv.push(value);
                }
            }
            Ok(rv.into_iter().collect())
        }
        Expr::Map(pairs) => {
            let mut rv = ValueMap::new();
            for (key, value) in pairs {
                let key = ok!(eval(key, env));
                let key = match key.as_str() {
                    Some(s) => s.to_string(),
                    None => key.to_string(),
                };
                rv.insert(key, ok!(eval(value, env)));
            }
            Ok(Value::from(rv))
        }
        Expr::UnaryOp(UnaryOpKind::Not, inner) => {
            Ok(Value::from(!ok!(eval(inner, env)).is_true()))
        }
        Expr::UnaryOp(UnaryOpKind::Neg, inner) => ops::neg(&ok!(eval(inner, env))),
        Expr::BinOp(op, left, right) => eval_binop(*op, left, right, env),
        Expr::IfExpr {
            cond,
            then,
            otherwise,
        } => {
            if ok!(eval(cond, env)).is_true() {
                eval(then, env)
            } else {
                match otherwise {
                    Some(otherwise) => eval(otherwise, env),
                    None => Ok(Value::UNDEFINED),
                }
            }
        }
        Expr::GetAttr(inner, name) => {
            ok!(check_attr_name(name));
            let value = ok!(eval(inner, env));
            // attribute access on mappings falls back to index access so
            // dotted paths work over nested data
            Ok(value.get_attr(name))
        }
        Expr::GetItem(inner, index) => {
            let value = ok!(eval(inner, env));
            let index = ok!(eval(index, env));
            if let Some(key) = index.as_str() {
                ok!(check_attr_name(key));
            }
            Ok(value.get_item(&index))
        }
        Expr::Call(callee, args) => {
            let arg_values = ok!(args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, Error>>());
            let func = match &**callee {
                // calls by name resolve only against scope values and the
                // registered function table, never ambient names
                Expr::Var(name) => match env.scope.lookup(name) {
                    Some(value) => value,
                    None => match env.functions.get(name.as_str()) {
                        Some(value) => value.clone(),
                        None => {
                            return Err(sandbox_violation(format!(
                                "call to unregistered function {name:?}"
                            )))
                        }
                    },
                },
                other => ok!(eval(other, env)),
            };
            func.call(&arg_values)
        }
        Expr::Lambda { params, body } => {
            let params = params.clone();
            let body = Arc::new((**body).clone());
            let captured = env.scope.flatten();
            let functions = Arc::clone(env.functions);
            let strict = env.strict;
            Ok(Value::from_function("<lambda>", move |args: &[Value]| {
                if args.len() != params.len() {
                    return Err(Error::new(
                        ErrorKind::InvalidArguments,
                        format!(
                            "lambda takes {} argument(s) but {} were given",
                            params.len(),
                            args.len()
                        ),
                    ));
                }
                let mut scope = Context::new(captured.clone());
                let mut layer = ValueMap::new();
                for (param, arg) in params.iter().zip(args) {
                    layer.insert(param.clone(), arg.clone());
                }
                scope.push_layer(layer);
                eval(
                    &body,
                    &EvalEnv {
                        scope: &scope,
                        functions: &functions,
                        strict,
                    },
                )
            }))
        }
    }
}

fn eval_binop(op: BinOpKind, left: &Expr, right: &Expr, env: &EvalEnv<'_>) -> Result<Value, Error> {
    // boolean operators short circuit and yield the deciding operand
    match op {
        BinOpKind::And => {
            let lhs = ok!(eval(left, env));
            return if lhs.is_true() { eval(right, env) } else { Ok(lhs) };
        }
        BinOpKind::Or => {
            let lhs = ok!(eval(left, env));
            return if lhs.is_true() { Ok(lhs) } else { eval(right, env) };
        }
        _ => {}
    }

    let lhs = ok!(eval(left, env));
    let rhs = ok!(eval(right, env));
    match op {
        BinOpKind::Add => ops::add(&lhs, &rhs),
        BinOpKind::Sub => ops::sub(&lhs, &rhs),
        BinOpKind::Mul => ops::mul(&lhs, &rhs),
        BinOpKind::Div => ops::div(&lhs, &rhs),
        BinOpKind::FloorDiv => ops::int_div(&lhs, &rhs),
        BinOpKind::Mod => ops::rem(&lhs, &rhs),
        BinOpKind::Pow => ops::pow(&lhs, &rhs),
        BinOpKind::Eq => Ok(Value::from(ops::value_eq(&lhs, &rhs))),
        BinOpKind::Ne => Ok(Value::from(!ops::value_eq(&lhs, &rhs))),
        BinOpKind::Lt | BinOpKind::Lte | BinOpKind::Gt | BinOpKind::Gte => {
            let ordering = match ops::value_cmp(&lhs, &rhs) {
                Some(ordering) => ordering,
                None => {
                    return Err(Error::new(
                        ErrorKind::InvalidOperation,
                        format!("cannot compare {} with {}", lhs.kind(), rhs.kind()),
                    ))
                }
            };
            Ok(Value::from(match op {
                BinOpKind::Lt => ordering.is_lt(),
                BinOpKind::Lte => ordering.is_le(),
                BinOpKind::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinOpKind::In => Ok(Value::from(ok!(ops::contains(&rhs, &lhs)))),
        BinOpKind::NotIn => Ok(Value::from(!ok!(ops::contains(&rhs, &lhs)))),
        BinOpKind::And | BinOpKind::Or => unreachable!(),
    }
}
