//! The final stage: control flow directives and interpolation.
//!
//! Everything structural was resolved by the earlier stages; what is left
//! here renders directly into the output string.

use super::{interp, RenderCx};
use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::{evaluate, evaluate_bool, EvalEnv};
use crate::nodes::Node;
use crate::value::{Value, ValueKind, ValueMap};

/// How a rendered block terminated.
enum Flow {
    Normal,
    Break,
    Continue,
}

pub(super) fn render(
    cx: &mut RenderCx<'_>,
    scope: &mut Context,
    nodes: Vec<Node>,
    filename: &str,
) -> Result<String, Error> {
    let mut out = String::new();
    ok!(render_into(&mut out, cx, scope, &nodes, filename, false));
    Ok(out)
}

fn render_into(
    out: &mut String,
    cx: &mut RenderCx<'_>,
    scope: &mut Context,
    nodes: &[Node],
    filename: &str,
    in_loop: bool,
) -> Result<Flow, Error> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Interp { expr, raw, lineno } => {
                out.push_str(&ok!(interp::render(cx, scope, expr, *raw, filename, *lineno)));
            }
            Node::If {
                arms,
                else_body,
                lineno,
            } => {
                let mut taken = None;
                for arm in arms {
                    if ok!(evaluate_bool(&arm.condition, &cx.eval_env(scope))
                        .map_err(|err| err.at(filename, *lineno)))
                    {
                        taken = Some(&arm.body);
                        break;
                    }
                }
                let body = taken.or(else_body.as_ref());
                if let Some(body) = body {
                    match ok!(render_into(out, cx, scope, body, filename, in_loop)) {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Node::Unless {
                condition,
                body,
                lineno,
            } => {
                if !ok!(evaluate_bool(condition, &cx.eval_env(scope))
                    .map_err(|err| err.at(filename, *lineno)))
                {
                    match ok!(render_into(out, cx, scope, body, filename, in_loop)) {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Node::Isset {
                target,
                body,
                lineno,
            } => {
                let value = ok!(probe(cx, scope, target, filename, *lineno));
                if !value.is_undefined() && !value.is_none() {
                    match ok!(render_into(out, cx, scope, body, filename, in_loop)) {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Node::EmptyCheck {
                target,
                body,
                lineno,
            } => {
                let value = ok!(probe(cx, scope, target, filename, *lineno));
                if !value.is_true() {
                    match ok!(render_into(out, cx, scope, body, filename, in_loop)) {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Node::Switch {
                subject,
                cases,
                default,
                lineno,
            } => {
                let subject = ok!(evaluate(subject, &cx.eval_env(scope))
                    .map_err(|err| err.at(filename, *lineno)));
                let mut matched = None;
                for case in cases {
                    // a case whose expression fails to evaluate never matches
                    match evaluate(&case.value, &cx.eval_env(scope)) {
                        Ok(value) if value == subject => {
                            matched = Some(&case.body);
                            break;
                        }
                        Ok(_) => {}
                        Err(err) if err.kind() == ErrorKind::SandboxViolation => {
                            return Err(err.at(filename, *lineno));
                        }
                        Err(_) => {}
                    }
                }
                if let Some(body) = matched.or(default.as_ref()) {
                    match ok!(render_into(out, cx, scope, body, filename, in_loop)) {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
            }
            Node::Loop {
                bindings,
                iterable,
                body,
                lineno,
                ..
            } => {
                let value = ok!(evaluate(iterable, &cx.eval_env(scope))
                    .map_err(|err| err.at(filename, *lineno)));
                let items = if bindings.len() > 1 && value.kind() == ValueKind::Map {
                    ok!(value.try_iter_pairs().map_err(|err| err.at(filename, *lineno)))
                } else {
                    ok!(value.try_iter().map_err(|err| err.at(filename, *lineno)))
                };
                let mut count = 0usize;
                for item in items {
                    ok!(check_loop_limit(cx, &mut count, filename, *lineno));
                    scope.push_layer(ValueMap::new());
                    if bindings.len() == 1 {
                        scope.set(bindings[0].clone(), item);
                    } else {
                        for (idx, binding) in bindings.iter().enumerate() {
                            scope.set(binding.clone(), item.get_item(&Value::from(idx)));
                        }
                    }
                    let flow = render_into(out, cx, scope, body, filename, true);
                    scope.pop_layer();
                    match ok!(flow) {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                    }
                }
            }
            Node::While {
                condition,
                body,
                lineno,
            } => {
                let mut count = 0usize;
                while ok!(evaluate_bool(condition, &cx.eval_env(scope))
                    .map_err(|err| err.at(filename, *lineno)))
                {
                    ok!(check_loop_limit(cx, &mut count, filename, *lineno));
                    match ok!(render_into(out, cx, scope, body, filename, true)) {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                    }
                }
            }
            Node::Break { .. } if in_loop => return Ok(Flow::Break),
            Node::Continue { .. } if in_loop => return Ok(Flow::Continue),
            // anything structural that survived the earlier stages
            // renders to nothing
            _ => {}
        }
    }
    Ok(Flow::Normal)
}

/// Evaluates an `@isset`/`@empty` target leniently: undefined names and
/// failed lookups come back as undefined instead of erroring, even in
/// strict mode.
fn probe(
    cx: &RenderCx<'_>,
    scope: &Context,
    target: &str,
    filename: &str,
    lineno: usize,
) -> Result<Value, Error> {
    let env = EvalEnv {
        scope,
        functions: cx.env.functions(),
        strict: false,
    };
    match evaluate(target, &env) {
        Ok(value) => Ok(value),
        Err(err) if err.kind() == ErrorKind::SandboxViolation => Err(err.at(filename, lineno)),
        Err(_) => Ok(Value::UNDEFINED),
    }
}

fn check_loop_limit(
    cx: &RenderCx<'_>,
    count: &mut usize,
    filename: &str,
    lineno: usize,
) -> Result<(), Error> {
    if *count >= cx.env.max_loop_iterations() {
        Err(Error::new(
            ErrorKind::LoopLimitExceeded,
            format!(
                "loop exceeded the limit of {} iterations",
                cx.env.max_loop_iterations()
            ),
        )
        .at(filename, lineno))
    } else {
        *count += 1;
        Ok(())
    }
}
