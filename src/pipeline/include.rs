//! `@include` and `@includeIf` expansion.

use super::{sub_render, transform_tree, NodeAction, RenderCx};
use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::{evaluate, evaluate_bool};
use crate::nodes::Node;
use crate::value::ValueMap;

/// Replaces include directives with the rendered partial.
///
/// Partials see a snapshot of the caller's scope; bindings they create do
/// not leak back.
pub(super) fn resolve(
    cx: &mut RenderCx<'_>,
    scope: &Context,
    nodes: Vec<Node>,
    filename: &str,
) -> Result<Vec<Node>, Error> {
    transform_tree(nodes, &mut |node| match node {
        Node::Include { name, data, lineno } => {
            let extra = match data {
                Some(expr) => Some(ok!(eval_data(cx, scope, &expr, filename, lineno))),
                None => None,
            };
            let output = ok!(sub_render(cx, scope, &name, extra, filename, lineno));
            Ok(NodeAction::Replace(vec![Node::Text(output)]))
        }
        Node::IncludeIf {
            name,
            condition,
            lineno,
        } => {
            let wanted = ok!(evaluate_bool(&condition, &cx.eval_env(scope))
                .map_err(|err| err.at(filename, lineno)));
            if wanted {
                let output = ok!(sub_render(cx, scope, &name, None, filename, lineno));
                Ok(NodeAction::Replace(vec![Node::Text(output)]))
            } else {
                Ok(NodeAction::Drop)
            }
        }
        other => Ok(NodeAction::Keep(other)),
    })
}

/// Evaluates the explicit data argument of an include.  It must produce a
/// mapping; its entries shadow the caller's bindings in the partial.
fn eval_data(
    cx: &RenderCx<'_>,
    scope: &Context,
    expr: &str,
    filename: &str,
    lineno: usize,
) -> Result<ValueMap, Error> {
    let value = ok!(evaluate(expr, &cx.eval_env(scope)).map_err(|err| err.at(filename, lineno)));
    match value.as_map() {
        Some(map) => Ok(map.clone()),
        None => Err(Error::new(
            ErrorKind::InvalidArguments,
            "include data must evaluate to a map",
        )
        .at(filename, lineno)),
    }
}
