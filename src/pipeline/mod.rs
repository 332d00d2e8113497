//! The staged render pipeline.
//!
//! A parsed template runs through fixed stages in order: layout
//! inheritance, includes, components, host registered directives, stack
//! substitution, and finally control flow with interpolation.  Each stage
//! rewrites the node tree; the last stage produces the output string.
//!
//! Earlier stages resolve against the scope as it stands when the stage
//! runs.  An `@include` inside a loop body is therefore expanded once, not
//! per iteration.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, ErrorKind};
use crate::expr::{evaluate, EvalEnv};
use crate::nodes::Node;
use crate::parser;
use crate::value::Value;

mod component;
mod control;
mod include;
mod inheritance;
mod interp;
mod stacks;

use self::stacks::StackRegistry;

/// State threaded through one render call and all templates it pulls in.
pub(crate) struct RenderCx<'env> {
    pub env: &'env Engine,
    /// Current include/component/layout nesting depth.
    depth: usize,
    /// Stack contents accumulate across the whole render.
    stacks: StackRegistry,
    /// Chain of layout names, for extends cycle detection.
    chain: Vec<String>,
}

impl<'env> RenderCx<'env> {
    pub fn new(env: &'env Engine, root: &str) -> RenderCx<'env> {
        RenderCx {
            env,
            depth: 0,
            stacks: StackRegistry::default(),
            chain: vec![root.to_string()],
        }
    }

    /// Bumps the nesting depth, failing once the configured limit is hit.
    fn enter(&mut self, filename: &str, lineno: usize) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.env.max_recursion_depth() {
            Err(Error::new(
                ErrorKind::RecursionLimitExceeded,
                format!(
                    "template nesting exceeded the limit of {}",
                    self.env.max_recursion_depth()
                ),
            )
            .at(filename, lineno))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn eval_env<'a>(&'a self, scope: &'a Context) -> EvalEnv<'a> {
        EvalEnv {
            scope,
            functions: self.env.functions(),
            strict: self.env.strict(),
        }
    }
}

/// Runs all pipeline stages over a parsed tree and returns the output.
pub(crate) fn render_tree(
    cx: &mut RenderCx<'_>,
    scope: &mut Context,
    nodes: Vec<Node>,
    name: &str,
) -> Result<String, Error> {
    let nodes = ok!(inheritance::resolve(cx, nodes, name));
    let nodes = ok!(include::resolve(cx, scope, nodes, name));
    let nodes = ok!(component::resolve(cx, scope, nodes, name));
    let nodes = ok!(expand_custom(cx, scope, nodes, name));
    let nodes = ok!(stacks::resolve(cx, nodes));
    control::render(cx, scope, nodes, name)
}

/// Renders another template in a child scope that inherits the caller's
/// bindings.  Used for includes and legacy components.
pub(crate) fn sub_render(
    cx: &mut RenderCx<'_>,
    scope: &Context,
    name: &str,
    extra: Option<crate::value::ValueMap>,
    filename: &str,
    lineno: usize,
) -> Result<String, Error> {
    ok!(cx.enter(filename, lineno));
    let rv = (|| {
        let tree = ok!(cx.env.get_parsed(name));
        let mut base = scope.flatten();
        if let Some(extra) = extra {
            base.extend(extra);
        }
        let mut child = Context::new(base);
        render_tree(cx, &mut child, tree.as_ref().clone(), name)
    })();
    cx.leave();
    rv.map_err(|err| err.at(filename, lineno))
}

/// What a stage callback decides to do with a node it was handed.
pub(crate) enum NodeAction {
    /// Keep the node; the walker recurses into its bodies.
    Keep(Node),
    /// Splice these nodes in place of the original, as-is.
    Replace(Vec<Node>),
    Drop,
}

/// Rewrites a tree with a per-node callback, depth first.
///
/// Replacement nodes are spliced verbatim; the callback does not see them
/// again, so a stage cannot loop on its own output.
pub(crate) fn transform_tree<F>(nodes: Vec<Node>, f: &mut F) -> Result<Vec<Node>, Error>
where
    F: FnMut(Node) -> Result<NodeAction, Error>,
{
    let mut rv = Vec::with_capacity(nodes.len());
    for node in nodes {
        match ok!(f(node)) {
            NodeAction::Keep(node) => rv.push(ok!(transform_bodies(node, f))),
            NodeAction::Replace(nodes) => rv.extend(nodes),
            NodeAction::Drop => {}
        }
    }
    Ok(rv)
}

fn transform_bodies<F>(node: Node, f: &mut F) -> Result<Node, Error>
where
    F: FnMut(Node) -> Result<NodeAction, Error>,
{
    Ok(match node {
        Node::Section {
            name,
            inline,
            body,
            lineno,
        } => Node::Section {
            name,
            inline,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::If {
            arms,
            else_body,
            lineno,
        } => Node::If {
            arms: {
                let mut rv = Vec::with_capacity(arms.len());
                for arm in arms {
                    rv.push(crate::nodes::IfArm {
                        condition: arm.condition,
                        body: ok!(transform_tree(arm.body, f)),
                    });
                }
                rv
            },
            else_body: match else_body {
                Some(body) => Some(ok!(transform_tree(body, f))),
                None => None,
            },
            lineno,
        },
        Node::Unless {
            condition,
            body,
            lineno,
        } => Node::Unless {
            condition,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Isset {
            target,
            body,
            lineno,
        } => Node::Isset {
            target,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::EmptyCheck {
            target,
            body,
            lineno,
        } => Node::EmptyCheck {
            target,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Switch {
            subject,
            cases,
            default,
            lineno,
        } => Node::Switch {
            subject,
            cases: {
                let mut rv = Vec::with_capacity(cases.len());
                for case in cases {
                    rv.push(crate::nodes::SwitchCase {
                        value: case.value,
                        body: ok!(transform_tree(case.body, f)),
                    });
                }
                rv
            },
            default: match default {
                Some(body) => Some(ok!(transform_tree(body, f))),
                None => None,
            },
            lineno,
        },
        Node::Loop {
            style,
            bindings,
            iterable,
            body,
            lineno,
        } => Node::Loop {
            style,
            bindings,
            iterable,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::While {
            condition,
            body,
            lineno,
        } => Node::While {
            condition,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Push { name, body, lineno } => Node::Push {
            name,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Prepend { name, body, lineno } => Node::Prepend {
            name,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Component {
            name,
            attrs,
            body,
            lineno,
        } => Node::Component {
            name,
            attrs,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::Slot { name, body, lineno } => Node::Slot {
            name,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        Node::LegacyComponent { name, body, lineno } => Node::LegacyComponent {
            name,
            body: ok!(transform_tree(body, f)),
            lineno,
        },
        other => other,
    })
}

/// Expands host registered directives into their replacement text.
///
/// Arguments are evaluated against the current scope; an argument that
/// fails to evaluate is passed through as its literal expression string,
/// except for sandbox violations which always abort.
fn expand_custom(
    cx: &mut RenderCx<'_>,
    scope: &Context,
    nodes: Vec<Node>,
    filename: &str,
) -> Result<Vec<Node>, Error> {
    transform_tree(nodes, &mut |node| match node {
        Node::Custom { name, args, lineno } => {
            let handler = match cx.env.directive(&name) {
                Some(handler) => handler,
                None => {
                    // Unregistered names never parse as Custom, but a
                    // directive can be removed between parses.
                    return Ok(NodeAction::Drop);
                }
            };
            let mut values = Vec::new();
            if !args.trim().is_empty() {
                for raw in parser::split_top_level(&args, ',') {
                    let raw = raw.trim();
                    values.push(ok!(eval_arg_lenient(cx, scope, raw, filename, lineno)));
                }
            }
            let output =
                ok!(handler(&values).map_err(|err| err.at(filename, lineno)));
            Ok(NodeAction::Replace(vec![Node::Text(output)]))
        }
        other => Ok(NodeAction::Keep(other)),
    })
}

/// Evaluates a directive or attribute expression, falling back to the raw
/// expression text when evaluation fails for any reason other than a
/// sandbox violation.
pub(crate) fn eval_arg_lenient(
    cx: &RenderCx<'_>,
    scope: &Context,
    raw: &str,
    filename: &str,
    lineno: usize,
) -> Result<Value, Error> {
    match evaluate(raw, &cx.eval_env(scope)) {
        Ok(value) => Ok(value),
        Err(err) if err.kind() == ErrorKind::SandboxViolation => {
            Err(err.at(filename, lineno))
        }
        Err(_) => Ok(Value::from(raw)),
    }
}
