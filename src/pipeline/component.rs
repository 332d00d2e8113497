//! Component expansion: `<x-name>` tags and legacy `@component` blocks.

use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::{evaluate, EvalEnv};
use crate::nodes::{Attr, AttrValue, Node};
use crate::value::{Value, ValueMap};

use super::{eval_arg_lenient, render_tree, transform_tree, NodeAction, RenderCx};

/// Replaces component invocations with their rendered output.
pub(super) fn resolve(
    cx: &mut RenderCx<'_>,
    scope: &Context,
    nodes: Vec<Node>,
    filename: &str,
) -> Result<Vec<Node>, Error> {
    transform_tree(nodes, &mut |node| match node {
        Node::Component {
            name,
            attrs,
            body,
            lineno,
        } => {
            let output = ok!(render_component(
                cx, scope, &name, &attrs, body, false, filename, lineno
            ));
            Ok(NodeAction::Replace(vec![Node::Text(output)]))
        }
        Node::LegacyComponent { name, body, lineno } => {
            let output = ok!(render_component(
                cx,
                scope,
                &name,
                &[],
                body,
                true,
                filename,
                lineno
            ));
            Ok(NodeAction::Replace(vec![Node::Text(output)]))
        }
        // slots and props only mean something inside a component
        Node::Slot { .. } | Node::Props { .. } => Ok(NodeAction::Drop),
        other => Ok(NodeAction::Keep(other)),
    })
}

#[allow(clippy::too_many_arguments)]
fn render_component(
    cx: &mut RenderCx<'_>,
    scope: &Context,
    name: &str,
    attrs: &[Attr],
    body: Vec<Node>,
    legacy: bool,
    filename: &str,
    lineno: usize,
) -> Result<String, Error> {
    ok!(validate_name(name).map_err(|err| err.at(filename, lineno)));
    let tree = if legacy {
        ok!(cx.env.get_parsed(name).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                Error::new(
                    ErrorKind::ComponentNotFound,
                    format!("component {name:?} does not exist"),
                )
                .at(filename, lineno)
            } else {
                err.at(filename, lineno)
            }
        }))
    } else {
        ok!(cx
            .env
            .get_component(name)
            .map_err(|err| err.at(filename, lineno)))
    };
    ok!(cx.enter(filename, lineno));
    let rv = (|| {
        // strip @props from the component tree, keeping its declarations
        let mut props: Vec<(String, Option<String>)> = Vec::new();
        let tree = ok!(transform_tree(tree.as_ref().clone(), &mut |node| {
            match node {
                Node::Props { pairs, .. } => {
                    props.extend(pairs);
                    Ok(NodeAction::Drop)
                }
                other => Ok(NodeAction::Keep(other)),
            }
        }));

        // declared prop defaults, evaluated without access to the caller scope
        let mut data = ValueMap::new();
        let empty = Context::default();
        for (key, default) in &props {
            let value = match default {
                Some(expr) => match evaluate(
                    expr,
                    &EvalEnv {
                        scope: &empty,
                        functions: cx.env.functions(),
                        strict: false,
                    },
                ) {
                    Ok(value) => value,
                    Err(err) if err.kind() == ErrorKind::SandboxViolation => {
                        return Err(err.at(filename, lineno));
                    }
                    Err(_) => Value::from(expr.as_str()),
                },
                None => Value::UNDEFINED,
            };
            data.insert(key.clone(), value);
        }

        // attributes matching a declared prop bind as named data; the
        // rest are reachable only through `{{ attributes }}`
        let mut passthrough: Vec<(String, Value)> = Vec::new();
        for attr in attrs {
            let key = attr.name.replace('-', "_");
            let value = match &attr.value {
                AttrValue::Static(text) => Value::from(text.as_str()),
                AttrValue::Dynamic(expr) => {
                    ok!(eval_arg_lenient(cx, scope, expr, filename, lineno))
                }
                AttrValue::Flag => Value::from(true),
            };
            if props.iter().any(|(name, _)| *name == key) {
                data.insert(key, value);
            } else {
                passthrough.push((key, value));
            }
        }

        // named slots render against the caller scope
        let mut slots = ValueMap::new();
        let mut default_body = Vec::new();
        for node in body {
            match node {
                Node::Slot {
                    name: slot_name,
                    body: slot_body,
                    ..
                } => {
                    let mut slot_scope = Context::new(scope.flatten());
                    let output = ok!(render_tree(cx, &mut slot_scope, slot_body, filename));
                    slots.insert(slot_name, Value::from_safe_string(output));
                }
                other => default_body.push(other),
            }
        }
        let mut slot_scope = Context::new(scope.flatten());
        let default_slot = ok!(render_tree(cx, &mut slot_scope, default_body, filename));
        slots.insert(
            "slot".to_string(),
            Value::from_safe_string(default_slot.trim().to_string()),
        );

        let mut base = scope.flatten();
        base.extend(data);
        base.extend(slots);
        base.insert(
            "attributes".to_string(),
            Value::from_safe_string(format_attributes(&passthrough)),
        );

        let mut child = Context::new(base);
        render_tree(cx, &mut child, tree, name)
    })();
    cx.leave();
    rv
}

/// Component names may only contain alphanumerics, `-`, `_` and `.`, and
/// never a `..` sequence.
fn validate_name(name: &str) -> Result<(), Error> {
    let ok = !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidComponentName,
            format!("invalid component name {name:?}"),
        ))
    }
}

/// Renders undeclared attributes back into HTML attribute syntax.
fn format_attributes(attrs: &[(String, Value)]) -> String {
    let mut rv = String::new();
    for (name, value) in attrs {
        let name = name.replace('_', "-");
        if value.is_none() || value.is_undefined() {
            continue;
        }
        if let Some(flag) = value.as_bool() {
            if flag {
                if !rv.is_empty() {
                    rv.push(' ');
                }
                rv.push_str(&name);
            }
            continue;
        }
        if !rv.is_empty() {
            rv.push(' ');
        }
        rv.push_str(&name);
        rv.push_str("=\"");
        rv.push_str(&value.to_string().replace('"', "&quot;"));
        rv.push('"');
    }
    rv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("alert").is_ok());
        assert!(validate_name("forms.input").is_ok());
        assert!(validate_name("my-button_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../secret").is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[test]
    fn test_format_attributes() {
        let attrs = vec![
            ("class".to_string(), Value::from("btn btn-primary")),
            ("data_id".to_string(), Value::from(7)),
            ("disabled".to_string(), Value::from(true)),
            ("hidden".to_string(), Value::from(false)),
            ("title".to_string(), Value::from("say \"hi\"")),
            ("skipped".to_string(), Value::from(())),
        ];
        assert_eq!(
            format_attributes(&attrs),
            "class=\"btn btn-primary\" data-id=\"7\" disabled title=\"say &quot;hi&quot;\""
        );
    }
}
