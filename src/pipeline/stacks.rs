//! Stacks: `@push`, `@prepend` and `@stack`.

use std::collections::BTreeMap;

use super::{transform_tree, NodeAction, RenderCx};
use crate::error::Error;
use crate::nodes::Node;

/// Collected stack contents, shared across the whole render so partials
/// and components can push onto stacks their layout emits.
#[derive(Default)]
pub(super) struct StackRegistry {
    stacks: BTreeMap<String, Vec<Vec<Node>>>,
}

impl StackRegistry {
    fn push(&mut self, name: String, body: Vec<Node>) {
        self.stacks.entry(name).or_default().push(trim_body(body));
    }

    fn prepend(&mut self, name: String, body: Vec<Node>) {
        self.stacks
            .entry(name)
            .or_default()
            .insert(0, trim_body(body));
    }

    /// Returns the stack contents as one node list, entries separated by
    /// newlines.
    fn nodes(&self, name: &str) -> Vec<Node> {
        let mut rv = Vec::new();
        if let Some(bodies) = self.stacks.get(name) {
            for (idx, body) in bodies.iter().enumerate() {
                if idx > 0 {
                    rv.push(Node::Text("\n".to_string()));
                }
                rv.extend(body.iter().cloned());
            }
        }
        rv
    }
}

/// Registers all pushes of a tree, then fills its `@stack` slots.
///
/// Both passes walk the whole tree, so a push below a conditional
/// registers whether or not the condition would render it.
pub(super) fn resolve(cx: &mut RenderCx<'_>, nodes: Vec<Node>) -> Result<Vec<Node>, Error> {
    let nodes = ok!(transform_tree(nodes, &mut |node| match node {
        Node::Push { name, body, .. } => {
            cx.stacks.push(name, body);
            Ok(NodeAction::Drop)
        }
        Node::Prepend { name, body, .. } => {
            cx.stacks.prepend(name, body);
            Ok(NodeAction::Drop)
        }
        other => Ok(NodeAction::Keep(other)),
    }));
    transform_tree(nodes, &mut |node| match node {
        Node::StackSlot { name, .. } => Ok(NodeAction::Replace(cx.stacks.nodes(&name))),
        other => Ok(NodeAction::Keep(other)),
    })
}

/// Strips the leading and trailing whitespace a block form usually
/// carries from the newlines around its directives.
fn trim_body(mut body: Vec<Node>) -> Vec<Node> {
    if let Some(Node::Text(text)) = body.first_mut() {
        *text = text.trim_start().to_string();
        if text.is_empty() {
            body.remove(0);
        }
    }
    if let Some(Node::Text(text)) = body.last_mut() {
        *text = text.trim_end().to_string();
        if text.is_empty() {
            body.pop();
        }
    }
    body
}
