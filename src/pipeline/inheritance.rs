//! Layout inheritance: `@extends`, `@section` and `@yield`.

use std::collections::BTreeMap;

use super::{transform_tree, NodeAction, RenderCx};
use crate::error::{Error, ErrorKind};
use crate::nodes::Node;

type SectionMap = BTreeMap<String, Vec<Node>>;

/// Resolves the inheritance chain of a tree.
///
/// Sections bubble up: each template's own sections are collected, child
/// sections override same-named ones, and the top-most layout's `@yield`
/// slots are filled from the merged map (or from their inline defaults).
pub(super) fn resolve(
    cx: &mut RenderCx<'_>,
    nodes: Vec<Node>,
    name: &str,
) -> Result<Vec<Node>, Error> {
    resolve_with(cx, nodes, name, SectionMap::new())
}

fn resolve_with(
    cx: &mut RenderCx<'_>,
    nodes: Vec<Node>,
    name: &str,
    inherited: SectionMap,
) -> Result<Vec<Node>, Error> {
    let mut parent: Option<(String, usize)> = None;
    let mut rest = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Extends { name, lineno } => {
                // only the first @extends counts
                if parent.is_none() {
                    parent = Some((name, lineno));
                }
            }
            other => rest.push(other),
        }
    }

    let mut sections = SectionMap::new();
    let rest = ok!(collect_sections(cx, rest, name, &mut sections));
    // sections the child already provided win over this template's own
    sections.extend(inherited);

    match parent {
        Some((parent_name, lineno)) => {
            if cx.chain.iter().any(|entry| *entry == parent_name) {
                return Err(Error::new(
                    ErrorKind::TemplateRecursion,
                    format!("template {parent_name:?} extends itself"),
                )
                .at(name, lineno));
            }
            // content outside any section is discarded when extending, but
            // stack pushes in it must still register, so they are pulled
            // out before the remainder becomes the implicit content section
            let (salvaged, rest): (Vec<Node>, Vec<Node>) = rest
                .into_iter()
                .partition(|node| matches!(node, Node::Push { .. } | Node::Prepend { .. }));
            if !sections.contains_key("content") && has_content(&rest) {
                sections.insert("content".to_string(), rest);
            }
            ok!(cx.enter(name, lineno));
            cx.chain.push(parent_name.clone());
            let rv = (|| {
                let tree = ok!(cx
                    .env
                    .get_parsed(&parent_name)
                    .map_err(|err| err.at(name, lineno)));
                resolve_with(cx, tree.as_ref().clone(), &parent_name, sections)
            })();
            cx.chain.pop();
            cx.leave();
            rv.map(|mut nodes| {
                nodes.extend(salvaged);
                nodes
            })
        }
        None => substitute_yields(cx, rest, name, &sections),
    }
}

/// Pulls all `@section` blocks out of a tree, leaving the rest intact.
fn collect_sections(
    cx: &RenderCx<'_>,
    nodes: Vec<Node>,
    filename: &str,
    sections: &mut SectionMap,
) -> Result<Vec<Node>, Error> {
    transform_tree(nodes, &mut |node| match node {
        Node::Section {
            name,
            inline,
            body,
            lineno,
        } => {
            let body = match inline {
                Some(value) => ok!(cx
                    .env
                    .parse_str(&value, filename)
                    .map_err(|err| err.at(filename, lineno))),
                None => body,
            };
            // a later definition of the same section wins
            sections.insert(name, body);
            Ok(NodeAction::Drop)
        }
        other => Ok(NodeAction::Keep(other)),
    })
}

fn substitute_yields(
    cx: &RenderCx<'_>,
    nodes: Vec<Node>,
    filename: &str,
    sections: &SectionMap,
) -> Result<Vec<Node>, Error> {
    transform_tree(nodes, &mut |node| match node {
        Node::Yield {
            name,
            default,
            lineno,
        } => match sections.get(&name) {
            Some(body) => Ok(NodeAction::Replace(body.clone())),
            None => match default {
                Some(source) => Ok(NodeAction::Replace(ok!(cx
                    .env
                    .parse_str(&source, filename)
                    .map_err(|err| err.at(filename, lineno))))),
                None => Ok(NodeAction::Drop),
            },
        },
        other => Ok(NodeAction::Keep(other)),
    })
}

fn has_content(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node {
        Node::Text(text) => !text.trim().is_empty(),
        _ => true,
    })
}
