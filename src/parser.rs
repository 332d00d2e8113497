//! The directive matcher.
//!
//! Turns template text into a [`Node`] tree in a single left-to-right scan.
//! Comments are skipped before anything else so that their bodies are never
//! interpreted as directives.  Block directives nest through recursion, which
//! gives the depth-counting behavior for free: an opener of the same family
//! inside a block consumes its own closer, while a stray closer of a
//! different family fails instead of terminating the block early.
//!
//! Anything that does not scan as a known directive stays literal text, so
//! `user@example.com` or a lone `{` pass through untouched.

use std::collections::BTreeSet;
use std::mem;

use crate::error::{Error, ErrorKind};
use crate::nodes::{Attr, AttrValue, IfArm, LoopStyle, Node, SwitchCase};
use crate::utils::{line_of_offset, memstr};

/// Directive words that terminate or branch an enclosing block.  Meeting one
/// of these outside a block that accepts it is a syntax error.
const BLOCK_FOLLOWERS: &[&str] = &[
    "elseif",
    "else",
    "endif",
    "endunless",
    "endisset",
    "endempty",
    "case",
    "default",
    "endswitch",
    "endforeach",
    "endfor",
    "endwhile",
    "endsection",
    "endpush",
    "endprepend",
    "endcomponent",
    "endslot",
];

/// Parses a template into its directive tree.
///
/// `custom` holds the names of host registered directives; any `@word` that
/// is neither a core directive nor listed there stays literal text.
pub fn parse(source: &str, filename: &str, custom: &BTreeSet<String>) -> Result<Vec<Node>, Error> {
    let mut parser = Parser {
        source,
        pos: 0,
        filename,
        custom,
    };
    let (nodes, _) = ok!(parser.parse_nodes(&Block::TOP));
    Ok(nodes)
}

/// Describes the enclosing block while its body is parsed.
struct Block<'s> {
    /// Directive words that end or branch this block.
    stops: &'s [&'s str],
    /// Closing tag name for component/slot blocks (e.g. `x-card`).
    tag: Option<&'s str>,
    /// How to describe the opener in an unclosed-block error.
    opener: &'s str,
    /// Line the opener started on.
    line: usize,
}

impl Block<'static> {
    const TOP: Block<'static> = Block {
        stops: &[],
        tag: None,
        opener: "",
        line: 0,
    };
}

/// What ended a block body.
enum EndToken {
    Eof,
    /// A stop directive such as `endif`, or a branch such as `elseif` with
    /// its raw argument text.
    Directive { name: String, args: String },
    /// The matching `</x-...>` tag.
    TagClose,
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    filename: &'a str,
    custom: &'a BTreeSet<String>,
}

impl<'a> Parser<'a> {
    fn line(&self, offset: usize) -> usize {
        line_of_offset(self.source, offset)
    }

    fn syntax_error(&self, offset: usize, detail: String) -> Error {
        Error::new(ErrorKind::MalformedTemplate, detail).at(self.filename, self.line(offset))
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Parses nodes until one of the block's stop tokens, its closing tag,
    /// or (for the top level) the end of input.
    fn parse_nodes(&mut self, block: &Block<'_>) -> Result<(Vec<Node>, EndToken), Error> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        macro_rules! flush {
            () => {
                if !text.is_empty() {
                    nodes.push(Node::Text(mem::take(&mut text)));
                }
            };
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                if block.stops.is_empty() && block.tag.is_none() {
                    flush!();
                    return Ok((nodes, EndToken::Eof));
                }
                return Err(self.syntax_error(
                    block_opener_offset(self.source, block),
                    format!("unclosed {} started on line {}", block.opener, block.line),
                ));
            }

            let bytes = rest.as_bytes();
            match bytes
                .iter()
                .position(|&b| b == b'@' || b == b'{' || b == b'<')
            {
                None => {
                    text.push_str(rest);
                    self.pos += rest.len();
                    continue;
                }
                Some(idx) => {
                    text.push_str(&rest[..idx]);
                    self.pos += idx;
                }
            }

            let start = self.pos;
            let rest = self.rest();

            if rest.starts_with("{{--") {
                match memstr(rest.as_bytes(), b"--}}") {
                    Some(end) => {
                        self.pos += end + 4;
                    }
                    None => {
                        return Err(
                            self.syntax_error(start, "unclosed comment {{--".to_string())
                        );
                    }
                }
            } else if rest.starts_with("{!!") {
                match find_on_line(&rest[3..], "!!}") {
                    Some(end) => {
                        flush!();
                        nodes.push(Node::Interp {
                            expr: rest[3..3 + end].trim().to_string(),
                            raw: true,
                            lineno: self.line(start),
                        });
                        self.pos += 3 + end + 3;
                    }
                    None => {
                        text.push('{');
                        self.pos += 1;
                    }
                }
            } else if rest.starts_with("{{") {
                match find_on_line(&rest[2..], "}}") {
                    Some(end) => {
                        flush!();
                        nodes.push(Node::Interp {
                            expr: rest[2..2 + end].trim().to_string(),
                            raw: false,
                            lineno: self.line(start),
                        });
                        self.pos += 2 + end + 2;
                    }
                    None => {
                        text.push('{');
                        self.pos += 1;
                    }
                }
            } else if rest.starts_with('@') {
                let name = ident_after(&rest[1..]);
                if name.is_empty() {
                    text.push('@');
                    self.pos += 1;
                    continue;
                }
                if BLOCK_FOLLOWERS.contains(&name) {
                    if block.stops.contains(&name) {
                        flush!();
                        self.pos += 1 + name.len();
                        let args = if matches!(name, "elseif" | "case") {
                            ok!(self.parse_parens(start))
                        } else {
                            String::new()
                        };
                        return Ok((
                            nodes,
                            EndToken::Directive {
                                name: name.to_string(),
                                args,
                            },
                        ));
                    }
                    return Err(
                        self.syntax_error(start, format!("unexpected @{name} directive"))
                    );
                }
                match ok!(self.parse_directive(name, start)) {
                    Some(node) => {
                        flush!();
                        nodes.push(node);
                    }
                    None => {
                        // not a directive after all; keep the @ literal
                        text.push('@');
                        self.pos += 1;
                    }
                }
            } else if rest.starts_with("</x-") {
                let name = tag_ident(&rest[2..]);
                let close_end = 2 + name.len();
                let after = rest[close_end..].trim_start();
                if !after.starts_with('>') {
                    return Err(
                        self.syntax_error(start, format!("malformed closing tag </{name}"))
                    );
                }
                if block.tag != Some(name) {
                    return Err(
                        self.syntax_error(start, format!("unexpected closing tag </{name}>"))
                    );
                }
                flush!();
                self.pos += rest.len() - after.len() + 1;
                return Ok((nodes, EndToken::TagClose));
            } else if rest.starts_with("<x-") && !tag_ident(&rest[1..])["x-".len()..].is_empty() {
                flush!();
                let node = ok!(self.parse_tag(start));
                nodes.push(node);
            } else {
                // a plain { or < with no directive behind it
                text.push(rest.as_bytes()[0] as char);
                self.pos += 1;
            }
        }
    }

    /// Dispatches a `@name` directive.  Returns `None` when the word is not
    /// a directive, which keeps the text literal.
    fn parse_directive(&mut self, name: &'a str, start: usize) -> Result<Option<Node>, Error> {
        let lineno = self.line(start);
        // directives that take parentheses only count when the parens are
        // actually there, so @if without ( stays literal text
        macro_rules! args_or_literal {
            () => {{
                let save = self.pos;
                self.pos = start + 1 + name.len();
                if !self.at_parens() {
                    self.pos = save;
                    return Ok(None);
                }
                ok!(self.parse_parens(start))
            }};
        }

        let node = match name {
            "extends" => {
                let args = args_or_literal!();
                Node::Extends {
                    name: unquote(&args),
                    lineno,
                }
            }
            "section" => {
                let args = args_or_literal!();
                let parts = split_top_level(&args, ',');
                if parts.len() >= 2 {
                    Node::Section {
                        name: unquote(parts[0]),
                        inline: Some(unquote(parts[1])),
                        body: Vec::new(),
                        lineno,
                    }
                } else {
                    let (body, _) = ok!(self.parse_block(&["endsection"], None, "@section", lineno));
                    Node::Section {
                        name: unquote(&args),
                        inline: None,
                        body,
                        lineno,
                    }
                }
            }
            "yield" => {
                let args = args_or_literal!();
                let parts = split_top_level(&args, ',');
                Node::Yield {
                    name: unquote(parts[0]),
                    default: parts.get(1).map(|p| unquote(p)),
                    lineno,
                }
            }
            "include" => {
                let args = args_or_literal!();
                let parts = split_top_level(&args, ',');
                Node::Include {
                    name: unquote(parts[0]),
                    data: parts.get(1).map(|p| p.trim().to_string()),
                    lineno,
                }
            }
            "includeIf" => {
                let args = args_or_literal!();
                let parts = split_top_level(&args, ',');
                if parts.len() != 2 {
                    return Err(self.syntax_error(
                        start,
                        "@includeIf takes a template name and a condition".to_string(),
                    ));
                }
                Node::IncludeIf {
                    name: unquote(parts[0]),
                    condition: parts[1].trim().to_string(),
                    lineno,
                }
            }
            "if" => {
                let args = args_or_literal!();
                ok!(self.parse_if(args, lineno))
            }
            "unless" => {
                let condition = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endunless"], None, "@unless", lineno));
                Node::Unless {
                    condition,
                    body,
                    lineno,
                }
            }
            "isset" => {
                let args = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endisset"], None, "@isset", lineno));
                Node::Isset {
                    target: unquote(&args),
                    body,
                    lineno,
                }
            }
            "empty" => {
                let args = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endempty"], None, "@empty", lineno));
                Node::EmptyCheck {
                    target: unquote(&args),
                    body,
                    lineno,
                }
            }
            "switch" => {
                let subject = args_or_literal!();
                ok!(self.parse_switch(subject, lineno))
            }
            "foreach" => {
                let args = args_or_literal!();
                ok!(self.parse_loop(LoopStyle::Foreach, args, start, lineno))
            }
            "for" => {
                let args = args_or_literal!();
                ok!(self.parse_loop(LoopStyle::For, args, start, lineno))
            }
            "while" => {
                let condition = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endwhile"], None, "@while", lineno));
                Node::While {
                    condition,
                    body,
                    lineno,
                }
            }
            "break" => {
                self.pos = start + "@break".len();
                Node::Break { lineno }
            }
            "continue" => {
                self.pos = start + "@continue".len();
                Node::Continue { lineno }
            }
            "push" => {
                let args = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endpush"], None, "@push", lineno));
                Node::Push {
                    name: unquote(&args),
                    body,
                    lineno,
                }
            }
            "prepend" => {
                let args = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endprepend"], None, "@prepend", lineno));
                Node::Prepend {
                    name: unquote(&args),
                    body,
                    lineno,
                }
            }
            "stack" => {
                let args = args_or_literal!();
                Node::StackSlot {
                    name: unquote(&args),
                    lineno,
                }
            }
            "props" => {
                let args = args_or_literal!();
                Node::Props {
                    pairs: ok!(self.parse_props(&args, start)),
                    lineno,
                }
            }
            "component" => {
                let args = args_or_literal!();
                let (body, _) =
                    ok!(self.parse_block(&["endcomponent"], None, "@component", lineno));
                Node::LegacyComponent {
                    name: unquote(&args),
                    body,
                    lineno,
                }
            }
            "slot" => {
                let args = args_or_literal!();
                let (body, _) = ok!(self.parse_block(&["endslot"], None, "@slot", lineno));
                Node::Slot {
                    name: unquote(&args),
                    body,
                    lineno,
                }
            }
            other if self.custom.contains(other) => {
                self.pos = start + 1 + other.len();
                let args = if self.at_parens() {
                    ok!(self.parse_parens(start))
                } else {
                    String::new()
                };
                Node::Custom {
                    name: other.to_string(),
                    args,
                    lineno,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(node))
    }

    fn parse_if(&mut self, condition: String, lineno: usize) -> Result<Node, Error> {
        let mut arms = Vec::new();
        let mut else_body = None;
        let mut condition = condition;
        loop {
            let (body, end) =
                ok!(self.parse_block(&["elseif", "else", "endif"], None, "@if", lineno));
            arms.push(IfArm { condition, body });
            match end {
                EndToken::Directive { name, args } if name == "elseif" => {
                    condition = args;
                }
                EndToken::Directive { name, .. } if name == "else" => {
                    let (body, _) = ok!(self.parse_block(&["endif"], None, "@if", lineno));
                    else_body = Some(body);
                    break;
                }
                _ => break,
            }
        }
        Ok(Node::If {
            arms,
            else_body,
            lineno,
        })
    }

    fn parse_switch(&mut self, subject: String, lineno: usize) -> Result<Node, Error> {
        // anything before the first @case or @default is discarded
        let (_, mut end) =
            ok!(self.parse_block(&["case", "default", "endswitch"], None, "@switch", lineno));
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            match end {
                EndToken::Directive { name, args } if name == "case" => {
                    let (mut body, next) = ok!(self.parse_block(
                        &["case", "default", "endswitch"],
                        None,
                        "@switch",
                        lineno
                    ));
                    // @break between cases is separator noise, not a loop exit
                    body.retain(|node| !matches!(node, Node::Break { .. }));
                    cases.push(SwitchCase { value: args, body });
                    end = next;
                }
                EndToken::Directive { name, .. } if name == "default" => {
                    let (mut body, next) =
                        ok!(self.parse_block(&["endswitch"], None, "@switch", lineno));
                    body.retain(|node| !matches!(node, Node::Break { .. }));
                    default = Some(body);
                    end = next;
                }
                _ => break,
            }
        }
        Ok(Node::Switch {
            subject,
            cases,
            default,
            lineno,
        })
    }

    fn parse_loop(
        &mut self,
        style: LoopStyle,
        header: String,
        start: usize,
        lineno: usize,
    ) -> Result<Node, Error> {
        let split = match find_top_level(&header, " in ") {
            Some(idx) => idx,
            None => {
                return Err(self.syntax_error(
                    start,
                    format!("@{} header must be `name in iterable`", style.keyword()),
                ));
            }
        };
        let bindings: Vec<String> = header[..split]
            .split(',')
            .map(|part| part.trim().trim_start_matches('$').to_string())
            .filter(|part| !part.is_empty())
            .collect();
        if bindings.is_empty() {
            return Err(self.syntax_error(start, "loop binds no variable".to_string()));
        }
        let iterable = header[split + 4..].trim().to_string();
        let closer: &[&str] = match style {
            LoopStyle::Foreach => &["endforeach"],
            LoopStyle::For => &["endfor"],
        };
        let opener = match style {
            LoopStyle::Foreach => "@foreach",
            LoopStyle::For => "@for",
        };
        let (body, _) = ok!(self.parse_block(closer, None, opener, lineno));
        Ok(Node::Loop {
            style,
            bindings,
            iterable,
            body,
            lineno,
        })
    }

    /// Parses a tag-style `<x-...>` component or slot at the current cursor.
    fn parse_tag(&mut self, start: usize) -> Result<Node, Error> {
        let lineno = self.line(start);
        let rest = self.rest();
        // component names stop before `:` so <x-slot:title> is seen as a slot
        let name_len = rest[1..]
            .bytes()
            .position(|b| !b.is_ascii_alphanumeric() && b != b'-' && b != b'.')
            .unwrap_or(rest.len() - 1);
        let name = &rest[1..1 + name_len];
        let inner = &name["x-".len()..];

        if inner == "slot" {
            return self.parse_slot(start, lineno);
        }
        self.pos = start + 1 + name.len();
        let (attrs, self_closing) = ok!(self.parse_attrs(start));
        let body = if self_closing {
            Vec::new()
        } else {
            let block = Block {
                stops: &[],
                tag: Some(name),
                opener: "component tag",
                line: lineno,
            };
            let (body, _) = ok!(self.parse_nodes(&block));
            body
        };
        Ok(Node::Component {
            name: inner.to_string(),
            attrs,
            body,
            lineno,
        })
    }

    fn parse_slot(&mut self, start: usize, lineno: usize) -> Result<Node, Error> {
        let rest = self.rest();
        // <x-slot:name>...</x-slot:name>
        if let Some(after) = rest.strip_prefix("<x-slot:") {
            let name: String = after
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
                .map(|b| b as char)
                .collect();
            let after_name = &after[name.len()..];
            if name.is_empty() || !after_name.trim_start().starts_with('>') {
                return Err(self.syntax_error(start, "malformed <x-slot:> tag".to_string()));
            }
            self.pos = start + "<x-slot:".len() + name.len()
                + (after_name.len() - after_name.trim_start().len())
                + 1;
            let closer = format!("x-slot:{name}");
            let block = Block {
                stops: &[],
                tag: Some(&closer),
                opener: "slot tag",
                line: lineno,
            };
            let (body, _) = ok!(self.parse_nodes(&block));
            return Ok(Node::Slot { name, body, lineno });
        }
        // <x-slot name="...">...</x-slot>
        self.pos = start + "<x-slot".len();
        let (attrs, self_closing) = ok!(self.parse_attrs(start));
        let name = attrs.iter().find_map(|attr| {
            if attr.name == "name" {
                match &attr.value {
                    AttrValue::Static(value) => Some(value.clone()),
                    _ => None,
                }
            } else {
                None
            }
        });
        let name = match name {
            Some(name) => name,
            None => {
                return Err(
                    self.syntax_error(start, "<x-slot> requires a name attribute".to_string())
                );
            }
        };
        let body = if self_closing {
            Vec::new()
        } else {
            let block = Block {
                stops: &[],
                tag: Some("x-slot"),
                opener: "slot tag",
                line: lineno,
            };
            let (body, _) = ok!(self.parse_nodes(&block));
            body
        };
        Ok(Node::Slot { name, body, lineno })
    }

    /// Parses component attributes up to `>` or `/>`.
    fn parse_attrs(&mut self, tag_start: usize) -> Result<(Vec<Attr>, bool), Error> {
        let mut attrs = Vec::new();
        loop {
            let rest = self.rest().trim_start();
            self.pos = self.source.len() - rest.len();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok((attrs, true));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok((attrs, false));
            }
            if rest.is_empty() {
                return Err(self.syntax_error(tag_start, "unclosed component tag".to_string()));
            }
            let dynamic = rest.starts_with(':');
            let name_start = usize::from(dynamic);
            let name: String = rest[name_start..]
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
                .map(|b| b as char)
                .collect();
            if name.is_empty() {
                return Err(self.syntax_error(
                    tag_start,
                    "malformed attribute in component tag".to_string(),
                ));
            }
            self.pos += name_start + name.len();
            let after = self.rest().trim_start();
            if let Some(after_eq) = after.strip_prefix('=') {
                let after_eq = after_eq.trim_start();
                let quote = match after_eq.as_bytes().first() {
                    Some(b'"') => '"',
                    Some(b'\'') => '\'',
                    _ => {
                        return Err(self.syntax_error(
                            tag_start,
                            format!("attribute {name} must use a quoted value"),
                        ));
                    }
                };
                let value_end = match after_eq[1..].find(quote) {
                    Some(idx) => idx,
                    None => {
                        return Err(self.syntax_error(
                            tag_start,
                            format!("unterminated value for attribute {name}"),
                        ));
                    }
                };
                let value = after_eq[1..1 + value_end].to_string();
                self.pos = self.source.len() - after_eq.len() + 1 + value_end + 1;
                attrs.push(Attr {
                    name,
                    value: if dynamic {
                        AttrValue::Dynamic(value)
                    } else {
                        AttrValue::Static(value)
                    },
                });
            } else if dynamic {
                return Err(self.syntax_error(
                    tag_start,
                    format!("dynamic attribute :{name} requires a value"),
                ));
            } else {
                attrs.push(Attr {
                    name,
                    value: AttrValue::Flag,
                });
            }
        }
    }

    fn parse_block(
        &mut self,
        stops: &[&str],
        tag: Option<&str>,
        opener: &'static str,
        line: usize,
    ) -> Result<(Vec<Node>, EndToken), Error> {
        let block = Block {
            stops,
            tag,
            opener,
            line,
        };
        self.parse_nodes(&block)
    }

    fn at_parens(&self) -> bool {
        self.rest().trim_start().starts_with('(')
    }

    /// Consumes `( ... )` with balanced nesting, skipping over quoted
    /// strings, and returns the inner text.
    fn parse_parens(&mut self, start: usize) -> Result<String, Error> {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        let rest = &rest[skipped..];
        if !rest.starts_with('(') {
            return Err(self.syntax_error(start, "expected ( after directive".to_string()));
        }
        let bytes = rest.as_bytes();
        let mut depth = 0usize;
        let mut quote = 0u8;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if quote != 0 {
                if b == b'\\' {
                    i += 1;
                } else if b == quote {
                    quote = 0;
                }
            } else {
                match b {
                    b'\'' | b'"' => quote = b,
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            self.pos += skipped + i + 1;
                            return Ok(rest[1..i].trim().to_string());
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Err(self.syntax_error(start, "unbalanced parentheses in directive".to_string()))
    }

    fn parse_props(
        &self,
        args: &str,
        start: usize,
    ) -> Result<Vec<(String, Option<String>)>, Error> {
        let inner = args.trim();
        let inner = match inner.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(inner) => inner,
            None => {
                return Err(self.syntax_error(start, "@props expects a [...] list".to_string()));
            }
        };
        let mut pairs = Vec::new();
        for item in split_top_level(inner, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match find_top_level(item, "=>") {
                Some(idx) => pairs.push((
                    unquote(&item[..idx]),
                    Some(item[idx + 2..].trim().to_string()),
                )),
                None => pairs.push((unquote(item), None)),
            }
        }
        Ok(pairs)
    }
}

fn block_opener_offset(source: &str, block: &Block<'_>) -> usize {
    // best effort: point the error at the opener's line
    let mut line = 1;
    for (offset, b) in source.bytes().enumerate() {
        if line >= block.line {
            return offset;
        }
        if b == b'\n' {
            line += 1;
        }
    }
    source.len()
}

/// Finds `needle` in `haystack` before the next newline.
fn find_on_line(haystack: &str, needle: &str) -> Option<usize> {
    let limit = haystack.find('\n').unwrap_or(haystack.len());
    haystack[..limit].find(needle)
}

fn ident_after(s: &str) -> &str {
    let end = s
        .bytes()
        .position(|b| !b.is_ascii_alphanumeric() && b != b'_')
        .unwrap_or(s.len());
    &s[..end]
}

/// Reads a tag name such as `x-card.header` or `x-slot:title`.
fn tag_ident(s: &str) -> &str {
    let end = s
        .bytes()
        .position(|b| {
            !b.is_ascii_alphanumeric() && b != b'-' && b != b'.' && b != b':' && b != b'_'
        })
        .unwrap_or(s.len());
    &s[..end]
}

/// Strips one pair of matching quotes if present.
fn unquote(s: &str) -> String {
    let s = s.trim();
    let bytes = s.as_bytes();
    if s.len() >= 2 {
        let first = bytes[0];
        if (first == b'\'' || first == b'"') && bytes[s.len() - 1] == first {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

/// Splits on `sep` at paren/bracket/brace depth zero, outside quotes.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = 0u8;
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if quote != 0 {
            if b == b'\\' {
                i += 1;
            } else if b == quote {
                quote = 0;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = b,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if depth == 0 && b == sep as u8 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

/// Finds the first occurrence of `needle` at depth zero, outside quotes.
fn find_top_level(s: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = 0u8;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if quote != 0 {
            if b == b'\\' {
                i += 1;
            } else if b == quote {
                quote = 0;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = b,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if depth == 0 && s[i..].starts_with(needle) => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Node> {
        parse(source, "test.html", &BTreeSet::new()).unwrap()
    }

    #[test]
    fn test_plain_text_and_interp() {
        let nodes = parse_ok("Hello {{ name }}!");
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "Hello "));
        assert!(matches!(&nodes[1], Node::Interp { expr, raw: false, .. } if expr == "name"));
        assert!(matches!(&nodes[2], Node::Text(t) if t == "!"));
    }

    #[test]
    fn test_raw_interp() {
        let nodes = parse_ok("{!! html !!}");
        assert!(matches!(&nodes[0], Node::Interp { expr, raw: true, .. } if expr == "html"));
    }

    #[test]
    fn test_comment_hides_directives() {
        // the text around a comment coalesces into one run
        let nodes = parse_ok("a{{-- @if(x) {{ y }} --}}b");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "ab"));
    }

    #[test]
    fn test_email_stays_literal() {
        let nodes = parse_ok("mail me at user@example.com");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "mail me at user@example.com"));
    }

    #[test]
    fn test_nested_if() {
        let nodes = parse_ok("@if(a)@if(b)x@endif@endif");
        let Node::If { arms, .. } = &nodes[0] else {
            panic!("expected if");
        };
        assert_eq!(arms.len(), 1);
        assert!(matches!(&arms[0].body[0], Node::If { .. }));
    }

    #[test]
    fn test_if_elseif_else() {
        let nodes = parse_ok("@if(a)1@elseif(b)2@else 3@endif");
        let Node::If {
            arms, else_body, ..
        } = &nodes[0]
        else {
            panic!("expected if");
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[0].condition, "a");
        assert_eq!(arms[1].condition, "b");
        assert!(else_body.is_some());
    }

    #[test]
    fn test_stray_endforeach_inside_if_fails() {
        let err = parse("@if(a)@endforeach@endif", "t.html", &BTreeSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTemplate);
    }

    #[test]
    fn test_unclosed_foreach_fails() {
        let err = parse("@foreach(x in items)body", "t.html", &BTreeSet::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTemplate);
    }

    #[test]
    fn test_foreach_bindings() {
        let nodes = parse_ok("@foreach(key, value in items){{ key }}@endforeach");
        let Node::Loop {
            bindings, iterable, ..
        } = &nodes[0]
        else {
            panic!("expected loop");
        };
        assert_eq!(bindings, &["key", "value"]);
        assert_eq!(iterable, "items");
    }

    #[test]
    fn test_switch() {
        let nodes = parse_ok("@switch(x)@case(1)one@break@case(2)two@default other@endswitch");
        let Node::Switch { cases, default, .. } = &nodes[0] else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(!cases[0].body.iter().any(|n| matches!(n, Node::Break { .. })));
        assert!(default.is_some());
    }

    #[test]
    fn test_section_forms() {
        let nodes = parse_ok("@section('title', 'Home')@section('body')text@endsection");
        assert!(
            matches!(&nodes[0], Node::Section { name, inline: Some(v), .. } if name == "title" && v == "Home")
        );
        assert!(matches!(&nodes[1], Node::Section { name, inline: None, .. } if name == "body"));
    }

    #[test]
    fn test_yield_with_default() {
        let nodes = parse_ok("@yield('title', 'Untitled')");
        assert!(
            matches!(&nodes[0], Node::Yield { name, default: Some(d), .. } if name == "title" && d == "Untitled")
        );
    }

    #[test]
    fn test_component_attrs_and_slot() {
        let nodes =
            parse_ok(r#"<x-alert type="error" :message="msg" dismissible><x-slot:title>Hi</x-slot:title>body</x-alert>"#);
        let Node::Component {
            name, attrs, body, ..
        } = &nodes[0]
        else {
            panic!("expected component");
        };
        assert_eq!(name, "alert");
        assert_eq!(attrs.len(), 3);
        assert!(matches!(&attrs[0].value, AttrValue::Static(v) if v == "error"));
        assert!(matches!(&attrs[1].value, AttrValue::Dynamic(v) if v == "msg"));
        assert!(matches!(&attrs[2].value, AttrValue::Flag));
        assert!(matches!(&body[0], Node::Slot { name, .. } if name == "title"));
    }

    #[test]
    fn test_self_closing_component() {
        let nodes = parse_ok(r#"<x-icon name="star" />"#);
        assert!(matches!(&nodes[0], Node::Component { name, body, .. } if name == "icon" && body.is_empty()));
    }

    #[test]
    fn test_plain_html_untouched() {
        let nodes = parse_ok("<div class=\"x\">text</div>");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "<div class=\"x\">text</div>"));
    }

    #[test]
    fn test_props_pairs() {
        let nodes = parse_ok("@props(['type' => 'info', 'message'])");
        let Node::Props { pairs, .. } = &nodes[0] else {
            panic!("expected props");
        };
        assert_eq!(pairs[0], ("type".to_string(), Some("'info'".to_string())));
        assert_eq!(pairs[1], ("message".to_string(), None));
    }

    #[test]
    fn test_custom_directive() {
        let custom: BTreeSet<String> = ["datetime".to_string()].into_iter().collect();
        let nodes = parse("@datetime(now)", "t.html", &custom).unwrap();
        assert!(matches!(&nodes[0], Node::Custom { name, args, .. } if name == "datetime" && args == "now"));
        // without registration the same text is literal
        let nodes = parse("@datetime(now)", "t.html", &BTreeSet::new()).unwrap();
        assert!(matches!(&nodes[0], Node::Text(t) if t == "@datetime(now)"));
    }

    #[test]
    fn test_push_stack() {
        let nodes = parse_ok("@push('scripts')<script></script>@endpush@stack('scripts')");
        assert!(matches!(&nodes[0], Node::Push { name, .. } if name == "scripts"));
        assert!(matches!(&nodes[1], Node::StackSlot { name, .. } if name == "scripts"));
    }

    #[test]
    fn test_unclosed_interp_is_literal() {
        let nodes = parse_ok("a {{ b\nc");
        // no same-line closer, so everything stays text
        assert!(nodes.iter().all(|n| matches!(n, Node::Text(_))));
    }
}
