//! The directive tree produced by the template parser.
//!
//! This is a closed set of node kinds.  The parser only ever emits these,
//! and the pipeline resolvers match on them exhaustively, so adding a new
//! directive means touching both ends on purpose.

/// Loop directives share one node shape; the keyword only matters for
/// matching the right closer and for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStyle {
    Foreach,
    For,
}

impl LoopStyle {
    pub fn keyword(self) -> &'static str {
        match self {
            LoopStyle::Foreach => "foreach",
            LoopStyle::For => "for",
        }
    }
}

/// One `@if`/`@elseif` arm with its guard expression.
#[derive(Debug, Clone)]
pub struct IfArm {
    pub condition: String,
    pub body: Vec<Node>,
}

/// One `@case` arm of a `@switch`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: String,
    pub body: Vec<Node>,
}

/// An attribute on a tag-style component.
#[derive(Debug, Clone)]
pub enum AttrValue {
    /// `title="literal text"`
    Static(String),
    /// `:title="expression"` evaluated against the caller scope.
    Dynamic(String),
    /// bare attribute such as `disabled`
    Flag,
}

#[derive(Debug, Clone)]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Literal template text, emitted verbatim.
    Text(String),
    /// `{{ expr }}` or, with `raw` set, `{!! expr !!}`.
    Interp {
        expr: String,
        raw: bool,
        lineno: usize,
    },
    Extends {
        name: String,
        lineno: usize,
    },
    Section {
        name: String,
        /// Set for the inline form `@section('name', 'value')`.
        inline: Option<String>,
        body: Vec<Node>,
        lineno: usize,
    },
    Yield {
        name: String,
        default: Option<String>,
        lineno: usize,
    },
    Include {
        name: String,
        /// Extra data expression from `@include('name', [...])`.
        data: Option<String>,
        lineno: usize,
    },
    IncludeIf {
        name: String,
        condition: String,
        lineno: usize,
    },
    If {
        arms: Vec<IfArm>,
        else_body: Option<Vec<Node>>,
        lineno: usize,
    },
    Unless {
        condition: String,
        body: Vec<Node>,
        lineno: usize,
    },
    Isset {
        target: String,
        body: Vec<Node>,
        lineno: usize,
    },
    EmptyCheck {
        target: String,
        body: Vec<Node>,
        lineno: usize,
    },
    Switch {
        subject: String,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Node>>,
        lineno: usize,
    },
    Loop {
        style: LoopStyle,
        /// One name, or several for paired iteration (`k, v in items`).
        bindings: Vec<String>,
        iterable: String,
        body: Vec<Node>,
        lineno: usize,
    },
    While {
        condition: String,
        body: Vec<Node>,
        lineno: usize,
    },
    Break {
        lineno: usize,
    },
    Continue {
        lineno: usize,
    },
    Push {
        name: String,
        body: Vec<Node>,
        lineno: usize,
    },
    Prepend {
        name: String,
        body: Vec<Node>,
        lineno: usize,
    },
    StackSlot {
        name: String,
        lineno: usize,
    },
    /// `@props([...])` inside a component template.
    Props {
        pairs: Vec<(String, Option<String>)>,
        lineno: usize,
    },
    /// Tag-style component invocation `<x-name ...>...</x-name>`.
    Component {
        name: String,
        attrs: Vec<Attr>,
        body: Vec<Node>,
        lineno: usize,
    },
    /// `<x-slot:name>` / `<x-slot name="...">` inside a component body.
    Slot {
        name: String,
        body: Vec<Node>,
        lineno: usize,
    },
    /// `@component('name') ... @endcomponent`.
    LegacyComponent {
        name: String,
        body: Vec<Node>,
        lineno: usize,
    },
    /// A host registered directive, expanded by callback.
    Custom {
        name: String,
        args: String,
        lineno: usize,
    },
}
