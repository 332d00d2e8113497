//! <div align=center>
//!   <p><strong>miniblade: a Blade-syntax template engine for Rust</strong></p>
//! </div>
//!
//! miniblade renders templates written in a Blade-style syntax: `{{ expr }}`
//! interpolation, `@`-prefixed directives for control flow, layout
//! inheritance with sections, partial includes, components with slots and
//! props, and stacks.  Expressions run in a sandbox that can only reach
//! the data and functions the host hands in.
//!
//! # Simple usage
//!
//! ```
//! use miniblade::{context, Engine};
//!
//! let mut engine = Engine::new();
//! engine.add_template("hello", "Hello {{ name }}!");
//! let rv = engine.render("hello", context! { name => "World" }).unwrap();
//! assert_eq!(rv, "Hello World!");
//! ```
//!
//! # Loading from disk
//!
//! Templates are usually resolved through a loader.  [`FsLoader`] maps
//! dotted names onto files below a root directory:
//!
//! ```no_run
//! use miniblade::{context, Engine, FsLoader};
//!
//! let mut engine = Engine::new();
//! engine.set_loader(FsLoader::new("templates"));
//! // renders templates/emails/welcome.html
//! let rv = engine.render("emails.welcome", context! { user => "Joe" });
//! ```
//!
//! # Templates
//!
//! The supported directives in short:
//!
//! * `{{ expr }}` escaped output, `{!! expr !!}` raw output
//! * `@if` / `@elseif` / `@else` / `@endif`, `@unless`, `@isset`, `@empty`
//! * `@switch` / `@case` / `@default` / `@endswitch`
//! * `@foreach` / `@for` / `@while` with `@break` and `@continue`
//! * `@extends`, `@section` / `@endsection`, `@yield`
//! * `@include`, `@includeIf`
//! * `<x-name attr="..">` components with `<x-slot:name>` and `@props`
//! * `@push` / `@prepend` / `@stack`
//! * `{{-- comments --}}`
//!
//! # Caching
//!
//! Rendered output can be cached keyed by the template source and the
//! render context.  Install a [`MemoryCache`] or [`DiskCache`] via
//! [`Engine::set_cache`]; entries are validated against the template
//! file's modification time, so editing a template invalidates its
//! cached renders.
#[macro_use]
mod macros;

mod context;
mod defaults;
mod engine;
mod error;
mod expr;
mod loader;
mod nodes;
mod parser;
mod pipeline;
mod utils;

pub mod cache;
pub mod value;

pub use self::cache::{CacheStats, DiskCache, MemoryCache, RenderCache};
pub use self::engine::{DirectiveFn, Engine};
pub use self::error::{Error, ErrorKind};
pub use self::loader::{FsLoader, LoadedSource, Loader};
pub use self::value::Value;
