use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use memo_map::MemoMap;
use serde::Serialize;

use crate::cache::{cache_key, fingerprint, CacheStats, FingerprintCache, ModMarker, RenderCache};
use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::FunctionTable;
use crate::loader::Loader;
use crate::nodes::Node;
use crate::parser;
use crate::pipeline::{self, RenderCx};
use crate::value::{Value, ValueMap};

/// The callback type behind a registered directive.
///
/// It receives the evaluated directive arguments and returns replacement
/// text which is spliced into the template verbatim.
pub type DirectiveFn = dyn Fn(&[Value]) -> Result<String, Error> + Send + Sync;

/// Render limits and behavior switches.
#[derive(Debug, Clone)]
struct Settings {
    max_loop_iterations: usize,
    max_recursion_depth: usize,
    max_template_size: usize,
    strict: bool,
    track_modified: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            max_loop_iterations: 10_000,
            max_recursion_depth: 50,
            max_template_size: 10_000_000,
            strict: false,
            track_modified: true,
        }
    }
}

/// The central template engine.
///
/// Holds the loader, registered templates, functions, globals, custom
/// directives, an optional render cache and the render limits.  An
/// engine is cheap to share behind an `Arc` once configured; renders
/// take `&self`.
///
/// # Example
///
/// ```
/// use miniblade::{context, Engine};
///
/// let mut engine = Engine::new();
/// engine.add_template("hello", "Hello {{ name }}!");
/// let rv = engine.render("hello", context! { name => "World" }).unwrap();
/// assert_eq!(rv, "Hello World!");
/// ```
pub struct Engine {
    loader: Option<Box<dyn Loader>>,
    templates: BTreeMap<String, String>,
    functions: Arc<FunctionTable>,
    globals: ValueMap,
    directives: BTreeMap<String, Box<DirectiveFn>>,
    directive_names: BTreeSet<String>,
    /// Parse results keyed by directive generation and source fingerprint.
    parsed: MemoMap<String, Arc<Vec<Node>>>,
    /// Bumped when the directive set changes so stale parses are ignored.
    generation: u64,
    fingerprints: FingerprintCache,
    cache: Option<Box<dyn RenderCache>>,
    settings: Settings,
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("templates", &self.templates.keys())
            .field("globals", &self.globals)
            .field("directives", &self.directive_names)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Engine {
    /// Creates a new engine with the builtin functions and no loader.
    pub fn new() -> Engine {
        Engine {
            loader: None,
            templates: BTreeMap::new(),
            functions: Arc::new(crate::defaults::builtin_functions()),
            globals: ValueMap::new(),
            directives: BTreeMap::new(),
            directive_names: BTreeSet::new(),
            parsed: MemoMap::new(),
            generation: 0,
            fingerprints: FingerprintCache::default(),
            cache: None,
            settings: Settings::default(),
        }
    }

    /// Sets the loader used to resolve template names.
    ///
    /// Templates registered with [`add_template`](Self::add_template)
    /// shadow the loader.
    pub fn set_loader<L: Loader + 'static>(&mut self, loader: L) {
        self.loader = Some(Box::new(loader));
    }

    /// Registers an in-memory template under a name.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    /// Removes an in-memory template again.
    pub fn remove_template(&mut self, name: &str) {
        self.templates.remove(name);
    }

    /// Registers a function callable from template expressions.
    pub fn add_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.functions)
            .insert(name.to_string(), Value::from_function(name.to_string(), f));
    }

    /// Adds a global variable visible to every render.
    ///
    /// Context data passed to [`render`](Self::render) shadows globals of
    /// the same name.
    pub fn add_global<V: Serialize>(&mut self, name: impl Into<String>, value: V) {
        self.globals.insert(name.into(), Value::from_serializable(&value));
    }

    /// Registers a custom directive.
    ///
    /// The name must be alphanumeric (underscores allowed, but not as the
    /// first character).  `@name(args)` in templates then expands to the
    /// text the callback returns.
    pub fn register_directive<F>(&mut self, name: &str, f: F) -> Result<(), Error>
    where
        F: Fn(&[Value]) -> Result<String, Error> + Send + Sync + 'static,
    {
        let valid = !name.is_empty()
            && !name.starts_with('_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::new(
                ErrorKind::InvalidArguments,
                format!("invalid directive name {name:?}"),
            ));
        }
        self.directives.insert(name.to_string(), Box::new(f));
        self.directive_names.insert(name.to_string());
        // existing parses no longer see this name as a literal
        self.generation += 1;
        Ok(())
    }

    /// Enables or disables strict mode.
    ///
    /// In strict mode undefined variables in expressions fail the render
    /// instead of evaluating to undefined.
    pub fn set_strict(&mut self, yes: bool) {
        self.settings.strict = yes;
    }

    /// Sets the per-loop iteration cap.
    pub fn set_max_loop_iterations(&mut self, limit: usize) {
        self.settings.max_loop_iterations = limit;
    }

    /// Sets the include/component/layout nesting cap.
    pub fn set_max_recursion_depth(&mut self, limit: usize) {
        self.settings.max_recursion_depth = limit;
    }

    /// Sets the maximum template size in bytes.
    pub fn set_max_template_size(&mut self, limit: usize) {
        self.settings.max_template_size = limit;
    }

    /// Controls whether file modification times participate in render
    /// cache validation.  Enabled by default.
    pub fn set_track_modified(&mut self, yes: bool) {
        self.settings.track_modified = yes;
    }

    /// Installs a render cache backend.
    pub fn set_cache<C: RenderCache + 'static>(&mut self, cache: C) {
        self.cache = Some(Box::new(cache));
    }

    /// Returns the cache statistics, if a cache is installed.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Drops all cached render outputs.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Drops every cached output of one template, for all contexts.
    ///
    /// The fingerprint is computed from the template's current source, so
    /// this clears entries rendered from that source.  Entries rendered
    /// from an older source already miss through their modification
    /// marker.
    pub fn invalidate_template(&self, name: &str) -> Result<(), Error> {
        if let Some(ref cache) = self.cache {
            let (source, _) = ok!(self.get_source(name));
            cache.invalidate(&self.fingerprints.of(&source));
        }
        Ok(())
    }

    /// Renders a template by name with the given context.
    ///
    /// The context must serialize to a map; its entries become the base
    /// scope of the render, on top of the engine globals.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, Error> {
        let base = ok!(self.base_scope(ctx));
        let (source, modified) = ok!(self.get_source(name));

        let cached = self.cache.as_ref().and_then(|cache| {
            let key = some!(self.render_cache_key(&source, &base, name));
            let marker = self.marker_for(modified);
            Some((cache, key, marker))
        });
        if let Some((cache, ref key, marker)) = cached {
            if let Some(hit) = cache.get(key, marker) {
                return Ok(hit);
            }
        }

        let output = ok!(self.render_source(&source, name, base));

        if let Some((cache, ref key, marker)) = cached {
            cache.put(key, &output, marker);
        }
        Ok(output)
    }

    /// Renders a template given as a string.  One-off renders like this
    /// never touch the render cache.
    pub fn render_str<S: Serialize>(&self, source: &str, ctx: S) -> Result<String, Error> {
        let base = ok!(self.base_scope(ctx));
        ok!(self.check_size(source, "<string>"));
        self.render_source(source, "<string>", base)
    }

    fn render_source(&self, source: &str, name: &str, base: ValueMap) -> Result<String, Error> {
        let tree = ok!(self.parse_cached(source, name));
        let mut scope = Context::new(base);
        let mut cx = RenderCx::new(self, name);
        pipeline::render_tree(&mut cx, &mut scope, tree.as_ref().clone(), name)
    }

    fn base_scope<S: Serialize>(&self, ctx: S) -> Result<ValueMap, Error> {
        let mut base = self.globals.clone();
        let root = Value::from_serializable(&ctx);
        if let Some(map) = root.as_map() {
            for (key, value) in map {
                base.insert(key.clone(), value.clone());
            }
        } else if !root.is_undefined() && !root.is_none() {
            return Err(Error::new(
                ErrorKind::BadSerialization,
                "render context must serialize to a map",
            ));
        }
        Ok(base)
    }

    /// The render cache key covers the template source, the full base
    /// scope, and the template name as a namespace.  A scope that does not
    /// serialize to JSON disables caching for that render.
    fn render_cache_key(&self, source: &str, base: &ValueMap, name: &str) -> Option<String> {
        let context_json = serde_json::to_string(&Value::from(base.clone())).ok()?;
        Some(cache_key(
            &self.fingerprints.of(source),
            &fingerprint(context_json.as_bytes()),
            name,
        ))
    }

    fn marker_for(&self, modified: Option<SystemTime>) -> ModMarker {
        if !self.settings.track_modified {
            return None;
        }
        modified
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|age| age.as_millis() as u64)
    }

    fn get_source(&self, name: &str) -> Result<(String, Option<SystemTime>), Error> {
        if let Some(source) = self.templates.get(name) {
            ok!(self.check_size(source, name));
            return Ok((source.clone(), None));
        }
        if let Some(ref loader) = self.loader {
            if let Some(loaded) = ok!(loader.load(name)) {
                ok!(self.check_size(&loaded.source, name));
                return Ok((loaded.source, loaded.modified));
            }
        }
        Err(Error::new_not_found(name))
    }

    fn check_size(&self, source: &str, name: &str) -> Result<(), Error> {
        if source.len() > self.settings.max_template_size {
            Err(Error::new(
                ErrorKind::TemplateTooLarge,
                format!(
                    "template is {} bytes, limit is {}",
                    source.len(),
                    self.settings.max_template_size
                ),
            )
            .at(name, 0))
        } else {
            Ok(())
        }
    }

    fn parse_cached(&self, source: &str, name: &str) -> Result<Arc<Vec<Node>>, Error> {
        let key = format!("{}:{}", self.generation, self.fingerprints.of(source));
        self.parsed
            .get_or_try_insert(key.as_str(), || {
                parser::parse(source, name, &self.directive_names).map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub(crate) fn get_parsed(&self, name: &str) -> Result<Arc<Vec<Node>>, Error> {
        let (source, _) = ok!(self.get_source(name));
        self.parse_cached(&source, name)
    }

    pub(crate) fn get_component(&self, name: &str) -> Result<Arc<Vec<Node>>, Error> {
        let path = format!("components.{name}");
        self.get_parsed(&path).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                Error::new(
                    ErrorKind::ComponentNotFound,
                    format!("component {name:?} does not exist"),
                )
            } else {
                err
            }
        })
    }

    pub(crate) fn parse_str(&self, source: &str, name: &str) -> Result<Vec<Node>, Error> {
        parser::parse(source, name, &self.directive_names)
    }

    pub(crate) fn functions(&self) -> &Arc<FunctionTable> {
        &self.functions
    }

    pub(crate) fn directive(&self, name: &str) -> Option<&DirectiveFn> {
        self.directives.get(name).map(|f| &**f)
    }

    pub(crate) fn strict(&self) -> bool {
        self.settings.strict
    }

    pub(crate) fn max_loop_iterations(&self) -> usize {
        self.settings.max_loop_iterations
    }

    pub(crate) fn max_recursion_depth(&self) -> usize {
        self.settings.max_recursion_depth
    }
}
