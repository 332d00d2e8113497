use std::borrow::Cow;
use std::fmt;

/// Represents template errors.
///
/// Errors carry a [`kind`](Self::kind), an optional human readable detail,
/// and where known the name of the template and the line on which the
/// problem was encountered.
///
/// # Example
///
/// Here is an example of how you might want to render errors:
///
/// ```rust
/// # let mut engine = miniblade::Engine::new();
/// # let ctx = miniblade::context!{};
/// match engine.render_str("Hello {{ name }}!", ctx) {
///     Ok(result) => println!("{}", result),
///     Err(err) => {
///         eprintln!("Could not render template:");
///         eprintln!("  {:#}", err);
///     }
/// }
/// ```
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: usize,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .field("name", &self.name)
            .field("lineno", &self.lineno)
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A directive block was unbalanced or otherwise unparsable.
    MalformedTemplate,
    /// An expression used a construct or name the sandbox forbids.
    ///
    /// This is never recovered from and should be treated as a potential
    /// security event by the host.
    SandboxViolation,
    /// A variable was undefined while strict mode was enabled.
    UndefinedVariable,
    /// A template could not be resolved by the loader.
    TemplateNotFound,
    /// A template transitively extends itself.
    TemplateRecursion,
    /// Include/component/layout nesting exceeded the configured depth.
    RecursionLimitExceeded,
    /// A loop ran past the configured iteration cap.
    LoopLimitExceeded,
    /// A template exceeded the configured maximum size in bytes.
    TemplateTooLarge,
    /// A component name did not resolve to a component template.
    ComponentNotFound,
    /// A component name failed validation.
    InvalidComponentName,
    /// An operation (arithmetic, indexing, iteration) was not possible.
    InvalidOperation,
    /// A function or directive was called with invalid arguments.
    InvalidArguments,
    /// Context data could not be serialized into engine values.
    BadSerialization,
    /// A cache backend failed to read or write an entry.
    CacheError,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::MalformedTemplate => "malformed template",
            ErrorKind::SandboxViolation => "sandbox violation",
            ErrorKind::UndefinedVariable => "undefined variable",
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::TemplateRecursion => "template recursion detected",
            ErrorKind::RecursionLimitExceeded => "recursion limit exceeded",
            ErrorKind::LoopLimitExceeded => "loop iteration limit exceeded",
            ErrorKind::TemplateTooLarge => "template too large",
            ErrorKind::ComponentNotFound => "component not found",
            ErrorKind::InvalidComponentName => "invalid component name",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::InvalidArguments => "invalid arguments",
            ErrorKind::BadSerialization => "could not serialize to internal format",
            ErrorKind::CacheError => "cache backend error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            write!(f, "{}: {}", self.kind, detail)?;
        } else {
            write!(f, "{}", self.kind)?;
        }
        if let Some(ref filename) = self.name {
            write!(f, " (in {}:{})", filename, self.lineno)?;
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: Some(detail.into()),
            name: None,
            lineno: 0,
            source: None,
        }
    }

    pub(crate) fn new_not_found(name: &str) -> Error {
        Error::new(
            ErrorKind::TemplateNotFound,
            format!("template {name:?} does not exist"),
        )
    }

    pub(crate) fn set_location(&mut self, filename: &str, lineno: usize) {
        if self.name.is_none() {
            self.name = Some(filename.into());
            self.lineno = lineno;
        }
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detail message if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the name of the template that failed.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the line the error occurred on.
    pub fn line(&self) -> Option<usize> {
        if self.lineno > 0 {
            Some(self.lineno)
        } else {
            None
        }
    }

    /// Tags an error with the template name and line it surfaced from.
    #[must_use]
    pub(crate) fn at(mut self, filename: &str, lineno: usize) -> Error {
        self.set_location(filename, lineno);
        self
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            name: None,
            lineno: 0,
            source: None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::InvalidOperation, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}
