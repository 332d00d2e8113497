use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, ErrorKind};

/// Extensions a template name may already carry.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".html", ".blade", ".tpl", ".txt"];

/// A template source together with its modification marker.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub source: String,
    pub modified: Option<SystemTime>,
}

impl LoadedSource {
    /// Wraps a plain string with no modification marker.
    pub fn from_source(source: impl Into<String>) -> LoadedSource {
        LoadedSource {
            source: source.into(),
            modified: None,
        }
    }
}

/// Trait for template loading backends.
///
/// `Ok(None)` signals that the template does not exist, which callers
/// turn into a [`TemplateNotFound`](ErrorKind::TemplateNotFound) error
/// naming the template.
pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<LoadedSource>, Error>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Option<String>, Error> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Option<LoadedSource>, Error> {
        Ok(ok!(self(name)).map(LoadedSource::from_source))
    }
}

/// Loads templates from a directory tree.
///
/// Names use dot notation the way view names commonly do (`pages.home`
/// resolves to `pages/home` plus the default extension), unless the name
/// already carries one of the known template extensions, in which case it
/// is taken as a relative path.  Absolute paths and any name that would
/// escape the root are rejected.
pub struct FsLoader {
    root: PathBuf,
    extension: String,
}

impl FsLoader {
    pub fn new(root: impl AsRef<Path>) -> FsLoader {
        FsLoader {
            root: root.as_ref().to_path_buf(),
            extension: ".html".to_string(),
        }
    }

    /// Overrides the default `.html` extension.
    pub fn with_extension(mut self, extension: &str) -> FsLoader {
        self.extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{extension}")
        };
        self
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        if name.is_empty() || name.contains('\0') {
            return Err(Error::new(
                ErrorKind::MalformedTemplate,
                format!("invalid template name {name:?}"),
            ));
        }
        if name.starts_with('/') || name.starts_with('\\') || Path::new(name).is_absolute() {
            return Err(Error::new(
                ErrorKind::SandboxViolation,
                format!("absolute template paths are not allowed: {name}"),
            ));
        }
        let relative = if TEMPLATE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            name.to_string()
        } else {
            format!("{}{}", name.replace('.', "/"), self.extension)
        };
        let path = Path::new(&relative);
        // dot conversion can turn `..` into a leading `//`, so root
        // components are rejected here as well
        if path.components().any(|part| {
            matches!(
                part,
                Component::ParentDir | Component::Prefix(_) | Component::RootDir
            )
        }) {
            return Err(Error::new(
                ErrorKind::SandboxViolation,
                format!("path traversal detected in template name: {name}"),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl Loader for FsLoader {
    fn load(&self, name: &str) -> Result<Option<LoadedSource>, Error> {
        let path = ok!(self.resolve(name));
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("could not read template {name:?}"),
                )
                .with_source(err));
            }
        };
        let modified = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
        Ok(Some(LoadedSource { source, modified }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_notation_resolution() {
        let loader = FsLoader::new("/views");
        assert_eq!(
            loader.resolve("pages.home").unwrap(),
            PathBuf::from("/views/pages/home.html")
        );
        assert_eq!(
            loader.resolve("layout.blade").unwrap(),
            PathBuf::from("/views/layout.blade")
        );
    }

    #[test]
    fn test_rejects_escapes() {
        let loader = FsLoader::new("/views");
        assert_eq!(
            loader.resolve("/etc/passwd").unwrap_err().kind(),
            ErrorKind::SandboxViolation
        );
        assert_eq!(
            loader.resolve("../secrets.html").unwrap_err().kind(),
            ErrorKind::SandboxViolation
        );
        // `..` without a known extension turns into a rooted path after
        // dot conversion and must still be rejected
        assert_eq!(
            loader.resolve("../etc/passwd").unwrap_err().kind(),
            ErrorKind::SandboxViolation
        );
    }

    #[test]
    fn test_custom_extension() {
        let loader = FsLoader::new("/views").with_extension("tpl");
        assert_eq!(
            loader.resolve("emails.welcome").unwrap(),
            PathBuf::from("/views/emails/welcome.tpl")
        );
    }
}
