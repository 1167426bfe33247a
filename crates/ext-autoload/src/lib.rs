//! Class-to-file autoloader for the extension registry
//!
//! Resolves a fully-qualified class name to a source file using, in order:
//!
//! 1. the install-local class map (classes shipped with the host itself),
//! 2. the class map registered by extensions,
//! 3. the environment override map,
//! 4. a PSR-4 style namespace search: the class's namespace is stripped one
//!    segment at a time and every registered prefix is probed for
//!    `<dir>/<relative class path>.php` through the [`Filesystem`] seam.
//!
//! A miss is not an error: [`Autoloader::find`] returns `None` so the next
//! loader in a chain can try. Only [`Autoloader::require_class`] escalates a
//! miss into [`Error::ClassNotFound`].
//!
//! Both maps use "add if absent" registration: the first registration of a
//! class or namespace prefix wins.

mod error;

use std::collections::HashMap;
use std::sync::Arc;

use ext_fs::{Filesystem, NormalizedPath};
use indexmap::{IndexMap, IndexSet};

pub use error::{Error, Result};

/// Namespace separator in class names.
pub const NAMESPACE_SEPARATOR: char = '\\';

/// File extension appended to PSR-4 relative class paths.
pub const SOURCE_EXTENSION: &str = "php";

/// Resolver from class names to source files.
#[derive(Debug)]
pub struct Autoloader {
    fs: Arc<dyn Filesystem>,
    install_root: NormalizedPath,
    local_classes: IndexMap<String, NormalizedPath>,
    classes: IndexMap<String, NormalizedPath>,
    override_classes: IndexMap<String, NormalizedPath>,
    /// Prefix (always ending in `\`) to directory.
    namespaces: IndexMap<String, NormalizedPath>,
    /// Classes already autoloaded, with the file they came from.
    loaded: HashMap<String, NormalizedPath>,
    /// Files already required, in load order.
    required: IndexSet<NormalizedPath>,
}

impl Autoloader {
    /// Create an autoloader that makes relative results absolute against
    /// `install_root`.
    pub fn new(fs: Arc<dyn Filesystem>, install_root: impl Into<NormalizedPath>) -> Self {
        Self {
            fs,
            install_root: install_root.into(),
            local_classes: IndexMap::new(),
            classes: IndexMap::new(),
            override_classes: IndexMap::new(),
            namespaces: IndexMap::new(),
            loaded: HashMap::new(),
            required: IndexSet::new(),
        }
    }

    /// Install-specific class map, consulted before anything else.
    pub fn with_local_classes<I, K, V>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NormalizedPath>,
    {
        self.local_classes = classes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Environment override map, consulted after the registered class map.
    pub fn with_override_classes<I, K, V>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NormalizedPath>,
    {
        self.override_classes = classes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn install_root(&self) -> &NormalizedPath {
        &self.install_root
    }

    /// Register class → file entries. Existing entries are kept.
    pub fn register_classes<I, K, V>(&mut self, classes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NormalizedPath>,
    {
        let before = self.classes.len();
        for (class, file) in classes {
            self.classes.entry(class.into()).or_insert_with(|| file.into());
        }
        tracing::debug!(added = self.classes.len() - before, "Registered autoload classes");
    }

    /// Register namespace prefix → directory entries. Existing prefixes are kept.
    ///
    /// Prefixes are stored with a trailing `\` whether or not the caller
    /// supplied one.
    pub fn register_namespaces<I, K, V>(&mut self, namespaces: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NormalizedPath>,
    {
        let before = self.namespaces.len();
        for (prefix, dir) in namespaces {
            let mut prefix = prefix.into();
            if !prefix.ends_with(NAMESPACE_SEPARATOR) {
                prefix.push(NAMESPACE_SEPARATOR);
            }
            self.namespaces.entry(prefix).or_insert_with(|| dir.into());
        }
        tracing::debug!(
            added = self.namespaces.len() - before,
            "Registered autoload namespaces"
        );
    }

    /// Registered class map.
    pub fn classes(&self) -> &IndexMap<String, NormalizedPath> {
        &self.classes
    }

    /// Registered namespace map.
    pub fn namespaces(&self) -> &IndexMap<String, NormalizedPath> {
        &self.namespaces
    }

    /// Resolve `class` to an absolute file path, or `None` on a miss.
    pub fn find(&self, class: &str) -> Option<NormalizedPath> {
        let class = class.trim_start_matches(NAMESPACE_SEPARATOR);
        let file = self
            .local_classes
            .get(class)
            .or_else(|| self.classes.get(class))
            .or_else(|| self.override_classes.get(class))
            .cloned()
            .or_else(|| self.find_in_namespaces(class));

        match file {
            Some(file) => Some(file.absolutize(&self.install_root)),
            None => {
                tracing::trace!(class, "Autoload miss");
                None
            }
        }
    }

    fn find_in_namespaces(&self, class: &str) -> Option<NormalizedPath> {
        if !class.contains(NAMESPACE_SEPARATOR) {
            return None;
        }
        let mut end = class.len();
        while let Some(pos) = class[..end].rfind(NAMESPACE_SEPARATOR) {
            let prefix = &class[..=pos];
            if let Some(dir) = self.namespaces.get(prefix) {
                let relative = class[pos + 1..].replace(NAMESPACE_SEPARATOR, "/");
                let file = dir.join(&format!("{relative}.{SOURCE_EXTENSION}"));
                if self.fs.is_file(&file.absolutize(&self.install_root)) {
                    return Some(file);
                }
            }
            end = pos;
        }
        None
    }

    /// Resolve and require `class` on first reference.
    ///
    /// Later calls return the file recorded the first time, even if the
    /// maps changed since.
    pub fn autoload(&mut self, class: &str) -> Option<NormalizedPath> {
        let class = class.trim_start_matches(NAMESPACE_SEPARATOR);
        if let Some(file) = self.loaded.get(class) {
            return Some(file.clone());
        }
        let file = self.find(class)?;
        tracing::debug!(class, file = %file, "Autoloaded class");
        self.required.insert(file.clone());
        self.loaded.insert(class.to_string(), file.clone());
        Some(file)
    }

    /// Like [`Autoloader::autoload`], but a miss is an error.
    pub fn require_class(&mut self, class: &str) -> Result<NormalizedPath> {
        self.autoload(class).ok_or_else(|| Error::ClassNotFound {
            class: class.to_string(),
        })
    }

    /// Require bootstrap files (e.g. a vendored `autoload.php`) eagerly.
    pub fn load_files<'a, I>(&mut self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a NormalizedPath>,
    {
        for file in files {
            let file = file.absolutize(&self.install_root);
            if !self.fs.is_file(&file) {
                return Err(Error::MissingFile { path: file });
            }
            self.required.insert(file);
        }
        Ok(())
    }

    /// Whether `class` has been autoloaded.
    pub fn is_loaded(&self, class: &str) -> bool {
        self.loaded
            .contains_key(class.trim_start_matches(NAMESPACE_SEPARATOR))
    }

    /// Files required so far, in order.
    pub fn required_files(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.required.iter()
    }
}
