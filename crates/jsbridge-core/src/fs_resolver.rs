//! Filesystem module resolution.
//!
//! [`FileResolver`] maps import specifiers to files:
//! - `./x` and `../x` are joined onto the referrer's location
//! - `/x` is taken as an absolute path
//! - anything else is looked up under the root directory
//!
//! If the path names no file, each configured extension is tried in turn.
//!
//! The engine reports a nested module's referrer as the importer's path
//! with relative segments already applied (`a/index.js`, not
//! `./index.js`), so a referrer is always read relative to the root.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use url::Url;

use jsbridge_common::ResolverConfig;

/// Resolves module specifiers against the filesystem.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileResolver {
    /// Create a resolver rooted at `root`, trying `.js` and `.mjs`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["js".to_string(), "mjs".to_string()],
        }
    }

    /// Create a resolver from configuration.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(&config.root_dir).with_extensions(config.extensions.clone())
    }

    /// Replace the extensions tried for extension-less specifiers.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// The file `specifier` refers to when imported from `referrer`.
    pub fn resolve_path(&self, specifier: &str, referrer: &str) -> Option<PathBuf> {
        let candidate = if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = self.referrer_path(referrer)?;
            let base = Url::from_file_path(base).ok()?;
            base.join(specifier).ok()?.to_file_path().ok()?
        } else if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else {
            std::path::absolute(self.root.join(specifier)).ok()?
        };

        self.existing_file(candidate)
    }

    /// Source of the module `specifier` refers to, or `None` if not found.
    pub fn resolve(&self, specifier: &str, referrer: &str) -> Option<String> {
        let Some(path) = self.resolve_path(specifier, referrer) else {
            debug!(specifier, referrer, "module not found");
            return None;
        };

        trace!(specifier, path = %path.display(), "module resolved");
        std::fs::read_to_string(&path).ok()
    }

    /// Package the resolver as a callback for
    /// [`Engine::load_module`](crate::Engine::load_module).
    pub fn into_callback(self) -> impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static {
        move |specifier: &str, referrer: &str| self.resolve(specifier, referrer)
    }

    /// Absolute location of the importing module.
    fn referrer_path(&self, referrer: &str) -> Option<PathBuf> {
        std::path::absolute(self.root.join(referrer)).ok()
    }

    fn existing_file(&self, path: PathBuf) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path);
        }

        self.extensions.iter().find_map(|ext| {
            let mut with_ext = path.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            with_ext.is_file().then_some(with_ext)
        })
    }
}
