//! Module loader that calls back into the host through an integer token.
//!
//! The host cannot hand a closure across the call surface, so each
//! `jsb_load_module` call carries a token. Every import encountered while
//! loading the graph is forwarded to the registered [`ResolveModuleFn`]
//! together with that token.
//!
//! A fetched module is identified by its specifier resolved against the
//! importing module: `./util.js` imported from `a/index.js` is `a/util.js`.
//! That identity is the module's source path, so it is also the referrer
//! its own imports are reported with. Bare specifiers are their own
//! identity.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int};
use std::path::Path;

use boa_engine::module::{Module, ModuleLoader, Referrer};
use boa_engine::{Context, JsNativeError, JsResult, JsString, Source};
use tracing::{debug, trace};

use crate::{ResolveModuleFn, status};

/// Loader bound to a single context.
///
/// Modules are cached by identity for the duration of one load call so
/// that cyclic imports terminate and shared dependencies evaluate once.
pub(crate) struct TokenModuleLoader {
    resolve: ResolveModuleFn,
    token: Cell<Option<c_int>>,
    modules: RefCell<HashMap<String, Module>>,
    failure: Cell<Option<c_int>>,
}

impl TokenModuleLoader {
    pub(crate) fn new(resolve: ResolveModuleFn) -> Self {
        Self {
            resolve,
            token: Cell::new(None),
            modules: RefCell::new(HashMap::new()),
            failure: Cell::new(None),
        }
    }

    /// Start a load call under `token`.
    pub(crate) fn begin(&self, token: c_int) {
        self.token.set(Some(token));
        self.failure.set(None);
        self.modules.borrow_mut().clear();
    }

    /// End the current load call; the token is no longer valid afterwards.
    pub(crate) fn finish(&self) {
        self.token.set(None);
        self.modules.borrow_mut().clear();
    }

    /// Register the entry module so imports that resolve to its origin
    /// bind to it.
    pub(crate) fn insert_entry(&self, origin: &str, module: Module) {
        self.modules.borrow_mut().insert(normalize(origin), module);
    }

    /// The first failure category recorded during this load call.
    pub(crate) fn take_failure(&self) -> Option<c_int> {
        self.failure.take()
    }

    fn fail(&self, code: c_int) {
        if self.failure.get().is_none() {
            self.failure.set(Some(code));
        }
    }

    /// Ask the host for the source of `specifier`.
    fn fetch(&self, token: c_int, specifier: &str, referrer: &str) -> Option<String> {
        let specifier = CString::new(specifier).ok()?;
        let referrer = CString::new(referrer).ok()?;

        // SAFETY: both strings outlive the call; the resolver contract hands
        // ownership of a non-null result to us.
        let raw = unsafe { (self.resolve)(token, specifier.as_ptr(), referrer.as_ptr()) };
        if raw.is_null() {
            return None;
        }

        // SAFETY: the host allocated `raw` with `CString::into_raw`.
        let source = unsafe { CString::from_raw(raw) };
        source.into_string().ok()
    }

    fn load(
        &self,
        referrer: &Referrer,
        specifier: &str,
        context: &mut Context,
    ) -> JsResult<Module> {
        let referrer = referrer
            .path()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identity = module_identity(&referrer, specifier);

        if let Some(module) = self.modules.borrow().get(&identity).cloned() {
            trace!(specifier, identity = %identity, "module cache hit");
            return Ok(module);
        }

        let Some(token) = self.token.get() else {
            self.fail(status::MODULE_NOT_FOUND);
            return Err(JsNativeError::typ()
                .with_message(format!("cannot import '{specifier}' outside of a module load"))
                .into());
        };

        let Some(text) = self.fetch(token, specifier, &referrer) else {
            debug!(specifier, referrer = %referrer, "resolver returned no source");
            self.fail(status::MODULE_NOT_FOUND);
            return Err(JsNativeError::typ()
                .with_message(format!("module not found: '{specifier}'"))
                .into());
        };

        let source = Source::from_bytes(&text).with_path(Path::new(&identity));
        let module = Module::parse(source, None, context).inspect_err(|_| {
            self.fail(status::PARSE_ERROR);
        })?;

        self.modules.borrow_mut().insert(identity, module.clone());
        Ok(module)
    }
}

impl ModuleLoader for TokenModuleLoader {
    fn load_imported_module(
        &self,
        referrer: Referrer,
        specifier: JsString,
        finish_load: Box<dyn FnOnce(JsResult<Module>, &mut Context)>,
        context: &mut Context,
    ) {
        let specifier = specifier.to_std_string_escaped();
        let result = self.load(&referrer, &specifier, context);
        finish_load(result, context);
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Identity of the module `specifier` names when imported from `referrer`.
fn module_identity(referrer: &str, specifier: &str) -> String {
    if !is_relative(specifier) {
        return specifier.to_string();
    }

    let dir = referrer.rfind('/').map_or("", |i| &referrer[..=i]);
    normalize(&format!("{dir}{specifier}"))
}

/// Lexically collapse `.` and `..` segments of a `/`-separated path.
///
/// `..` above a relative start is kept; above `/` it is dropped.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Borrow a C string argument as `&str`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
pub(crate) unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_relative_to_referrer_dir() {
        assert_eq!(module_identity("main.js", "./a/index.js"), "a/index.js");
        assert_eq!(module_identity("a/index.js", "./util.js"), "a/util.js");
        assert_eq!(module_identity("b/index.js", "./util.js"), "b/util.js");
        assert_eq!(module_identity("a/index.js", "../b/index.js"), "b/index.js");
    }

    #[test]
    fn test_identity_absolute_referrer() {
        assert_eq!(module_identity("/srv/app/main.js", "./lib/x.js"), "/srv/app/lib/x.js");
        assert_eq!(module_identity("/main.js", "../../x.js"), "/x.js");
    }

    #[test]
    fn test_identity_bare_specifier() {
        assert_eq!(module_identity("a/index.js", "util"), "util");
        assert_eq!(module_identity("a/index.js", "/abs/util.js"), "/abs/util.js");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("./main.js"), "main.js");
        assert_eq!(normalize("a/./b/../c.js"), "a/c.js");
        assert_eq!(normalize("../shared/x.js"), "../shared/x.js");
        assert_eq!(normalize("a/../../x.js"), "../x.js");
    }
}
