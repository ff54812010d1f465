//! Resolver registry: integer tokens standing in for host closures.
//!
//! The native side only understands integers, so every module load
//! registers its resolver callback here and passes the resulting token
//! through the call surface. When the engine meets an import it calls
//! [`resolve_module`] with the token, which looks the callback up and
//! invokes it.
//!
//! # Concurrency
//!
//! One process-wide table guarded by a single mutex. The lock is held only
//! for insert, lookup and remove, never while a callback runs, so a
//! callback may itself load modules on another engine.
//!
//! # Token lifetime
//!
//! [`ResolverGuard`] registers on creation and unregisters on drop, so an
//! entry exists exactly for the bracketed native call, on every exit path.

use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::{error, trace};

use jsbridge_common::BridgeError;

/// Host-side module resolution callback.
///
/// Called with `(specifier, referrer)`; returns the module source or `None`
/// when the module cannot be found. It may run on any thread that drives a
/// module load.
pub type ResolveFn = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Token identifying one registered resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolverToken(c_int);

impl ResolverToken {
    /// The raw integer passed across the call surface.
    pub fn as_raw(self) -> c_int {
        self.0
    }
}

impl std::fmt::Display for ResolverToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct RegistryInner {
    next_token: c_int,
    entries: HashMap<c_int, ResolveFn>,
}

/// Table mapping tokens to resolver callbacks.
///
/// Tokens come from an increasing counter. The counter wraps after
/// `i32::MAX` registrations, skipping tokens that are still live.
#[derive(Default)]
pub struct ResolverRegistry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL: LazyLock<ResolverRegistry> = LazyLock::new(ResolverRegistry::new);

impl ResolverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry consulted by [`resolve_module`].
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Store `callback` under a fresh token.
    pub fn register(&self, callback: ResolveFn) -> ResolverToken {
        let mut inner = self.inner.lock();
        let mut token = inner.next_token.wrapping_add(1);
        while inner.entries.contains_key(&token) {
            token = token.wrapping_add(1);
        }
        inner.next_token = token;
        inner.entries.insert(token, callback);
        trace!(token, live = inner.entries.len(), "resolver registered");
        ResolverToken(token)
    }

    /// The callback registered under `token`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownResolverToken`] if no such entry exists.
    pub fn lookup(&self, token: c_int) -> Result<ResolveFn, BridgeError> {
        self.inner
            .lock()
            .entries
            .get(&token)
            .cloned()
            .ok_or(BridgeError::UnknownResolverToken { token })
    }

    /// Remove the entry for `token`; returns `false` if it was absent.
    pub fn unregister(&self, token: ResolverToken) -> bool {
        let removed = self.inner.lock().entries.remove(&token.0).is_some();
        trace!(token = token.0, removed, "resolver unregistered");
        removed
    }

    /// Register `callback` for the lifetime of the returned guard.
    pub fn scoped(&self, callback: ResolveFn) -> ResolverGuard<'_> {
        let token = self.register(callback);
        ResolverGuard {
            registry: self,
            token,
        }
    }

    /// Returns `true` if `token` is registered.
    pub fn contains(&self, token: ResolverToken) -> bool {
        self.inner.lock().entries.contains_key(&token.0)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ResolverRegistry")
            .field("next_token", &inner.next_token)
            .field("live", &inner.entries.len())
            .finish()
    }
}

/// Scoped registration; the entry is removed when the guard drops.
#[derive(Debug)]
pub struct ResolverGuard<'a> {
    registry: &'a ResolverRegistry,
    token: ResolverToken,
}

impl ResolverGuard<'_> {
    /// The token to pass across the call surface.
    pub fn token(&self) -> ResolverToken {
        self.token
    }
}

impl Drop for ResolverGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.token);
    }
}

/// Trampoline the native side calls for every import.
///
/// Looks `token` up in the global registry and runs the callback. Unknown
/// tokens, invalid strings and panicking callbacks are logged and reported
/// as "not found"; a panic must not unwind into the native side.
///
/// # Safety
///
/// `specifier` and `referrer` must be null or NUL-terminated strings valid
/// for the duration of the call.
#[allow(unsafe_code)]
pub unsafe extern "C" fn resolve_module(
    token: c_int,
    specifier: *const c_char,
    referrer: *const c_char,
) -> *mut c_char {
    let callback = match ResolverRegistry::global().lookup(token) {
        Ok(callback) => callback,
        Err(e) => {
            error!(token, error = %e, "engine called back with an unregistered resolver token");
            return std::ptr::null_mut();
        }
    };

    // SAFETY: upheld by the caller.
    let (Some(specifier), Some(referrer)) = (unsafe { borrow_str(specifier) }, unsafe {
        borrow_str(referrer)
    }) else {
        error!(token, "resolver called with an invalid specifier or referrer");
        return std::ptr::null_mut();
    };

    let resolved = panic::catch_unwind(AssertUnwindSafe(|| callback(specifier, referrer)));
    match resolved {
        Ok(Some(source)) => match CString::new(source) {
            Ok(source) => source.into_raw(),
            Err(_) => {
                error!(token, specifier, "resolved source contains a NUL byte");
                std::ptr::null_mut()
            }
        },
        Ok(None) => std::ptr::null_mut(),
        Err(_) => {
            error!(token, specifier, "resolver callback panicked");
            std::ptr::null_mut()
        }
    }
}

#[allow(unsafe_code)]
unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn constant(source: &'static str) -> ResolveFn {
        Arc::new(move |_: &str, _: &str| Some(source.to_string()))
    }

    #[test]
    fn test_register_lookup_unregister() {
        let registry = ResolverRegistry::new();
        let token = registry.register(constant("export const x = 1;"));

        assert!(registry.contains(token));
        let callback = registry.lookup(token.as_raw()).unwrap();
        assert_eq!(callback("./x.js", "main.js").as_deref(), Some("export const x = 1;"));

        assert!(registry.unregister(token));
        assert!(!registry.unregister(token));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tokens_increase() {
        let registry = ResolverRegistry::new();
        let first = registry.register(constant(""));
        let second = registry.register(constant(""));

        assert_eq!(first.as_raw(), 1);
        assert_eq!(second.as_raw(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_wrapped_counter_skips_live_tokens() {
        let registry = ResolverRegistry::new();
        let live = registry.register(constant("live"));
        registry.inner.lock().next_token = i32::MAX;

        let wrapped = registry.register(constant(""));
        assert_eq!(wrapped.as_raw(), i32::MIN);

        registry.inner.lock().next_token = 0;
        let next = registry.register(constant(""));
        assert_ne!(next, live);
        assert_eq!(next.as_raw(), 2);
        assert_eq!(registry.lookup(live.as_raw()).unwrap()("", "").as_deref(), Some("live"));
    }

    #[test]
    fn test_lookup_unknown_token() {
        let registry = ResolverRegistry::new();
        let err = registry.lookup(42).err().unwrap();

        assert!(matches!(err, BridgeError::UnknownResolverToken { token: 42 }));
    }

    #[test]
    fn test_lookup_returns_registered_callback() {
        let registry = ResolverRegistry::new();
        let a = registry.register(constant("a"));
        let b = registry.register(constant("b"));

        assert_eq!(registry.lookup(a.as_raw()).unwrap()("", "").as_deref(), Some("a"));
        assert_eq!(registry.lookup(b.as_raw()).unwrap()("", "").as_deref(), Some("b"));
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let registry = ResolverRegistry::new();
        let token = {
            let guard = registry.scoped(constant(""));
            assert!(registry.contains(guard.token()));
            guard.token()
        };

        assert!(!registry.contains(token));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guard_unregisters_on_panic() {
        let registry = ResolverRegistry::new();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = registry.scoped(constant(""));
            panic!("load failed");
        }));

        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_tokens_are_distinct() {
        let registry = Arc::new(ResolverRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| registry.register(constant("")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(seen.insert(token), "token {token} handed out twice");
            }
        }

        assert_eq!(seen.len(), 800);
        assert_eq!(registry.len(), 800);
    }

    #[test]
    fn test_debug() {
        let registry = ResolverRegistry::new();
        registry.register(constant(""));

        let debug_str = format!("{registry:?}");
        assert!(debug_str.contains("ResolverRegistry"));
        assert!(debug_str.contains("live: 1"));
    }
}
