//! Engine lifecycle and the three call paths into the script engine.
//!
//! An [`Engine`] owns one isolate+context pair:
//! - [`Engine::run`] evaluates a classic script
//! - [`Engine::load_module`] loads a module graph, resolving imports
//!   through a host callback
//! - [`Engine::send`] delivers a raw protocol frame
//!
//! The context is released by [`Engine::dispose`] or, failing that, when
//! the engine is dropped. Both paths share the same idempotent release.

use std::ffi::CString;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use jsbridge_common::BridgeError;
use jsbridge_sys::{
    ContextHandle, jsb_dispose_context, jsb_frames_received, jsb_load_module, jsb_new_context,
    jsb_run, jsb_send, status,
};

use crate::handle::NativeHandle;
use crate::resolver::ResolverRegistry;
use crate::{Value, bootstrap, marshal};

/// A standalone script engine (isolate + context).
///
/// Global scope persists across calls on the same engine. The engine is
/// neither `Send` nor `Sync`: it lives on the thread that created it, and
/// calls take `&mut self`, so calls against one engine are serialized by
/// the borrow checker rather than by a lock.
///
/// No call has a timeout. A script that never terminates blocks the
/// calling thread.
///
/// # Example
///
/// ```ignore
/// use jsbridge_core::Engine;
///
/// let mut engine = Engine::new()?;
/// let value = engine.run("40 + 2", "answer.js")?;
/// assert_eq!(value.to_string(), "42");
/// ```
pub struct Engine {
    handle: NativeHandle<ContextHandle>,
}

impl Engine {
    /// Create a new engine, initializing the runtime on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NullHandle`] if the runtime hands back no
    /// context.
    pub fn new() -> Result<Self, BridgeError> {
        bootstrap::ensure_initialized();

        let handle = NativeHandle::new(jsb_new_context(), jsb_dispose_context, "context")?;
        debug!("Engine created");

        Ok(Self { handle })
    }

    /// Compile and run `source`, attributing it to `origin` in stack traces.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Script`] if the script throws or fails to parse
    /// - [`BridgeError::Disposed`] if the engine was disposed
    /// - [`BridgeError::InvalidArgument`] if an argument contains a NUL byte
    #[allow(unsafe_code)]
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    pub fn run(&mut self, source: &str, origin: &str) -> Result<Value, BridgeError> {
        let ctx = self.handle.get()?;
        let c_source = c_string(source, "source")?;
        let c_origin = c_string(origin, "origin")?;
        let start = Instant::now();

        // SAFETY: `ctx` is live while `self.handle` is; both strings outlive
        // the call.
        let rtn = unsafe { jsb_run(ctx.as_ptr(), c_source.as_ptr(), c_origin.as_ptr()) };
        let result = marshal::take_result(rtn);

        debug!(
            duration_us = start.elapsed().as_micros(),
            ok = result.is_ok(),
            "Script run completed"
        );
        result
    }

    /// Load `source` as a module, resolving each import with `resolve`.
    ///
    /// `resolve(specifier, referrer)` returns the imported module's source
    /// or `None` if it cannot be found. `referrer` is the importing
    /// module's path: `origin` for the entry, otherwise the importer's
    /// specifier with relative segments applied (`a/index.js`). It is
    /// called once per distinct module in the graph and may run arbitrary
    /// host logic, including loading modules on another engine.
    ///
    /// Returns the engine's status code: `0` on success, nonzero for an
    /// engine-defined failure category (parse error, missing module,
    /// evaluation error, ...).
    ///
    /// # Errors
    ///
    /// Only binding failures: [`BridgeError::Disposed`] or
    /// [`BridgeError::InvalidArgument`]. Failures inside the module graph
    /// are reported through the status code.
    #[allow(unsafe_code)]
    #[instrument(skip(self, source, resolve), fields(source_len = source.len()))]
    pub fn load_module<F>(
        &mut self,
        source: &str,
        origin: &str,
        resolve: F,
    ) -> Result<i32, BridgeError>
    where
        F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        let ctx = self.handle.get()?;
        let c_source = c_string(source, "source")?;
        let c_origin = c_string(origin, "origin")?;
        let start = Instant::now();

        let code = {
            let guard = ResolverRegistry::global().scoped(Arc::new(resolve));

            // SAFETY: `ctx` is live while `self.handle` is; both strings
            // outlive the call and the token stays registered until the
            // guard drops.
            unsafe {
                jsb_load_module(
                    ctx.as_ptr(),
                    c_source.as_ptr(),
                    c_origin.as_ptr(),
                    guard.token().as_raw(),
                )
            }
        };

        if code == status::OK {
            debug!(duration_us = start.elapsed().as_micros(), "Module loaded");
        } else {
            warn!(
                code,
                status = status::describe(code),
                duration_us = start.elapsed().as_micros(),
                "Module load failed"
            );
        }

        Ok(code)
    }

    /// Deliver a raw protocol frame to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Status`] if the engine's handler reports a
    /// nonzero status (an empty payload is one such case), or
    /// [`BridgeError::Disposed`] if the engine was disposed.
    #[allow(unsafe_code)]
    pub fn send(&mut self, payload: &[u8]) -> Result<(), BridgeError> {
        let ctx = self.handle.get()?;

        // SAFETY: `payload` is readable for `payload.len()` bytes and the
        // native side copies it before returning.
        let code = unsafe { jsb_send(ctx.as_ptr(), payload.len(), payload.as_ptr().cast()) };
        if code != status::OK {
            debug!(code, status = status::describe(code), "Frame rejected");
            return Err(BridgeError::status(code));
        }

        Ok(())
    }

    /// Number of protocol frames the engine has accepted.
    #[allow(unsafe_code)]
    pub fn frames_received(&self) -> Result<usize, BridgeError> {
        let ctx = self.handle.get()?;
        // SAFETY: `ctx` is live while `self.handle` is.
        Ok(unsafe { jsb_frames_received(ctx.as_ptr()) })
    }

    /// Release the native context now.
    ///
    /// Returns `true` if this call released it. Later calls, and the drop
    /// of the engine, are no-ops; every other operation then fails with
    /// [`BridgeError::Disposed`].
    pub fn dispose(&mut self) -> bool {
        let released = self.handle.release();
        if released {
            debug!("Engine disposed");
        }
        released
    }

    /// Returns `true` once the native context has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// Copy a string for the native side.
fn c_string(s: &str, what: &str) -> Result<CString, BridgeError> {
    CString::new(s)
        .map_err(|_| BridgeError::invalid_argument(format!("{what} contains a NUL byte")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new().unwrap();
        assert!(!engine.is_disposed());
        assert!(bootstrap::is_initialized());
    }

    #[test]
    fn test_dispose_idempotent() {
        let mut engine = Engine::new().unwrap();

        assert!(engine.dispose());
        assert!(!engine.dispose());
        assert!(engine.is_disposed());
    }

    #[test]
    fn test_calls_after_dispose() {
        let mut engine = Engine::new().unwrap();
        engine.dispose();

        assert!(engine.run("1", "a.js").unwrap_err().is_disposed());
        assert!(
            engine
                .load_module("", "a.js", |_: &str, _: &str| None)
                .unwrap_err()
                .is_disposed()
        );
        assert!(engine.send(b"{}").unwrap_err().is_disposed());
        assert!(engine.frames_received().unwrap_err().is_disposed());
    }

    #[test]
    fn test_nul_in_source() {
        let mut engine = Engine::new().unwrap();
        let err = engine.run("1\0", "a.js").unwrap_err();

        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }

    #[test]
    fn test_engine_debug() {
        let engine = Engine::new().unwrap();
        let debug_str = format!("{engine:?}");

        assert!(debug_str.contains("Engine"));
        assert!(debug_str.contains("disposed"));
    }
}
