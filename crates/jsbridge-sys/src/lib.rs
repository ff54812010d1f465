//! Native call surface of the jsbridge script engine.
//!
//! This crate is the only code that touches the engine itself. Everything
//! crosses it through a fixed C ABI:
//! - Opaque pointers for contexts and values
//! - `#[repr(C)]` result records whose strings are owned by this side
//!   until the caller releases them with [`jsb_free_string`]
//! - Integer status codes (see [`status`])
//! - An integer token, not a closure, identifying the host resolver for
//!   each module load
//!
//! The engine is [Boa](https://boajs.dev/). A context is single-threaded;
//! callers must serialize calls against one `ContextPtr` and must release
//! every handle exactly once.

#![allow(unsafe_code)]

mod context;
mod frame;
mod loader;
pub mod status;

use std::ffi::{CString, c_char, c_int, c_void};
use std::ptr;
use std::sync::OnceLock;

use boa_engine::JsValue;

use crate::context::{ContextState, Exception};
use crate::loader::borrow_str;

pub use crate::frame::Frame;

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to an isolate+context pair.
#[repr(C)]
pub struct ContextHandle {
    _private: [u8; 0],
}

/// Opaque handle to a value produced by a context.
#[repr(C)]
pub struct ValueHandle {
    _private: [u8; 0],
}

pub type ContextPtr = *mut ContextHandle;
pub type ValuePtr = *mut ValueHandle;

/// Exception text produced by a failed call.
///
/// Either all pointers are null or `msg` is non-null. Non-null pointers
/// must each be released with [`jsb_free_string`].
#[repr(C)]
#[derive(Debug)]
pub struct RtnError {
    pub msg: *mut c_char,
    pub location: *mut c_char,
    pub stack: *mut c_char,
}

/// Result of [`jsb_run`]: exactly one of `value` and `error.msg` is non-null.
#[repr(C)]
#[derive(Debug)]
pub struct RtnValue {
    pub value: ValuePtr,
    pub error: RtnError,
}

/// Host callback that resolves an import.
///
/// Called with the token passed to [`jsb_load_module`], the import
/// specifier and the referrer. Returns the module source allocated with
/// `CString::into_raw`, ownership passing to this side, or null when the
/// module cannot be found.
pub type ResolveModuleFn = unsafe extern "C" fn(
    token: c_int,
    specifier: *const c_char,
    referrer: *const c_char,
) -> *mut c_char;

static RESOLVER: OnceLock<ResolveModuleFn> = OnceLock::new();

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a string the caller must release with [`jsb_free_string`].
///
/// Interior NUL bytes are replaced so the text survives the round trip.
pub fn alloc_string(s: &str) -> *mut c_char {
    let sanitized = if s.contains('\0') {
        s.replace('\0', "\u{FFFD}")
    } else {
        s.to_string()
    };
    CString::new(sanitized).unwrap_or_default().into_raw()
}

impl RtnError {
    fn none() -> Self {
        Self {
            msg: ptr::null_mut(),
            location: ptr::null_mut(),
            stack: ptr::null_mut(),
        }
    }
}

impl RtnValue {
    fn value(value: JsValue) -> Self {
        Self {
            value: Box::into_raw(Box::new(value)).cast(),
            error: RtnError::none(),
        }
    }

    fn exception(exception: &Exception) -> Self {
        Self {
            value: ptr::null_mut(),
            error: RtnError {
                msg: alloc_string(&exception.message),
                location: alloc_string(&exception.location),
                stack: alloc_string(&exception.stack),
            },
        }
    }

    fn invalid_argument(what: &str) -> Self {
        Self::exception(&Exception {
            message: format!("TypeError: invalid {what} argument"),
            location: String::new(),
            stack: String::new(),
        })
    }
}

/// Borrow the state behind a context pointer.
///
/// # Safety
///
/// `ctx` must be null or a live pointer from [`jsb_new_context`] with no
/// other outstanding borrow.
unsafe fn context_mut<'a>(ctx: ContextPtr) -> Option<&'a mut ContextState> {
    // SAFETY: upheld by the caller.
    unsafe { ctx.cast::<ContextState>().as_mut() }
}

// ============================================================================
// Lifecycle Functions
// ============================================================================

/// One-time global initialization.
///
/// Stores the module resolution callback. The engine supports a single
/// initialization per process: later calls return
/// [`status::ALREADY_INITIALIZED`] and leave the first callback in place.
#[unsafe(no_mangle)]
pub extern "C" fn jsb_init(resolve: ResolveModuleFn) -> c_int {
    match RESOLVER.set(resolve) {
        Ok(()) => status::OK,
        Err(_) => status::ALREADY_INITIALIZED,
    }
}

/// Create a new isolate+context pair.
///
/// Returns null if [`jsb_init`] has not been called or the context could
/// not be built. The pointer must be released with [`jsb_dispose_context`].
#[unsafe(no_mangle)]
pub extern "C" fn jsb_new_context() -> ContextPtr {
    let Some(resolve) = RESOLVER.get().copied() else {
        return ptr::null_mut();
    };

    match ContextState::new(resolve) {
        Some(state) => Box::into_raw(Box::new(state)).cast(),
        None => ptr::null_mut(),
    }
}

/// Release a context.
///
/// # Safety
///
/// `ctx` must be null or a pointer from [`jsb_new_context`] that has not
/// been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_dispose_context(ctx: ContextPtr) {
    if !ctx.is_null() {
        // SAFETY: upheld by the caller.
        drop(unsafe { Box::from_raw(ctx.cast::<ContextState>()) });
    }
}

/// Release a value.
///
/// # Safety
///
/// `value` must be null or a pointer from a [`RtnValue`] that has not been
/// released yet, released on the thread that created it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_dispose_value(value: ValuePtr) {
    if !value.is_null() {
        // SAFETY: upheld by the caller.
        drop(unsafe { Box::from_raw(value.cast::<JsValue>()) });
    }
}

/// Release a string produced by this side.
///
/// # Safety
///
/// `s` must be null or a string from this crate not released before.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_free_string(s: *mut c_char) {
    if !s.is_null() {
        // SAFETY: upheld by the caller.
        drop(unsafe { CString::from_raw(s) });
    }
}

// ============================================================================
// Execution Functions
// ============================================================================

/// Compile and run a classic script.
///
/// # Safety
///
/// `ctx` must be a live context pointer; `source` and `origin` must be
/// NUL-terminated strings valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_run(
    ctx: ContextPtr,
    source: *const c_char,
    origin: *const c_char,
) -> RtnValue {
    // SAFETY: upheld by the caller.
    let Some(state) = (unsafe { context_mut(ctx) }) else {
        return RtnValue::invalid_argument("context");
    };
    // SAFETY: upheld by the caller.
    let (Some(source), Some(origin)) =
        (unsafe { borrow_str(source) }, unsafe { borrow_str(origin) })
    else {
        return RtnValue::invalid_argument("string");
    };

    match state.run(source, origin) {
        Ok(value) => RtnValue::value(value),
        Err(exception) => RtnValue::exception(&exception),
    }
}

/// Load and evaluate a module graph.
///
/// Every import is resolved through the callback given to [`jsb_init`],
/// passing `token` back unchanged.
///
/// # Safety
///
/// Same requirements as [`jsb_run`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_load_module(
    ctx: ContextPtr,
    source: *const c_char,
    origin: *const c_char,
    token: c_int,
) -> c_int {
    // SAFETY: upheld by the caller.
    let Some(state) = (unsafe { context_mut(ctx) }) else {
        return status::INVALID_ARGUMENT;
    };
    // SAFETY: upheld by the caller.
    let (Some(source), Some(origin)) =
        (unsafe { borrow_str(source) }, unsafe { borrow_str(origin) })
    else {
        return status::INVALID_ARGUMENT;
    };

    state.load_module(source, origin, token)
}

/// Deliver a raw protocol frame of `len` bytes.
///
/// The payload is copied before it is parsed.
///
/// # Safety
///
/// `ctx` must be a live context pointer; `data` must point to `len`
/// readable bytes when `len` is nonzero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_send(ctx: ContextPtr, len: usize, data: *const c_void) -> c_int {
    // SAFETY: upheld by the caller.
    let Some(state) = (unsafe { context_mut(ctx) }) else {
        return status::INVALID_ARGUMENT;
    };
    if len == 0 {
        return state.send(&[]);
    }
    if data.is_null() {
        return status::INVALID_ARGUMENT;
    }

    // SAFETY: upheld by the caller.
    let payload = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) }.to_vec();
    state.send(&payload)
}

/// Number of protocol frames a context has accepted.
///
/// # Safety
///
/// `ctx` must be null or a live context pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_frames_received(ctx: ContextPtr) -> usize {
    // SAFETY: upheld by the caller.
    unsafe { context_mut(ctx) }.map_or(0, |state| state.frames_received())
}

/// Display form of a value, e.g. `42` or `"text"`.
///
/// Returns null for a null handle. Release the result with
/// [`jsb_free_string`].
///
/// # Safety
///
/// `value` must be null or a live value pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_to_string(value: ValuePtr) -> *mut c_char {
    // SAFETY: upheld by the caller.
    match unsafe { value.cast::<JsValue>().as_ref() } {
        Some(value) => alloc_string(&value.display().to_string()),
        None => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn resolve_nothing(
        _token: c_int,
        _specifier: *const c_char,
        _referrer: *const c_char,
    ) -> *mut c_char {
        ptr::null_mut()
    }

    fn context() -> ContextPtr {
        let _ = jsb_init(resolve_nothing);
        let ctx = jsb_new_context();
        assert!(!ctx.is_null());
        ctx
    }

    fn take(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let text = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
        unsafe { jsb_free_string(s) };
        text
    }

    #[test]
    fn test_second_init_rejected() {
        let _ = jsb_init(resolve_nothing);
        assert_eq!(jsb_init(resolve_nothing), status::ALREADY_INITIALIZED);
    }

    #[test]
    fn test_run_value() {
        let ctx = context();
        let source = CString::new("40 + 2").unwrap();
        let origin = CString::new("test.js").unwrap();

        let rtn = unsafe { jsb_run(ctx, source.as_ptr(), origin.as_ptr()) };
        assert!(!rtn.value.is_null());
        assert!(rtn.error.msg.is_null());

        assert_eq!(take(unsafe { jsb_value_to_string(rtn.value) }), "42");

        unsafe {
            jsb_dispose_value(rtn.value);
            jsb_dispose_context(ctx);
        }
    }

    #[test]
    fn test_run_exception() {
        let ctx = context();
        let source = CString::new("(").unwrap();
        let origin = CString::new("broken.js").unwrap();

        let rtn = unsafe { jsb_run(ctx, source.as_ptr(), origin.as_ptr()) };
        assert!(rtn.value.is_null());

        let message = take(rtn.error.msg);
        assert!(message.contains("SyntaxError"), "got: {message}");
        assert!(take(rtn.error.location).starts_with("broken.js"));
        assert!(take(rtn.error.stack).contains("at broken.js"));

        unsafe { jsb_dispose_context(ctx) };
    }

    #[test]
    fn test_run_null_context() {
        let source = CString::new("1").unwrap();
        let rtn = unsafe { jsb_run(ptr::null_mut(), source.as_ptr(), source.as_ptr()) };

        assert!(rtn.value.is_null());
        assert!(take(rtn.error.msg).contains("invalid context"));
        unsafe {
            jsb_free_string(rtn.error.location);
            jsb_free_string(rtn.error.stack);
        }
    }

    #[test]
    fn test_send_statuses() {
        let ctx = context();
        let frame = br#"{"id": 1, "method": "Runtime.enable"}"#;

        let code = unsafe { jsb_send(ctx, frame.len(), frame.as_ptr().cast()) };
        assert_eq!(code, status::OK);
        assert_eq!(unsafe { jsb_send(ctx, 0, ptr::null()) }, status::EMPTY_MESSAGE);
        assert_eq!(unsafe { jsb_send(ctx, 4, ptr::null()) }, status::INVALID_ARGUMENT);
        assert_eq!(unsafe { jsb_frames_received(ctx) }, 1);

        unsafe { jsb_dispose_context(ctx) };
    }

    #[test]
    fn test_alloc_string_replaces_nul() {
        assert_eq!(take(alloc_string("a\0b")), "a\u{FFFD}b");
    }

    #[test]
    fn test_dispose_null_is_noop() {
        unsafe {
            jsb_dispose_context(ptr::null_mut());
            jsb_dispose_value(ptr::null_mut());
            jsb_free_string(ptr::null_mut());
        }
    }
}
