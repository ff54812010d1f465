//! Conversion of raw call results into host types.
//!
//! A [`RtnValue`] is a tagged union in disguise: exactly one of the value
//! handle and the error message is populated. Error strings are allocated
//! by the native side and handed over to us; every one of them is copied
//! and released here, exactly once.

use std::ffi::{CStr, c_char};

use tracing::error;

use jsbridge_common::{BridgeError, ScriptError};
use jsbridge_sys::{RtnError, RtnValue, jsb_dispose_value, jsb_free_string};

use crate::Value;

/// Turn a raw run result into a [`Value`] or an error.
///
/// A result carrying both a value and an error, or neither, violates the
/// call surface contract and yields [`BridgeError::InvalidResult`]; any
/// resources it did carry are released.
#[allow(unsafe_code)]
pub fn take_result(rtn: RtnValue) -> Result<Value, BridgeError> {
    let has_value = !rtn.value.is_null();

    // SAFETY: the error strings come from the native side and are not
    // referenced anywhere else.
    let script_error = unsafe { take_error(rtn.error) };

    match (has_value, script_error) {
        (true, None) => Value::from_raw(rtn.value),
        (false, Some(err)) => Err(BridgeError::Script(err)),
        (true, Some(err)) => {
            error!(message = %err.message, "call result carried both a value and an error");
            // SAFETY: the value handle is owned by nobody else yet.
            unsafe { jsb_dispose_value(rtn.value) };
            Err(BridgeError::invalid_result("both value and error populated"))
        }
        (false, None) => {
            error!("call result carried neither a value nor an error");
            Err(BridgeError::invalid_result("neither value nor error populated"))
        }
    }
}

/// Copy an error record into a [`ScriptError`] and release its strings.
///
/// Returns `None` when `msg` is null. Location and stack are released
/// regardless.
///
/// # Safety
///
/// Every non-null pointer in `err` must be a live string from the native
/// side that nobody else will release.
#[allow(unsafe_code)]
pub unsafe fn take_error(err: RtnError) -> Option<ScriptError> {
    // SAFETY: upheld by the caller.
    let (message, location, stack_trace) = unsafe {
        (
            take_string(err.msg),
            take_string(err.location),
            take_string(err.stack),
        )
    };

    message.map(|message| {
        ScriptError::new(
            message,
            location.unwrap_or_default(),
            stack_trace.unwrap_or_default(),
        )
    })
}

/// Copy a native string and release it.
///
/// # Safety
///
/// `ptr` must be null or a live string from the native side that nobody
/// else will release.
#[allow(unsafe_code)]
pub(crate) unsafe fn take_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    // SAFETY: upheld by the caller.
    let text = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    // SAFETY: copied above; released exactly once here.
    unsafe { jsb_free_string(ptr) };
    Some(text)
}
