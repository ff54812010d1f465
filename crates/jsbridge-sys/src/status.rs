//! Status codes returned by the native entry points.
//!
//! Callers on the host side treat these as opaque integers; the names
//! exist for logs and tests.

use std::ffi::c_int;

/// The call succeeded.
pub const OK: c_int = 0;

/// A handle or string argument was null or not valid UTF-8.
pub const INVALID_ARGUMENT: c_int = 1;

/// Module source failed to parse.
pub const PARSE_ERROR: c_int = 2;

/// The resolver had no source for an imported specifier.
pub const MODULE_NOT_FOUND: c_int = 3;

/// Linking or evaluating the module graph threw.
pub const EVALUATION_ERROR: c_int = 4;

/// Module evaluation is still waiting on a promise after draining jobs.
pub const EVALUATION_PENDING: c_int = 5;

/// `jsb_send` was given a zero-length payload.
pub const EMPTY_MESSAGE: c_int = 6;

/// `jsb_send` payload is not a protocol frame.
pub const MALFORMED_MESSAGE: c_int = 7;

/// `jsb_init` was called more than once.
pub const ALREADY_INITIALIZED: c_int = 8;

/// Short name for a status code.
pub fn describe(code: c_int) -> &'static str {
    match code {
        OK => "ok",
        INVALID_ARGUMENT => "invalid argument",
        PARSE_ERROR => "parse error",
        MODULE_NOT_FOUND => "module not found",
        EVALUATION_ERROR => "evaluation error",
        EVALUATION_PENDING => "evaluation pending",
        EMPTY_MESSAGE => "empty message",
        MALFORMED_MESSAGE => "malformed message",
        ALREADY_INITIALIZED => "already initialized",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(OK), "ok");
        assert_eq!(describe(MODULE_NOT_FOUND), "module not found");
        assert_eq!(describe(-1), "unknown");
    }
}
