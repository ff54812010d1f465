//! Error types for jsbridge.
//!
//! Errors come in two tiers:
//! - [`ScriptError`]: an exception raised by user-supplied script or module
//!   source, carrying message, location and stack trace
//! - [`BridgeError`]: everything that can go wrong at the call boundary,
//!   with script errors wrapped as [`BridgeError::Script`]

use thiserror::Error;

/// An exception raised while executing script source.
///
/// All three fields are owned copies of the text produced by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ScriptError {
    /// Display form of the exception, e.g. `SyntaxError: unexpected token`.
    pub message: String,

    /// Origin the failing source was attributed to.
    pub location: String,

    /// Stack trace in `<message>\n    at <origin>` form.
    pub stack_trace: String,
}

impl ScriptError {
    /// Create a new script error.
    pub fn new(
        message: impl Into<String>,
        location: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            location: location.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Errors surfaced by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The script raised an exception.
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// The engine reported a nonzero status for a raw call.
    #[error("expected status 0, got {code}")]
    Status {
        /// The status code returned by the engine.
        code: i32,
    },

    /// The engine handed back a null handle where one was required.
    #[error("Engine returned a null {what} handle")]
    NullHandle {
        /// Which kind of handle was null.
        what: &'static str,
    },

    /// The native resource behind this handle was already released.
    #[error("Handle used after dispose")]
    Disposed,

    /// A raw call result carried both a value and an error, or neither.
    #[error("Invalid call result: {reason}")]
    InvalidResult {
        /// Description of the inconsistency.
        reason: String,
    },

    /// An argument could not be passed across the boundary.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: String,
    },

    /// The engine called back with a resolver token nobody registered.
    #[error("Unknown resolver token: {token}")]
    UnknownResolverToken {
        /// The token that was looked up.
        token: i32,
    },
}

impl BridgeError {
    /// Create a new `Status` error.
    pub fn status(code: i32) -> Self {
        Self::Status { code }
    }

    /// Create a new `InvalidResult` error.
    pub fn invalid_result(reason: impl Into<String>) -> Self {
        Self::InvalidResult {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a script exception.
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script(_))
    }

    /// Returns `true` if the handle had already been released.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Borrow the script error, if this is one.
    pub fn as_script(&self) -> Option<&ScriptError> {
        match self {
            Self::Script(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::status(3);
        assert_eq!(err.to_string(), "expected status 0, got 3");

        let err = BridgeError::Disposed;
        assert_eq!(err.to_string(), "Handle used after dispose");

        let err = BridgeError::NullHandle { what: "context" };
        assert_eq!(err.to_string(), "Engine returned a null context handle");
    }

    #[test]
    fn test_script_error_from() {
        let script = ScriptError::new(
            "SyntaxError: oops",
            "test.js",
            "SyntaxError: oops\n    at test.js",
        );
        let err: BridgeError = script.clone().into();

        assert!(err.is_script());
        assert_eq!(err.as_script(), Some(&script));
        assert_eq!(err.to_string(), "Script error: SyntaxError: oops");
    }

    #[test]
    fn test_boundary_error_display() {
        let err = BridgeError::invalid_result("neither value nor error populated");
        assert_eq!(err.to_string(), "Invalid call result: neither value nor error populated");

        let err = BridgeError::invalid_argument("source contains a NUL byte");
        assert_eq!(err.to_string(), "Invalid argument: source contains a NUL byte");

        let err = BridgeError::UnknownResolverToken { token: 9 };
        assert_eq!(err.to_string(), "Unknown resolver token: 9");
    }

    #[test]
    fn test_predicates() {
        assert!(BridgeError::Disposed.is_disposed());
        assert!(!BridgeError::status(1).is_disposed());
        assert!(!BridgeError::status(1).is_script());
        assert!(BridgeError::status(1).as_script().is_none());
    }
}
