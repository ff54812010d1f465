//! Host-side wrapper for values produced by an engine.

use std::fmt;

use jsbridge_common::BridgeError;
use jsbridge_sys::{ValueHandle, ValuePtr, jsb_dispose_value, jsb_value_to_string};

use crate::handle::NativeHandle;
use crate::marshal::take_string;

/// An opaque engine value.
///
/// Owns exactly one native value handle. The value has no link back to
/// the [`Engine`](crate::Engine) that produced it; it stays usable after
/// the engine is disposed. Like the engine, it is bound to the thread
/// that created it.
///
/// The only inspection offered is its display form via [`fmt::Display`].
pub struct Value {
    handle: NativeHandle<ValueHandle>,
}

impl Value {
    /// Wrap a value handle returned by the native side.
    pub(crate) fn from_raw(raw: ValuePtr) -> Result<Self, BridgeError> {
        Ok(Self {
            handle: NativeHandle::new(raw, jsb_dispose_value, "value")?,
        })
    }

    /// Release the native value now.
    ///
    /// Returns `true` if this call released it. Dropping the value releases
    /// it too; calling this first is never required.
    pub fn dispose(&mut self) -> bool {
        self.handle.release()
    }

    /// Returns `true` once the native value has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }
}

impl fmt::Display for Value {
    #[allow(unsafe_code)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(ptr) = self.handle.get() else {
            return f.write_str("<disposed>");
        };

        // SAFETY: `ptr` is live for as long as `self.handle` is, and the
        // returned string is ours to release.
        let text = unsafe { take_string(jsb_value_to_string(ptr.as_ptr())) };
        f.write_str(text.as_deref().unwrap_or_default())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
