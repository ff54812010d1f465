//! Owned native handles.
//!
//! [`NativeHandle`] wraps a pointer handed out by the native call surface
//! together with the function that releases it. It is neither `Clone` nor
//! `Copy`, so exactly one owner can release it, and release is idempotent:
//! the pointer is taken out on the first call and later calls are no-ops.
//! Using a released handle yields [`BridgeError::Disposed`] instead of
//! touching freed memory.

use std::ptr::NonNull;

use tracing::trace;

use jsbridge_common::BridgeError;

/// Function that releases a native resource.
pub type ReleaseFn<T> = unsafe extern "C" fn(*mut T);

/// A single-owner native pointer with a validity flag.
pub struct NativeHandle<T> {
    ptr: Option<NonNull<T>>,
    release: ReleaseFn<T>,
    kind: &'static str,
}

impl<T> NativeHandle<T> {
    /// Take ownership of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NullHandle`] if `raw` is null.
    pub fn new(
        raw: *mut T,
        release: ReleaseFn<T>,
        kind: &'static str,
    ) -> Result<Self, BridgeError> {
        let ptr = NonNull::new(raw).ok_or(BridgeError::NullHandle { what: kind })?;
        Ok(Self {
            ptr: Some(ptr),
            release,
            kind,
        })
    }

    /// The live pointer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Disposed`] once the handle has been released.
    pub fn get(&self) -> Result<NonNull<T>, BridgeError> {
        self.ptr.ok_or(BridgeError::Disposed)
    }

    /// Release the native resource.
    ///
    /// Returns `true` if this call released it, `false` if it was already
    /// released.
    #[allow(unsafe_code)]
    pub fn release(&mut self) -> bool {
        let Some(ptr) = self.ptr.take() else {
            return false;
        };

        // SAFETY: the pointer came from the native side paired with this
        // release function and `take` guarantees it is released only once.
        unsafe { (self.release)(ptr.as_ptr()) };
        trace!(kind = self.kind, "native handle released");
        true
    }

    /// Returns `true` once the handle has been released.
    pub fn is_released(&self) -> bool {
        self.ptr.is_none()
    }
}

impl<T> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
