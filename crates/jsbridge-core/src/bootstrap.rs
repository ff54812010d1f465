//! Process-wide engine initialization.
//!
//! The engine can be initialized once per process and never torn down.
//! [`ensure_initialized`] runs that initialization the first time it is
//! called; concurrent callers block until it has finished.

use std::sync::Once;

use tracing::{info, warn};

use jsbridge_sys::{jsb_init, status};

use crate::resolver::resolve_module;

static INIT: Once = Once::new();

/// Initialize the engine runtime if nobody has yet.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        let code = jsb_init(resolve_module);
        if code == status::OK {
            info!("Script engine runtime initialized");
        } else {
            warn!(
                code,
                status = status::describe(code),
                "Script engine runtime was initialized outside the bridge"
            );
        }
    });
}

/// Returns `true` once [`ensure_initialized`] has completed.
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_idempotent() {
        ensure_initialized();
        ensure_initialized();
        assert!(is_initialized());
    }

    #[test]
    fn test_concurrent_callers() {
        let handles: Vec<_> = (0..8).map(|_| thread::spawn(ensure_initialized)).collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(is_initialized());
    }
}
