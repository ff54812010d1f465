//! Embedding bridge for the jsbridge script engine.
//!
//! This crate hides the engine's native memory model behind host-owned
//! handles:
//! - [`Engine`]: one isolate+context pair with `run`, `load_module`, `send`
//! - [`Value`]: an opaque value produced by a successful run
//! - [`resolver`]: the token table that lets the engine call back into
//!   host closures while loading modules
//! - [`marshal`]: conversion of raw call results into `Value` or errors
//! - [`bootstrap`]: one-time process-wide runtime initialization
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      bootstrap                          │
//! │  (Once per process, cannot be undone)                   │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Engine                            │
//! │  (Owns one context handle, thread-bound)                │
//! │  - run / load_module / send                             │
//! │  - dispose (idempotent, also on drop)                   │
//! └─────────────────────────────────────────────────────────┘
//!            │                               ▲
//!            ▼                               │ resolve_module(token, ..)
//! ┌───────────────────────┐   ┌─────────────────────────────┐
//! │   marshal → Value     │   │   ResolverRegistry          │
//! │   or ScriptError      │   │   (global, one mutex)       │
//! └───────────────────────┘   └─────────────────────────────┘
//! ```

pub mod bootstrap;
pub mod engine;
pub mod fs_resolver;
pub mod handle;
pub mod marshal;
pub mod resolver;
pub mod value;

pub use engine::Engine;
pub use fs_resolver::FileResolver;
pub use jsbridge_common::{BridgeError, ScriptError};
pub use resolver::{ResolveFn, ResolverGuard, ResolverRegistry, ResolverToken};
pub use value::Value;
