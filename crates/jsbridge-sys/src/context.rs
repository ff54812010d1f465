//! Per-context engine state behind a `ContextPtr`.

use std::ffi::c_int;
use std::path::Path;
use std::rc::Rc;

use boa_engine::builtins::promise::PromiseState;
use boa_engine::job::SimpleJobQueue;
use boa_engine::module::Module;
use boa_engine::{Context, JsError, JsValue, Source};
use tracing::debug;

use crate::frame::Frame;
use crate::loader::TokenModuleLoader;
use crate::{ResolveModuleFn, status};

/// An exception copied out of the engine as plain text.
#[derive(Debug, Clone)]
pub(crate) struct Exception {
    pub message: String,
    pub location: String,
    pub stack: String,
}

/// One isolate+context pair.
pub(crate) struct ContextState {
    context: Context,
    loader: Rc<TokenModuleLoader>,
    frames_received: usize,
}

impl ContextState {
    pub(crate) fn new(resolve: ResolveModuleFn) -> Option<Self> {
        let loader = Rc::new(TokenModuleLoader::new(resolve));
        let context = Context::builder()
            .job_queue(Rc::new(SimpleJobQueue::new()))
            .module_loader(loader.clone())
            .build()
            .ok()?;

        Some(Self {
            context,
            loader,
            frames_received: 0,
        })
    }

    /// Evaluate a classic script; the global scope persists between calls.
    pub(crate) fn run(&mut self, source: &str, origin: &str) -> Result<JsValue, Exception> {
        let src = Source::from_bytes(source).with_path(Path::new(origin));
        let result = self.context.eval(src);
        self.context.run_jobs();

        result.map_err(|err| self.exception(&err, origin))
    }

    /// Parse, link and evaluate a module graph rooted at `source`.
    pub(crate) fn load_module(&mut self, source: &str, origin: &str, token: c_int) -> c_int {
        self.loader.begin(token);
        let code = self.evaluate_module(source, origin);
        self.loader.finish();
        code
    }

    fn evaluate_module(&mut self, source: &str, origin: &str) -> c_int {
        let src = Source::from_bytes(source).with_path(Path::new(origin));
        let module = match Module::parse(src, None, &mut self.context) {
            Ok(module) => module,
            Err(err) => {
                let exception = self.exception(&err, origin);
                debug!(origin, error = %exception.message, "module parse failed");
                return status::PARSE_ERROR;
            }
        };
        self.loader.insert_entry(origin, module.clone());

        let promise = module.load_link_evaluate(&mut self.context);
        self.context.run_jobs();

        match promise.state() {
            PromiseState::Fulfilled(_) => status::OK,
            PromiseState::Rejected(reason) => {
                let exception = self.exception(&JsError::from_opaque(reason), origin);
                let code = self
                    .loader
                    .take_failure()
                    .unwrap_or(status::EVALUATION_ERROR);
                debug!(origin, code, error = %exception.message, "module evaluation rejected");
                code
            }
            PromiseState::Pending => status::EVALUATION_PENDING,
        }
    }

    /// Deliver a protocol frame.
    ///
    /// Frames are validated and counted; there is no inspector session to
    /// dispatch them to, so they are not retained.
    pub(crate) fn send(&mut self, payload: &[u8]) -> c_int {
        match Frame::parse(payload) {
            Ok(frame) => {
                debug!(id = frame.id, method = %frame.method, "protocol frame received");
                self.frames_received += 1;
                status::OK
            }
            Err(code) => code,
        }
    }

    pub(crate) fn frames_received(&self) -> usize {
        self.frames_received
    }

    fn exception(&mut self, err: &JsError, origin: &str) -> Exception {
        let mut message = match err.try_native(&mut self.context) {
            Ok(native) => native.to_string(),
            Err(_) => err.to_string(),
        };
        if message.is_empty() {
            message = "Uncaught exception".to_string();
        }

        let location = match source_position(&message) {
            Some((line, column)) => format!("{origin}:{line}:{column}"),
            None => origin.to_string(),
        };
        let stack = format!("{message}\n    at {location}");
        Exception {
            message,
            location,
            stack,
        }
    }
}

/// Line and column from a parser message ending in `at line N, col M`.
fn source_position(message: &str) -> Option<(u32, u32)> {
    let (_, tail) = message.rsplit_once(" at line ")?;
    let (line, column) = tail.split_once(", col ")?;
    let column = column
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();

    Some((line.parse().ok()?, column.parse().ok()?))
}
