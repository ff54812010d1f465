//! Protocol frames accepted by `jsb_send`.
//!
//! A frame is a JSON object with a numeric `id` and a string `method`,
//! the shape of an inspector protocol request.

use std::ffi::c_int;

use crate::status;

/// A protocol request delivered to a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Request id chosen by the sender.
    pub id: u64,

    /// Protocol method, e.g. `Runtime.enable`.
    pub method: String,

    /// Method parameters, `Null` when absent.
    pub params: serde_json::Value,
}

impl Frame {
    /// Parse a raw payload into a frame.
    ///
    /// Returns the status code to report on failure.
    pub fn parse(payload: &[u8]) -> Result<Self, c_int> {
        if payload.is_empty() {
            return Err(status::EMPTY_MESSAGE);
        }

        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|_| status::MALFORMED_MESSAGE)?;

        let id = value
            .get("id")
            .and_then(serde_json::Value::as_u64)
            .ok_or(status::MALFORMED_MESSAGE)?;
        let method = value
            .get("method")
            .and_then(serde_json::Value::as_str)
            .ok_or(status::MALFORMED_MESSAGE)?
            .to_string();
        let params = value.get("params").cloned().unwrap_or_default();

        Ok(Self { id, method, params })
    }
}
