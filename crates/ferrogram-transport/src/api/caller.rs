//! The [`ApiCaller`] seam between typed helpers and the wire.
//!
//! | Caller | Strategy |
//! |--------|----------|
//! | [`HttpApiCaller`] | `GET {api}/bot{token}/{method}?{params}`, or a multipart `POST` when files are uploaded. |
//! | test doubles | Record calls and answer from canned bodies. |
//!
//! Every response is an envelope:
//!
//! ```text
//! {"ok": true,  "result": ...}
//! {"ok": false, "error_code": 401, "description": "Unauthorized"}
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use ferrogram_core::{ApiError, ApiResult, DecodeError, Params};

/// Default public endpoint of the bot API.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Issues remote API calls.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Calls `method` and returns the raw response body, envelope included.
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] when no response body was obtained.
    async fn call_raw(&self, method: &str, params: Params) -> ApiResult<Bytes>;

    /// Calls `method` and returns the envelope's `result`.
    ///
    /// # Errors
    /// Returns [`ApiError::Remote`] for `ok: false`, or a transport or
    /// decode error.
    async fn call(&self, method: &str, params: Params) -> ApiResult<Value> {
        let raw = self.call_raw(method, params).await?;
        parse_envelope(&raw)
    }

    /// Absolute download link for a `file_path` returned by `getFile`.
    fn file_link(&self, file_path: &str) -> Option<String> {
        let _ = file_path;
        None
    }
}

/// Unwraps a response envelope into its `result`.
pub fn parse_envelope(raw: &[u8]) -> ApiResult<Value> {
    let mut envelope: Value = serde_json::from_slice(raw)?;
    if !envelope.is_object() {
        return Err(DecodeError::Malformed("response is not an object".into()).into());
    }

    if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null));
    }

    Err(ApiError::Remote {
        code: envelope
            .get("error_code")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
        description: envelope
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_yields_result() {
        let value = parse_envelope(br#"{"ok":true,"result":{"id":1}}"#).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(parse_envelope(br#"{"ok":true}"#).unwrap(), Value::Null);
    }

    #[test]
    fn test_error_envelope_yields_remote_error() {
        let err = parse_envelope(br#"{"ok":false,"error_code":409,"description":"Conflict"}"#)
            .unwrap_err();
        match err {
            ApiError::Remote { code, description } => {
                assert_eq!(code, 409);
                assert_eq!(description, "Conflict");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            parse_envelope(b"<html>"),
            Err(ApiError::Decode(DecodeError::Malformed(_)))
        ));
        assert!(matches!(
            parse_envelope(b"[1]"),
            Err(ApiError::Decode(DecodeError::Malformed(_)))
        ));
    }
}
