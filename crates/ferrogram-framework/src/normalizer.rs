//! Turns raw response bodies into typed [`Update`]s.
//!
//! Two shapes arrive:
//!
//! - a `getUpdates` envelope, `{"ok": true, "result": [update, ...]}`
//! - a single webhook delivery, `{"update_id": ..., "message": {...}}`
//!
//! A malformed element is logged and skipped; the rest of the batch still
//! decodes.

use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use ferrogram_core::{DecodeError, Document, Update};

/// Errors that reject a whole body.
#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    /// The body is not a JSON document.
    #[error(transparent)]
    Malformed(#[from] DecodeError),

    /// The envelope reported `ok: false`.
    #[error("API rejected the request ({code}): {description}")]
    NotOk {
        /// `error_code` of the envelope, `0` when absent.
        code: i64,
        /// `description` of the envelope, empty when absent.
        description: String,
    },

    /// The envelope's `result` is not a list of updates.
    #[error("envelope has no update list")]
    MissingResult,
}

/// The decoded updates of one body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Updates in delivery order.
    pub updates: Vec<Update>,
    /// Elements that failed to decode.
    pub skipped: usize,
    /// `update_id`s of skipped elements that still carried one.
    pub skipped_ids: Vec<u64>,
}

impl Normalized {
    fn decode(&mut self, item: &Value) {
        match Update::from_document(item) {
            Ok(update) => self.updates.push(update),
            Err(e) => {
                let update_id = Document::new(item).u64("update_id");
                warn!(error = %e, ?update_id, "Dropping undecodable update");
                self.skipped += 1;
                self.skipped_ids.extend(update_id);
            }
        }
    }

    /// Highest `update_id` of the body, decoded or not.
    pub fn max_update_id(&self) -> Option<u64> {
        self.updates
            .iter()
            .map(|update| update.update_id)
            .chain(self.skipped_ids.iter().copied())
            .max()
    }
}

/// Decodes `raw` as a batch envelope, or as one update when `single`.
pub fn normalize(raw: &[u8], single: bool) -> Result<Normalized, NormalizeError> {
    let value: Value = serde_json::from_slice(raw).map_err(DecodeError::from)?;

    if single {
        let mut normalized = Normalized::default();
        normalized.decode(&value);
        return Ok(normalized);
    }

    let doc = Document::new(&value);
    if doc.bool("ok") != Some(true) {
        let code = doc.i64("error_code").unwrap_or_default();
        let description = doc.str("description").unwrap_or_default().to_string();
        error!(code, description = %description, "getUpdates failed");
        return Err(NormalizeError::NotOk { code, description });
    }

    let Some(items) = doc.get("result").and_then(Value::as_array) else {
        return Err(NormalizeError::MissingResult);
    };

    let mut normalized = Normalized::default();
    for item in items {
        normalized.decode(item);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrogram_core::UpdateKind;

    #[test]
    fn test_batch_in_delivery_order() {
        let raw = br#"{"ok":true,"result":[
            {"update_id":5,"inline_query":{"id":"q","from":{"id":1,"first_name":"A"},"query":"x","offset":""}},
            {"update_id":7,"poll":{}},
            {"update_id":6,"callback_query":{"id":"c","from":{"id":1,"first_name":"A"},"data":"d"}}
        ]}"#;
        let normalized = normalize(raw, false).unwrap();
        let ids: Vec<u64> = normalized.updates.iter().map(|u| u.update_id).collect();
        assert_eq!(ids, vec![5, 7, 6]);
        assert_eq!(normalized.updates[0].kind(), Some(UpdateKind::InlineQuery));
        assert_eq!(normalized.updates[1].kind(), None);
        assert_eq!(normalized.skipped, 0);
    }

    #[test]
    fn test_bad_element_is_skipped() {
        let raw = br#"{"ok":true,"result":[{"message":{}},{"update_id":2}]}"#;
        let normalized = normalize(raw, false).unwrap();
        assert_eq!(normalized.updates.len(), 1);
        assert_eq!(normalized.skipped, 1);
        assert!(normalized.skipped_ids.is_empty());
        assert_eq!(normalized.max_update_id(), Some(2));
    }

    #[test]
    fn test_skipped_element_keeps_its_update_id() {
        let raw = br#"{"ok":true,"result":[{"update_id":10,"message":{"message_id":1}},{"update_id":4}]}"#;
        let normalized = normalize(raw, false).unwrap();
        assert_eq!(normalized.skipped, 1);
        assert_eq!(normalized.skipped_ids, vec![10]);
        assert_eq!(normalized.max_update_id(), Some(10));

        let single = normalize(br#"{"update_id":12,"message":{"message_id":1}}"#, true).unwrap();
        assert!(single.updates.is_empty());
        assert_eq!(single.skipped_ids, vec![12]);
    }

    #[test]
    fn test_not_ok_envelope() {
        let raw = br#"{"ok":false,"error_code":409,"description":"Conflict: webhook is active"}"#;
        match normalize(raw, false) {
            Err(NormalizeError::NotOk { code, description }) => {
                assert_eq!(code, 409);
                assert!(description.starts_with("Conflict"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_single_update_ignores_envelope_rules() {
        let raw = br#"{"update_id":11,"message":{"message_id":1,"date":0,"chat":{"id":1,"type":"private"},"text":"hi"}}"#;
        let normalized = normalize(raw, true).unwrap();
        assert_eq!(normalized.updates[0].update_id, 11);
        assert_eq!(normalized.updates[0].route_text(), Some("hi"));
    }

    #[test]
    fn test_garbage_body() {
        assert!(matches!(
            normalize(b"{oops", true),
            Err(NormalizeError::Malformed(_))
        ));
        assert!(matches!(
            normalize(br#"{"ok":true}"#, false),
            Err(NormalizeError::MissingResult)
        ));
    }
}
