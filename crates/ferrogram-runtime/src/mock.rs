//! Scripted [`ApiCaller`] for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use ferrogram_core::{ApiResult, Params};
use ferrogram_transport::ApiCaller;

/// Records every call and answers from per-method scripts.
///
/// Unscripted calls answer `{"ok":true,"result":true}`; unscripted
/// `getUpdates` waits briefly and answers an empty batch.
#[derive(Default)]
pub(crate) struct MockCaller {
    calls: Mutex<Vec<(String, Params)>>,
    scripts: Mutex<HashMap<String, VecDeque<ApiResult<Bytes>>>>,
}

impl MockCaller {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, method: &str, body: &str) {
        self.respond_with(method, Ok(Bytes::from(body.to_string())));
    }

    pub(crate) fn respond_with(&self, method: &str, answer: ApiResult<Bytes>) {
        self.scripts
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(answer);
    }

    pub(crate) fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<Params> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ApiCaller for MockCaller {
    async fn call_raw(&self, method: &str, params: Params) -> ApiResult<Bytes> {
        self.calls.lock().push((method.to_string(), params));
        let scripted = self
            .scripts
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(answer) => answer,
            None if method == "getUpdates" => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Bytes::from_static(br#"{"ok":true,"result":[]}"#))
            }
            None => Ok(Bytes::from_static(br#"{"ok":true,"result":true}"#)),
        }
    }

    fn file_link(&self, file_path: &str) -> Option<String> {
        Some(format!("https://files.test/{file_path}"))
    }
}
