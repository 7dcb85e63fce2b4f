//! reqwest-backed [`ApiCaller`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, trace};
use url::Url;

use ferrogram_core::{ApiError, ApiResult, InputFile, Params, TransportError, TransportResult};

use super::caller::ApiCaller;

/// [`ApiCaller`] over HTTPS.
///
/// Plain calls are `GET` requests with form-urlencoded query parameters.
/// Calls carrying uploads are multipart `POST`s; their plain parameters stay
/// in the query string.
pub struct HttpApiCaller {
    client: Client,
    api_url: Url,
    token: String,
    request_timeout: Duration,
}

impl HttpApiCaller {
    /// Creates a caller for the bot identified by `token`.
    ///
    /// `request_timeout` bounds every call; long polls get their own
    /// `timeout` parameter added on top.
    pub fn new(
        api_url: &str,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let api_url = Url::parse(api_url).map_err(|e| TransportError::ConnectionFailed {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = ClientBuilder::new()
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            token: token.into(),
            request_timeout,
        })
    }

    fn base(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }

    /// The full URL of `method` with `params` as its query string.
    pub fn method_url(&self, method: &str, params: &Params) -> Url {
        let mut url = self.api_url.clone();
        let path = format!(
            "{}/bot{}/{method}",
            url.path().trim_end_matches('/'),
            self.token
        );
        url.set_path(&path);
        let query = params.to_query_string();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        url
    }

    /// The method URL with the token masked, safe to log.
    fn redacted(&self, method: &str) -> String {
        format!("{}/bot<token>/{method}", self.base())
    }

    fn timeout_for(&self, params: &Params) -> Duration {
        let long_poll = params
            .get("timeout")
            .and_then(|t| t.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_default();
        self.request_timeout + long_poll
    }

    async fn multipart(params: &Params) -> ApiResult<Form> {
        let mut form = Form::new();
        for (field, file) in params.uploads() {
            let part = match file {
                InputFile::Bytes { name, data } => Part::bytes(data.clone()).file_name(name.clone()),
                InputFile::Path(path) => {
                    let data = tokio::fs::read(path).await.map_err(|e| {
                        ApiError::InvalidInput(format!("cannot read {}: {e}", path.display()))
                    })?;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| field.clone());
                    Part::bytes(data).file_name(name)
                }
                InputFile::Url(_) | InputFile::FileId(_) => continue,
            };
            form = form.part(field.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ApiCaller for HttpApiCaller {
    async fn call_raw(&self, method: &str, params: Params) -> ApiResult<Bytes> {
        let url = self.method_url(method, &params);
        let timeout = self.timeout_for(&params);

        let request = if params.has_uploads() {
            trace!(method = %method, parts = params.uploads().len(), "Uploading files");
            self.client.post(url).multipart(Self::multipart(&params).await?)
        } else {
            self.client.get(url)
        };

        let failed = |e: reqwest::Error| {
            ApiError::Transport(TransportError::ConnectionFailed {
                url: self.redacted(method),
                reason: e.without_url().to_string(),
            })
        };

        let response = request.timeout(timeout).send().await.map_err(failed)?;
        let status = response.status();
        let body = response.bytes().await.map_err(failed)?;

        debug!(
            method = %method,
            status = status.as_u16(),
            len = body.len(),
            "API call completed",
        );
        Ok(body)
    }

    fn file_link(&self, file_path: &str) -> Option<String> {
        Some(format!("{}/file/bot{}/{file_path}", self.base(), self.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_API_URL;

    fn caller(api: &str) -> HttpApiCaller {
        HttpApiCaller::new(api, "123:abc", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_method_url() {
        let caller = caller(DEFAULT_API_URL);
        let params = Params::new().with("chat_id", 42).with("text", "a b&c");
        assert_eq!(
            caller.method_url("sendMessage", &params).as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage?chat_id=42&text=a+b%26c"
        );
        assert_eq!(
            caller.method_url("getMe", &Params::new()).as_str(),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }

    #[test]
    fn test_custom_api_url_with_path() {
        let caller = caller("http://localhost:8081/proxy/");
        assert_eq!(
            caller.method_url("getMe", &Params::new()).as_str(),
            "http://localhost:8081/proxy/bot123:abc/getMe"
        );
    }

    #[test]
    fn test_file_link() {
        assert_eq!(
            caller(DEFAULT_API_URL).file_link("photos/file_1.jpg").as_deref(),
            Some("https://api.telegram.org/file/bot123:abc/photos/file_1.jpg")
        );
    }

    #[test]
    fn test_long_poll_extends_timeout() {
        let caller = caller(DEFAULT_API_URL);
        assert_eq!(caller.timeout_for(&Params::new()), Duration::from_secs(5));
        assert_eq!(
            caller.timeout_for(&Params::new().with("timeout", 30)),
            Duration::from_secs(35)
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(HttpApiCaller::new("not a url", "t", Duration::from_secs(1)).is_err());
    }

    #[cfg(feature = "http-server")]
    #[tokio::test]
    async fn test_call_against_local_server() {
        use std::sync::Arc;

        use http::StatusCode;

        use crate::http::{HttpRequest, HttpResponse};
        use crate::server::{HttpServer, ServerOptions};

        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), ServerOptions::default())
            .await
            .unwrap();
        server.router().register(
            "127.0.0.1",
            "/bot123:abc/getMe",
            Arc::new(|request: &HttpRequest, response: &mut HttpResponse| {
                assert_eq!(request.method, "GET");
                response.set_status(StatusCode::OK);
                response.set_header("Content-Type", "application/json");
                response.set_body(r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"B"}}"#);
            }),
        );

        let caller = caller(&format!("http://{}", server.local_addr()));
        let me = caller.call("getMe", Params::new()).await.unwrap();
        assert_eq!(me["id"], 7);
    }

    #[cfg(feature = "http-server")]
    #[tokio::test]
    async fn test_upload_is_multipart_post() {
        use std::sync::Arc;

        use http::StatusCode;
        use parking_lot::Mutex;

        use crate::http::{HttpRequest, HttpResponse};
        use crate::server::{HttpServer, ServerOptions};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"quarterly numbers").unwrap();

        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), ServerOptions::default())
            .await
            .unwrap();
        let received: Arc<Mutex<Option<HttpRequest>>> = Arc::new(Mutex::new(None));
        let seen = received.clone();
        server.router().register(
            "127.0.0.1",
            "/bot123:abc/sendDocument",
            Arc::new(move |request: &HttpRequest, response: &mut HttpResponse| {
                *seen.lock() = Some(request.clone());
                response.set_status(StatusCode::OK);
                response.set_body(r#"{"ok":true,"result":true}"#);
            }),
        );

        let mut params = Params::new().with("chat_id", 42);
        params.push_file("document", InputFile::path(&path));
        let caller = caller(&format!("http://{}", server.local_addr()));
        caller.call("sendDocument", params).await.unwrap();

        let request = received.lock().take().unwrap();
        assert_eq!(request.method, "POST");
        assert!(request.url.ends_with("/sendDocument?chat_id=42"));
        assert!(
            request
                .header("Content-Type")
                .unwrap()
                .starts_with("multipart/form-data; boundary=")
        );
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains(r#"name="document"; filename="report.txt""#));
        assert!(body.contains("quarterly numbers"));
        assert!(!body.contains("chat_id"));
    }
}
