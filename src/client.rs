use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::backend::{ChatBackend, ChunkStream, ModelRequest};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CHUNKS,
};
use crate::sse::process_sse;
use crate::types::{ErrorResponse, GenerateContentRequest, GenerateContentResponse, Model};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Client for the Gemini API.
#[derive(Debug, Clone)]
pub struct Gemini {
    api_key: Option<String>,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl Gemini {
    /// Create a new Gemini client.
    ///
    /// The API key can be provided directly or read from the GEMINI_API_KEY
    /// environment variable, falling back to API_KEY.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => API_KEY_VARS
                .iter()
                .filter_map(|var| env::var(var).ok())
                .find(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    Error::authentication(
                        "API key not provided and neither GEMINI_API_KEY nor API_KEY is set",
                    )
                })?,
        };
        HeaderValue::from_str(&api_key)
            .map_err(|_| Error::authentication("API key contains invalid characters"))?;
        Self::build(Some(api_key), base_url, timeout)
    }

    /// Create a client with no API key.
    ///
    /// Every request fails with an authentication error, which a chat session
    /// reports like any other failed turn.
    pub fn unauthenticated(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        Self::build(None, base_url, timeout)
    }

    fn build(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url).map_err(|e| {
            Error::validation(
                format!("invalid base URL {base_url}: {e}"),
                Some("base_url".to_string()),
            )
        })?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::transport(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// The URL of the streaming endpoint for `model`.
    pub fn stream_url(&self, model: &Model) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("models/{model}:streamGenerateContent"))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::authentication("no API key configured; set GEMINI_API_KEY or API_KEY")
        })?;
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| Error::authentication("API key contains invalid characters"))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::transport(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };
        error_from_status(status_code, &error_body, retry_after)
    }

    /// Stream a reply as parsed response chunks.
    pub async fn stream(
        &self,
        model: &Model,
        request: &GenerateContentRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>> {
        let url = self.stream_url(model)?;
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(%model, contents = request.contents.len(), "starting stream");

        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::transport(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::transport(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "model API rejected request");
            return Err(err);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

#[async_trait]
impl ChatBackend for Gemini {
    async fn stream_reply(&self, request: ModelRequest) -> Result<ChunkStream> {
        let body = request.to_generate_request();
        let responses = self.stream(&request.model, &body).await?;
        let chunks = responses.filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let text = response.text();
                    if text.is_empty() {
                        match response.finish_reason() {
                            Some(reason) if reason.is_blocked() => Some(Err(Error::bad_request(
                                format!("response blocked: {reason:?}"),
                            ))),
                            _ => None,
                        }
                    } else {
                        STREAM_CHUNKS.click();
                        Some(Ok(text))
                    }
                }
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(chunks))
    }
}

/// Map a non-success status and body to an error.
pub(crate) fn error_from_status(status_code: u16, body: &str, retry_after: Option<u64>) -> Error {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error);
    let error_type = detail.as_ref().and_then(|d| d.status.clone());
    let message = detail
        .map(|d| d.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status_code {
        400 => Error::bad_request(message),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 | 502..=504 => Error::server(status_code, message, retry_after),
        _ => Error::api(status_code, error_type, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::history_contents;
    use crate::types::{ChatMessage, KnownModel};

    #[test]
    fn client_creation() {
        let client = Gemini::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key.as_deref(), Some("test-key"));
        assert_eq!(client.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = Gemini::with_options(
            Some("test-key".to_string()),
            Some("http://localhost:8080/v1beta".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:8080/v1beta/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_key_and_url() {
        assert!(Gemini::new(Some("bad\nkey".to_string())).is_err());
        assert!(
            Gemini::with_options(Some("k".to_string()), Some("not a url".to_string()), None)
                .is_err()
        );
    }

    #[test]
    fn stream_url_for_model() {
        let client = Gemini::new(Some("k".to_string())).unwrap();
        let url = client
            .stream_url(&Model::Known(KnownModel::Gemini25Flash))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn headers_carry_api_key() {
        let client = Gemini::new(Some("secret".to_string())).unwrap();
        let headers = client.default_headers().unwrap();
        assert_eq!(headers.get("x-goog-api-key").unwrap(), "secret");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "text/event-stream");
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = error_from_status(429, body, Some(7));
        assert!(err.is_rate_limit());
        assert!(err.to_string().contains("Quota exceeded"));

        assert!(error_from_status(401, "{}", None).is_authentication());
        assert!(error_from_status(403, "nope", None).is_permission());
        assert_eq!(error_from_status(404, "", None).status_code(), Some(404));
        assert!(error_from_status(408, "", None).is_timeout());
        assert!(error_from_status(500, "", None).is_server_error());
        assert!(error_from_status(503, "", None).is_server_error());

        let err = error_from_status(418, r#"{"error":{"code":418,"message":"teapot","status":"TEAPOT"}}"#, None);
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.to_string(), "TEAPOT: teapot");
    }

    #[tokio::test]
    async fn unauthenticated_client_fails_each_request() {
        let client = Gemini::unauthenticated(Some("http://127.0.0.1:9/".to_string()), None).unwrap();
        assert!(client.default_headers().unwrap_err().is_authentication());
        let request = ModelRequest::new(
            Model::Known(KnownModel::Gemini25Flash),
            history_contents(&[ChatMessage::user("hello")], Vec::new()),
        );
        let err = match client.stream_reply(request).await {
            Ok(_) => panic!("request without a key should fail"),
            Err(err) => err,
        };
        assert!(err.is_authentication(), "{err}");
    }

    #[tokio::test]
    #[ignore = "requires GEMINI_API_KEY and network access"]
    async fn live_stream_reply() {
        if env::var("GEMINI_API_KEY").is_err() {
            return;
        }
        let client = Gemini::new(None).unwrap();
        let history = vec![ChatMessage::user("Reply with the single word: pong")];
        let request = ModelRequest::new(
            Model::Known(KnownModel::Gemini25Flash),
            history_contents(&history, Vec::new()),
        );
        let mut stream = client.stream_reply(request).await.unwrap();
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk.unwrap());
        }
        assert!(!text.is_empty());
    }
}
