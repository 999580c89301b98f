//! Stream transport
//!
//! [`StreamTransport`]는 요청을 보내고 응답 본문을 바이트 스트림으로 돌려주는 trait입니다.
//! 기본 구현은 reqwest 기반의 [`HttpTransport`]입니다. 테스트에서는 임의의
//! 청크를 흘려보내는 transport로 교체할 수 있습니다.

use crate::error::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use herd_foundation::StreamConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use std::pin::Pin;

/// Body of an open response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

// ============================================================================
// StreamRequest
// ============================================================================

/// One streaming request
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub url: String,
    pub method: Method,
    /// Applied after configured defaults, so these win
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl StreamRequest {
    /// POST with no body
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            ..Self::post(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with a matching content type
    pub fn json(self, payload: &serde_json::Value) -> Self {
        self.header(CONTENT_TYPE.as_str(), "application/json")
            .body(payload.to_string())
    }
}

// ============================================================================
// StreamTransport
// ============================================================================

#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Send the request; resolves once response headers are in
    async fn connect(&self, request: &StreamRequest) -> Result<ByteStream, StreamError>;
}

// ============================================================================
// HttpTransport
// ============================================================================

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: StreamConfig,
}

impl HttpTransport {
    pub fn new(config: StreamConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: StreamConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Accept, then User-Agent, then configured defaults, then request headers
    fn build_headers(&self, request: &StreamRequest) -> Result<HeaderMap, StreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&self.config.accept)?);

        if let Some(ua) = &self.config.user_agent {
            headers.insert(USER_AGENT, header_value(ua)?);
        }

        let defaults = self
            .config
            .default_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()));
        let overrides = request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));

        for (name, value) in defaults.chain(overrides) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StreamError::InvalidRequest(format!("header '{}': {}", name, e)))?;
            headers.insert(name, header_value(value)?);
        }

        Ok(headers)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, StreamError> {
    HeaderValue::from_str(value)
        .map_err(|e| StreamError::InvalidRequest(format!("header value '{}': {}", value, e)))
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn connect(&self, request: &StreamRequest) -> Result<ByteStream, StreamError> {
        let headers = self.build_headers(request)?;

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!(method = %request.method, url = %request.url, "Opening stream");

        let response = builder.send().await.map_err(StreamError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "Stream rejected");
            return Err(StreamError::from_http_status(status.as_u16(), &body));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Read(e.to_string())));
        Ok(Box::pin(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = StreamRequest::post("http://localhost/recommend")
            .json(&serde_json::json!({"goat": 12}));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(r#"{"goat":12}"#));
        assert_eq!(
            request.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );

        assert_eq!(StreamRequest::get("http://x").method, Method::GET);
    }

    #[test]
    fn test_header_precedence() {
        let mut config = StreamConfig::default();
        config.user_agent = Some("herd-test".into());
        config
            .default_headers
            .insert("Authorization".into(), "Bearer default".into());
        let transport = HttpTransport::new(config);

        let request = StreamRequest::post("http://x")
            .header("authorization", "Bearer override")
            .header("Accept", "application/x-ndjson");
        let headers = transport.build_headers(&request).unwrap();

        assert_eq!(headers["authorization"], "Bearer override");
        assert_eq!(headers[ACCEPT], "application/x-ndjson");
        assert_eq!(headers[USER_AGENT], "herd-test");
        assert_eq!(headers.get_all("authorization").iter().count(), 1);
    }

    #[test]
    fn test_default_accept() {
        let headers = HttpTransport::default()
            .build_headers(&StreamRequest::post("http://x"))
            .unwrap();
        assert_eq!(headers[ACCEPT], "text/event-stream");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let request = StreamRequest::post("http://x").header("bad header", "v");
        let err = HttpTransport::default().build_headers(&request).unwrap_err();
        assert!(matches!(err, StreamError::InvalidRequest(_)));
    }
}
