//! Query execution over a JSON HTTP endpoint.
//!
//! Wire format:
//! - `POST {base}/query` with `{"sql": "..."}`, answered by
//!   `{"rows": [[..], ..], "message": "..", "changes": 0}` or `{"error": ".."}`
//! - `GET {base}/health` for the connectivity check

use sqlrec_core::error::RecError;
use sqlrec_core::service::QueryService;
use sqlrec_core::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    sql: &'a str,
}

/// Successful responses may still report a backend error in-band.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    response: QueryResponse,
}

fn decode(body: &str) -> Result<QueryResponse, RecError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    match envelope.error {
        Some(error) => Err(RecError::query(error)),
        None => Ok(envelope.response),
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> RecError {
    let message = format!("HTTP {}: {}", status, body.trim());
    match status.as_u16() {
        401 | 403 => RecError::authentication(message),
        429 => RecError::rate_limit(message),
        408 | 504 => RecError::timeout(message),
        _ => RecError::query(message),
    }
}

fn send_error(e: reqwest::Error) -> RecError {
    if e.is_timeout() {
        RecError::timeout(e.to_string())
    } else {
        RecError::Network(e)
    }
}

/// Query service client for a JSON SQL endpoint
#[derive(Clone)]
pub struct HttpQueryService {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    info: Arc<ServiceInfo>,
}

impl std::fmt::Debug for HttpQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQueryService")
            .field("base_url", &self.base_url)
            .field("info", &self.info)
            .finish()
    }
}

impl HttpQueryService {
    /// Create a builder
    pub fn builder() -> HttpQueryBuilder {
        HttpQueryBuilder::default()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    fn info(&self) -> Arc<ServiceInfo> {
        self.info.clone()
    }

    async fn connect(&self) -> Result<String, RecError> {
        let resp = self
            .authorize(self.client.get(self.url("health")))
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(self.base_url.clone())
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError> {
        let resp = self
            .authorize(self.client.post(self.url("query")))
            .json(&QueryBody { sql })
            .send()
            .await
            .map_err(send_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(send_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        decode(&body)
    }
}

/// Builder for the HTTP query service
#[derive(Default)]
pub struct HttpQueryBuilder {
    base_url: Option<String>,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpQueryBuilder {
    /// Set base URL (required)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the client-side request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the service
    pub fn build(self) -> Result<HttpQueryService, RecError> {
        let base_url = self
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RecError::configuration("query service base URL is required"))?;

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|e| RecError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpQueryService {
            client,
            base_url,
            bearer_token: self.bearer_token,
            info: Arc::new(ServiceInfo {
                id: "http-sql".to_string(),
                name: "HTTP SQL endpoint".to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP exchange and hand back the raw request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });

        (base, handle)
    }

    #[test]
    fn test_builder_requires_base_url() {
        assert!(matches!(
            HttpQueryService::builder().build(),
            Err(RecError::Configuration(_))
        ));
        assert!(matches!(
            HttpQueryService::builder().base_url("  ").build(),
            Err(RecError::Configuration(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let service = HttpQueryService::builder()
            .base_url("http://localhost:8080/api/")
            .build()
            .unwrap();
        assert_eq!(service.url("query"), "http://localhost:8080/api/query");
    }

    #[test]
    fn test_decode_in_band_error() {
        let err = decode(r#"{"error": "column \"budjet\" does not exist"}"#).unwrap_err();
        assert!(err.to_string().contains("budjet"));

        let ok = decode(r#"{"rows": [[1], [2]], "changes": 0}"#).unwrap();
        assert_eq!(ok.rows.len(), 2);
        assert_eq!(ok.changes, Some(0));
    }

    #[test]
    fn test_status_error_classification() {
        let bad = status_error(reqwest::StatusCode::BAD_REQUEST, " syntax error ");
        assert_eq!(bad.to_string(), "Query service error: HTTP 400 Bad Request: syntax error");
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, ""),
            RecError::Authentication(_)
        ));
        assert!(status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }

    #[tokio::test]
    async fn test_execute_sql_round_trip() {
        let (base, server) = serve_once("200 OK", r#"{"rows": [[12, "Engineering"]]}"#).await;
        let service = HttpQueryService::builder()
            .base_url(base)
            .bearer_token("secret")
            .build()
            .unwrap();

        let response = service.execute_sql("SELECT 12;").await.unwrap();
        assert_eq!(response.rows, vec![vec![serde_json::json!(12), serde_json::json!("Engineering")]]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /query HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.ends_with(r#"{"sql":"SELECT 12;"}"#));
    }

    #[tokio::test]
    async fn test_execute_sql_bad_request_keeps_backend_text() {
        let (base, server) = serve_once(
            "400 Bad Request",
            "function jsonb_array_elements_text(text) does not exist",
        )
        .await;
        let service = HttpQueryService::builder().base_url(base).build().unwrap();

        let err = service.execute_sql("SELECT 1;").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400 Bad Request"));
        assert!(message.contains("jsonb_array_elements_text"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_hits_health() {
        let (base, server) = serve_once("200 OK", "{}").await;
        let service = HttpQueryService::builder().base_url(base.clone()).build().unwrap();

        assert_eq!(service.connect().await.unwrap(), base);
        assert!(server.await.unwrap().starts_with("GET /health HTTP/1.1"));
    }
}
