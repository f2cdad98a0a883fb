// HTTP client for the book backend.
//
// Wraps a single reqwest client with a per-request timeout. Every call
// resolves to parsed JSON on 2xx and to a typed `ApiError` otherwise;
// transport failures are never swallowed.

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use bookshelf_core::config::{ApiConfig, API_VERSION_PREFIX};

use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

pub const SIGNUP_PATH: &str = "/auth/signup";
pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/auth/profile";
pub const BACKGROUND_PATH: &str = "/auth/profile/background";
pub const CHAT_PATH: &str = "/chat";
pub const SEARCH_PATH: &str = "/query";

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (no `/api/v1` suffix).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(config.resolved_base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path such as `/auth/login`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_VERSION_PREFIX, path)
    }

    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, self.endpoint(path))
            .header("content-type", "application/json");
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send `req` and decode a 2xx JSON body into `T`. `label` names the
    /// call in logs and in the fallback error message ("Login failed").
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        label: &str,
    ) -> Result<T, ApiError> {
        let body = self.send(req, label).await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(call = label, error = %e, "response body did not match expected shape");
            ApiError::Decode(e.to_string())
        })
    }

    /// Send `req` and return the raw body of a 2xx response.
    pub(crate) async fn send(&self, req: RequestBuilder, label: &str) -> Result<String, ApiError> {
        let response = req.send().await.map_err(|e| {
            warn!(call = label, error = %e, "request failed before a response arrived");
            ApiError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from)?;
        debug!(call = label, status = status.as_u16(), "response received");

        if status.is_success() {
            Ok(body)
        } else {
            let err = ApiError::from_status(status.as_u16(), &body, &format!("{label} failed"));
            warn!(call = label, status = status.as_u16(), error = %err, "request rejected");
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Test support: a one-shot HTTP responder on a loopback port
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// What the server saw.
    #[derive(Debug)]
    pub struct Captured {
        pub request_line: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Captured {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    fn reason(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            409 => "Conflict",
            429 => "Too Many Requests",
            _ => "Internal Server Error",
        }
    }

    /// Serve exactly one request with `status` and `body`. Returns the base
    /// URL to point a client at and a receiver for the captured request.
    pub async fn respond_once(status: u16, body: &str) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                reason(status),
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            let _ = tx.send(captured);
        });

        (format!("http://{addr}"), rx)
    }

    /// Accept a connection and never answer it.
    pub async fn never_respond() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(stream);
        });
        format!("http://{addr}")
    }

    /// A loopback address nothing is listening on.
    pub async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break buf.len();
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

        Captured {
            request_line,
            headers,
            body,
        }
    }
}
