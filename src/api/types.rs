use reqwest::Method;
use serde::{Deserialize, Serialize};

/// A replayable description of one HTTP call.
///
/// Authenticated calls may be sent twice (after a token refresh), so the
/// request is kept as data and turned into a `reqwest::RequestBuilder` per
/// attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Body is read incrementally; only the idle read timeout applies
    pub streaming: bool,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            streaming: false,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

/// `{ "job_id": "..." }` returned by run and submit endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmitted {
    pub job_id: Option<String>,
}

/// Error payload most endpoints send alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message from a raw error body.
    pub fn extract(raw: &str) -> String {
        serde_json::from_str::<ErrorBody>(raw)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| raw.trim().to_string())
    }
}
