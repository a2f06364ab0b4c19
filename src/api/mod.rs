use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{ApiError, AuthError};
use crate::session::SessionHandle;
use crate::telemetry::redact_secrets;

pub mod auth;
pub mod types;

use types::*;

/// HTTP transport shared by every backend call.
///
/// Authenticated requests carry the session's bearer token plus the
/// `user-id` and `level` headers the backend uses for personalisation. A 401
/// triggers exactly one token refresh and one retry.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: Config,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self> {
        let client = Client::builder()
            .read_timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
            session,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base(), path)
    }

    pub fn ai_url(&self, path: &str) -> String {
        format!("{}{}", self.config.ai_base(), path)
    }

    /// Send an authenticated request, refreshing the session once on 401.
    ///
    /// The response is returned whatever its status; use [`ensure_success`]
    /// or [`ApiClient::send_json`] to turn error statuses into `ApiError`s.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let response = self.dispatch(request, true).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(if self.session.access_token().is_some() {
                AuthError::SessionExpired.into()
            } else {
                AuthError::NotSignedIn.into()
            });
        };

        debug!("Access token rejected, refreshing session");
        if let Err(e) = self.refresh(&refresh_token).await {
            warn!("Session refresh failed: {:#}", e);
            self.session.clear();
            return Err(AuthError::SessionExpired.into());
        }

        let retry = self.dispatch(request, true).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(AuthError::SessionExpired.into());
        }
        Ok(retry)
    }

    /// Send an authenticated request and decode a successful JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = ensure_success(self.send(request).await?).await?;
        decode_json(response).await
    }

    /// Build and send one attempt of `request`.
    pub(crate) async fn dispatch(&self, request: &ApiRequest, authorize: bool) -> Result<Response> {
        debug!("{} {}", request.method, redact_secrets(&request.url));

        let mut url = url::Url::parse(&request.url)
            .with_context(|| format!("Invalid request URL {}", request.url))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("Content-Type", "application/json");

        if authorize {
            let session = self.session.snapshot();
            if let Some(token) = &session.access_token {
                builder = builder.bearer_auth(token);
            }
            if let Some(user_id) = &session.user_id {
                builder = builder.header("user-id", user_id);
            }
            if let Some(level) = &session.level {
                builder = builder.header("level", level);
            }
        }

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if !request.streaming {
            builder = builder.timeout(Duration::from_secs(self.config.request_timeout_secs));
        }

        builder
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e).into())
    }
}

/// Turn a non-2xx response into `ApiError::HttpStatus`.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(ApiError::HttpStatus {
        status: status.as_u16(),
        message: ErrorBody::extract(&text),
    }
    .into())
}

/// Read a body as JSON, reporting the raw text on failure.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::from_reqwest(&e))?;
    serde_json::from_str(&text).map_err(|e| {
        ApiError::Parse(format!(
            "{} (body: {})",
            e,
            text.chars().take(200).collect::<String>()
        ))
        .into()
    })
}
