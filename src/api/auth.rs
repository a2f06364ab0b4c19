//! Sign in, sign up, logout and token refresh.

use anyhow::Result;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use super::types::{ApiRequest, ErrorBody};
use super::{decode_json, ensure_success, ApiClient};
use crate::errors::AuthError;
use crate::session::{AuthTokens, Session};

#[derive(Debug, Clone, Serialize)]
pub struct SignUpForm {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub level: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<()> {
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch.into());
        }
        Ok(())
    }
}

impl ApiClient {
    /// Exchange credentials for tokens and store them in the session.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        let request = ApiRequest::post(self.api_url("/api/auth/signin")).json(serde_json::json!({
            "username": username,
            "password": password,
        }));
        let tokens = self.credential_call(&request).await?;
        self.session().apply_tokens(tokens, Some(username));
        info!(username, "Signed in");
        Ok(self.session().snapshot())
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> Result<Session> {
        form.validate()?;
        let request =
            ApiRequest::post(self.api_url("/api/auth/signup")).json(serde_json::to_value(form)?);
        let tokens = self.credential_call(&request).await?;
        self.session().apply_tokens(tokens, Some(&form.username));
        info!(username = form.username.as_str(), "Signed up");
        Ok(self.session().snapshot())
    }

    /// Revoke the refresh token server side and forget the session locally.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let result = match self.session().refresh_token() {
            Some(refresh_token) => {
                let request = ApiRequest::post(self.api_url("/api/auth/logout"))
                    .query("refreshToken", refresh_token);
                match self.dispatch(&request, true).await {
                    Ok(response) => ensure_success(response).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };
        self.session().clear();
        result
    }

    /// Trade the refresh token for a new access token.
    pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<()> {
        let request = ApiRequest::post(self.api_url("/api/auth/refresh"))
            .query("refreshToken", refresh_token);
        let response = ensure_success(self.dispatch(&request, false).await?).await?;
        let tokens: AuthTokens = decode_json(response).await?;
        self.session().apply_tokens(tokens, None);
        debug!("Token refreshed successfully");
        Ok(())
    }

    async fn credential_call(&self, request: &ApiRequest) -> Result<AuthTokens> {
        let response = self.dispatch(request, false).await?;
        let status = response.status();
        if status.is_client_error() && status != StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            let message = ErrorBody::extract(&text);
            let message = if message.is_empty() {
                "Sign in failed".to_string()
            } else {
                message
            };
            return Err(AuthError::Rejected(message).into());
        }
        decode_json(ensure_success(response).await?).await
    }
}
