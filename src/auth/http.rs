//! Auth gateway backed by a Supabase-style REST API.
//!
//! Endpoints:
//! - `POST /auth/v1/otp` sends a code by SMS or email
//! - `POST /auth/v1/verify` checks it and returns the session
//! - `POST /functions/v1/check-user-exists` answers `{"exists": bool}`
//! - `POST /auth/v1/logout` ends the session
//!
//! Every request carries the `apikey` header and a bearer token: the
//! session's access token for logout, the anon key otherwise.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{AccountStatus, AuthGateway, OtpTarget, SessionStore, SessionToken, VerifiedSession};
use crate::config::AuthConfig;
use crate::error::GatewayError;

pub struct HttpAuthGateway {
    base_url: String,
    anon_key: SecretString,
    sessions: Arc<dyn SessionStore>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<VerifyUser>,
}

#[derive(Debug, Deserialize)]
struct VerifyUser {
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    exists: bool,
}

impl HttpAuthGateway {
    /// `sessions` supplies the access token sent on logout.
    pub fn new(config: &AuthConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            sessions,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body with `bearer` as the authorization token and return
    /// the raw response text on 2xx.
    async fn post(
        &self,
        operation: &str,
        path: &str,
        body: serde_json::Value,
        bearer: &SecretString,
    ) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(self.url(path))
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                operation: operation.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(operation, status = status.as_u16(), "Auth provider rejected request");
            return Err(GatewayError::Rejected {
                operation: operation.into(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn otp_body(target: &OtpTarget) -> serde_json::Value {
    match target {
        OtpTarget::Phone(phone) => json!({ "phone": phone }),
        OtpTarget::Email(email) => json!({ "email": email }),
    }
}

fn verify_body(target: &OtpTarget, code: &str) -> serde_json::Value {
    match target {
        OtpTarget::Phone(phone) => json!({ "type": "sms", "phone": phone, "token": code }),
        OtpTarget::Email(email) => json!({ "type": "email", "email": email, "token": code }),
    }
}

/// Parse a verify response. A 2xx with no body or no tokens still counts as
/// verified; only the session is missing.
fn parse_verify(text: &str) -> Result<VerifiedSession, GatewayError> {
    if text.trim().is_empty() {
        return Ok(VerifiedSession::default());
    }
    let parsed: VerifyResponse =
        serde_json::from_str(text).map_err(|e| GatewayError::InvalidResponse {
            operation: "verify_otp".into(),
            reason: e.to_string(),
        })?;

    let status = parsed
        .user
        .as_ref()
        .and_then(|u| u.user_metadata.as_ref())
        .and_then(|m| m.get("status"))
        .and_then(|s| s.as_str());
    let token = match (parsed.access_token, parsed.refresh_token) {
        (Some(access), Some(refresh)) => Some(SessionToken {
            access_token: SecretString::from(access),
            refresh_token: SecretString::from(refresh),
        }),
        _ => None,
    };
    Ok(VerifiedSession {
        token,
        account: AccountStatus::from_provider(status),
    })
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_otp(&self, target: &OtpTarget) -> Result<(), GatewayError> {
        self.post("send_otp", "/auth/v1/otp", otp_body(target), &self.anon_key)
            .await?;
        tracing::info!(target = %target, "OTP sent");
        Ok(())
    }

    async fn verify_otp(
        &self,
        target: &OtpTarget,
        code: &str,
    ) -> Result<VerifiedSession, GatewayError> {
        let text = self
            .post(
                "verify_otp",
                "/auth/v1/verify",
                verify_body(target, code),
                &self.anon_key,
            )
            .await?;
        parse_verify(&text)
    }

    async fn check_exists(&self, phone: &str) -> Result<bool, GatewayError> {
        let text = self
            .post(
                "check_exists",
                "/functions/v1/check-user-exists",
                json!({ "phone": phone }),
                &self.anon_key,
            )
            .await?;
        let parsed: ExistsResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::InvalidResponse {
                operation: "check_exists".into(),
                reason: e.to_string(),
            })?;
        Ok(parsed.exists)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        let Some(access_token) = self.sessions.access_token().await else {
            tracing::debug!("No provider session to end");
            return Ok(());
        };
        self.post("sign_out", "/auth/v1/logout", json!({}), &access_token)
            .await?;
        Ok(())
    }
}
