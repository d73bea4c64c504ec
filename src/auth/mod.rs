//! Auth provider integration.
//!
//! The onboarding flow only talks to `AuthGateway`; the HTTP implementation
//! targets a Supabase-style REST auth API and the development gateway keeps
//! everything in memory.

pub mod dev;
pub mod http;
pub mod session;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub use dev::DevAuthGateway;
pub use http::HttpAuthGateway;
pub use session::{MemorySessionStore, SessionStore};

/// Where a one-time code is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "address", rename_all = "snake_case")]
pub enum OtpTarget {
    Phone(String),
    Email(String),
}

impl OtpTarget {
    pub fn address(&self) -> &str {
        match self {
            Self::Phone(a) | Self::Email(a) => a,
        }
    }
}

impl std::fmt::Display for OtpTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phone(p) => write!(f, "phone {}", mask(p)),
            Self::Email(e) => write!(f, "email {}", mask(e)),
        }
    }
}

/// Keep the last four characters for logs.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let keep = chars.len().min(4);
    let hidden = chars.len() - keep;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

/// Access/refresh pair returned by a successful verify.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

/// Account standing reported by the provider after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// No profile yet; continue onboarding.
    #[default]
    New,
    PendingApproval,
    Approved,
}

impl AccountStatus {
    /// Map the provider's profile status string.
    pub fn from_provider(status: Option<&str>) -> Self {
        match status {
            Some("approved") => Self::Approved,
            Some("pending_approval") => Self::PendingApproval,
            _ => Self::New,
        }
    }
}

/// Result of a successful verify. The token is absent when the provider
/// accepted the code but returned no session.
#[derive(Debug, Clone, Default)]
pub struct VerifiedSession {
    pub token: Option<SessionToken>,
    pub account: AccountStatus,
}

/// Auth provider contract consumed by the onboarding flow.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Deliver a one-time code.
    async fn send_otp(&self, target: &OtpTarget) -> Result<(), GatewayError>;

    /// Check a one-time code.
    async fn verify_otp(&self, target: &OtpTarget, code: &str)
    -> Result<VerifiedSession, GatewayError>;

    /// Whether the phone number already has an account. Best-effort.
    async fn check_exists(&self, phone: &str) -> Result<bool, GatewayError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;
}
