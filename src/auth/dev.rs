//! In-memory auth gateway for local runs and tests.
//!
//! Every address receives the same fixed code. Registered phone numbers can
//! be seeded with an account status so returning-user paths can be exercised
//! without a provider.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

use super::{AccountStatus, AuthGateway, OtpTarget, SessionToken, VerifiedSession};
use crate::error::GatewayError;

/// Code accepted for every target.
pub const DEV_OTP_CODE: &str = "123456";

#[derive(Default)]
pub struct DevAuthGateway {
    /// Registered accounts by phone or email.
    accounts: RwLock<HashMap<String, AccountStatus>>,
    /// Targets a code has been sent to and not yet consumed.
    outstanding: RwLock<Vec<OtpTarget>>,
}

impl DevAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address with the given standing.
    pub async fn register(&self, address: impl Into<String>, status: AccountStatus) {
        self.accounts.write().await.insert(address.into(), status);
    }
}

#[async_trait]
impl AuthGateway for DevAuthGateway {
    fn name(&self) -> &str {
        "dev"
    }

    async fn send_otp(&self, target: &OtpTarget) -> Result<(), GatewayError> {
        tracing::info!(target = %target, code = DEV_OTP_CODE, "Development OTP issued");
        let mut outstanding = self.outstanding.write().await;
        if !outstanding.contains(target) {
            outstanding.push(target.clone());
        }
        Ok(())
    }

    async fn verify_otp(
        &self,
        target: &OtpTarget,
        code: &str,
    ) -> Result<VerifiedSession, GatewayError> {
        let mut outstanding = self.outstanding.write().await;
        let Some(pos) = outstanding.iter().position(|t| t == target) else {
            return Err(GatewayError::Rejected {
                operation: "verify_otp".into(),
                status: 400,
                body: "no code was sent to this address".into(),
            });
        };
        if code != DEV_OTP_CODE {
            return Err(GatewayError::Rejected {
                operation: "verify_otp".into(),
                status: 400,
                body: "invalid code".into(),
            });
        }
        outstanding.remove(pos);

        let account = self
            .accounts
            .read()
            .await
            .get(target.address())
            .copied()
            .unwrap_or_default();
        Ok(VerifiedSession {
            token: Some(SessionToken {
                access_token: SecretString::from(format!("dev-access-{}", uuid::Uuid::new_v4())),
                refresh_token: SecretString::from(format!("dev-refresh-{}", uuid::Uuid::new_v4())),
            }),
            account,
        })
    }

    async fn check_exists(&self, phone: &str) -> Result<bool, GatewayError> {
        Ok(self.accounts.read().await.contains_key(phone))
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
