//! Configuration types.
//!
//! Every collaborator call budget lives here; call sites never hard-code a
//! duration. Values come from `Default` and can be overridden through
//! `BETOGETHER_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Onboarding flow rules.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Minimum age in full years on the day the birthday is submitted.
    pub min_age: u32,
    /// How long an OTP stays valid after a send or resend.
    pub otp_validity: Duration,
    /// How long the splash screen stays up at launch.
    pub splash_duration: Duration,
    /// Total review submissions allowed per session (first one included).
    pub max_review_submissions: u32,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            min_age: 19,
            otp_validity: Duration::from_secs(180), // 3 minutes
            splash_duration: Duration::from_millis(2500),
            max_review_submissions: 5,
        }
    }
}

impl OnboardingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_age: env_parse("BETOGETHER_MIN_AGE", defaults.min_age),
            otp_validity: env_secs("BETOGETHER_OTP_VALIDITY_SECS", defaults.otp_validity),
            splash_duration: env_millis("BETOGETHER_SPLASH_MS", defaults.splash_duration),
            max_review_submissions: env_parse(
                "BETOGETHER_MAX_REVIEW_SUBMISSIONS",
                defaults.max_review_submissions,
            ),
        }
    }
}

/// Timeouts and retry policy for auth provider calls.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub send_otp_timeout: Duration,
    pub verify_otp_timeout: Duration,
    /// Existence check is best-effort, so its budget is short.
    pub check_exists_timeout: Duration,
    /// Budget for applying a session token after a successful verify.
    pub session_apply_timeout: Duration,
    pub sign_out_timeout: Duration,
    /// Applied to idempotent calls only.
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            send_otp_timeout: Duration::from_secs(10),
            verify_otp_timeout: Duration::from_secs(10),
            check_exists_timeout: Duration::from_secs(3),
            session_apply_timeout: Duration::from_secs(5),
            sign_out_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            send_otp_timeout: env_secs("BETOGETHER_SEND_OTP_TIMEOUT_SECS", defaults.send_otp_timeout),
            verify_otp_timeout: env_secs(
                "BETOGETHER_VERIFY_OTP_TIMEOUT_SECS",
                defaults.verify_otp_timeout,
            ),
            check_exists_timeout: env_secs(
                "BETOGETHER_CHECK_EXISTS_TIMEOUT_SECS",
                defaults.check_exists_timeout,
            ),
            session_apply_timeout: env_secs(
                "BETOGETHER_SESSION_APPLY_TIMEOUT_SECS",
                defaults.session_apply_timeout,
            ),
            sign_out_timeout: env_secs("BETOGETHER_SIGN_OUT_TIMEOUT_SECS", defaults.sign_out_timeout),
            retry: RetryPolicy {
                max_attempts: env_parse("BETOGETHER_RETRY_ATTEMPTS", defaults.retry.max_attempts),
                backoff: env_millis("BETOGETHER_RETRY_BACKOFF_MS", defaults.retry.backoff),
            },
        }
    }
}

/// Approval review budgets.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub submit_timeout: Duration,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    /// Ceiling on how long one submission is awaited before the user is
    /// offered a retry.
    pub decision_deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(15),
            poll_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            decision_deadline: Duration::from_secs(300), // 5 minutes
            retry: RetryPolicy::default(),
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            submit_timeout: env_secs("BETOGETHER_REVIEW_SUBMIT_TIMEOUT_SECS", defaults.submit_timeout),
            poll_timeout: env_secs("BETOGETHER_REVIEW_POLL_TIMEOUT_SECS", defaults.poll_timeout),
            poll_interval: env_millis("BETOGETHER_REVIEW_POLL_INTERVAL_MS", defaults.poll_interval),
            decision_deadline: env_secs(
                "BETOGETHER_REVIEW_DEADLINE_SECS",
                defaults.decision_deadline,
            ),
            retry: defaults.retry,
        }
    }
}

/// Auth provider connection settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Provider base URL, e.g. `https://project.supabase.co`.
    pub base_url: String,
    pub anon_key: SecretString,
}

impl AuthConfig {
    /// Build config from environment variables.
    /// Returns `Ok(None)` if `BETOGETHER_AUTH_URL` is not set (development gateway).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(base_url) = std::env::var("BETOGETHER_AUTH_URL") else {
            return Ok(None);
        };
        let anon_key = std::env::var("BETOGETHER_AUTH_ANON_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("BETOGETHER_AUTH_ANON_KEY".into()))?;
        Self::new(&base_url, anon_key).map(Some)
    }

    pub fn new(base_url: &str, anon_key: String) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "BETOGETHER_AUTH_URL".into(),
                message: format!("expected an http(s) URL, got {base_url:?}"),
            });
        }
        Ok(Self {
            base_url: base_url.to_string(),
            anon_key: SecretString::from(anon_key),
        })
    }
}

/// HTTP server settings for the presentation-facing API.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("BETOGETHER_PORT", Self::default().port),
        }
    }
}

/// Everything the core needs, bundled for wiring.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub onboarding: OnboardingConfig,
    pub gateway: GatewayConfig,
    pub review: ReviewConfig,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self {
            onboarding: OnboardingConfig::from_env(),
            gateway: GatewayConfig::from_env(),
            review: ReviewConfig::from_env(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
