//! Error types for the BeTogether onboarding core.

use std::time::Duration;

/// Top-level error type for the onboarding core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Auth provider errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{operation} request failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("{operation} rejected by provider ({status}): {body}")]
    Rejected {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Invalid response for {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },
}

impl GatewayError {
    /// Whether the failure is worth retrying for an idempotent call.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse { .. } => false,
        }
    }
}

/// Approval review errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Review submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Review {id} not found")]
    NotFound { id: String },

    #[error("Review status poll failed: {0}")]
    PollFailed(String),

    #[error("Review call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Local validation failures. The step does not advance and the message is
/// shown inline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("You must be at least {min_age} years old to join")]
    Underage { min_age: u32 },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Please enter a valid phone number")]
    InvalidPhone,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("The verification code must be 6 digits")]
    InvalidOtpFormat,

    #[error("The verification code has expired, please request a new one")]
    OtpExpired,

    #[error("Height must be between {min} and {max} cm")]
    InvalidHeight { min: u16, max: u16 },

    #[error("Set every personality slider before continuing")]
    MbtiIncomplete,

    #[error("Slider value {value} is outside 0.0..=1.0")]
    InvalidSliderValue { value: String },

    #[error("Unknown personality type: {code}")]
    UnknownMbti { code: String },

    #[error("Personality type has not been set yet")]
    MbtiMissing,

    #[error("Please agree to the terms of service and privacy policy")]
    TermsNotAccepted,

    #[error("Please answer every question ({missing} left)")]
    IncompleteAnswers { missing: usize },

    #[error("Invalid answer for {category}: option {option} does not exist")]
    InvalidAnswer { category: String, option: usize },

    #[error("Age range {min}-{max} is invalid")]
    InvalidAgeRange { min: u8, max: u8 },

    #[error("Distance must be between 1 and 100 km")]
    InvalidDistance,

    #[error("Both photos are required ({provided} of {required} provided)")]
    MissingPhotos { required: usize, provided: usize },

    #[error("Too many review submissions ({limit}); please contact support")]
    ResubmissionLimit { limit: u32 },

    #[error("Email verification is only available for existing accounts")]
    EmailPathUnavailable,

    #[error("No review is pending")]
    NoPendingReview,

    #[error("Resubmission is only possible after a rejected review")]
    NotRejected,

    #[error("Every test question has already been answered")]
    QuizComplete,

    #[error("Nothing to go back to")]
    NothingToPop,

    #[error("Onboarding is already complete")]
    Terminal,

    #[error("{event} is not allowed on the {step} step")]
    UnexpectedEvent { event: String, step: String },
}

/// Result type alias for the onboarding core.
pub type Result<T> = std::result::Result<T, Error>;
