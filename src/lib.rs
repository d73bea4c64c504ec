//! BeTogether: onboarding core for the dating app client.

pub mod auth;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod retry;
pub mod review;
pub mod shell;
