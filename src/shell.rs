//! App shell routing: which top-level screen the app shows.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::onboarding::model::ApprovalState;
use crate::onboarding::state::AuthState;

/// Top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Splash,
    OnboardingFlow,
    ApprovalWaiting,
    MainApplication,
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Splash => write!(f, "splash"),
            Self::OnboardingFlow => write!(f, "onboarding_flow"),
            Self::ApprovalWaiting => write!(f, "approval_waiting"),
            Self::MainApplication => write!(f, "main_application"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellInputs {
    pub splash_elapsed: bool,
    pub auth_state: AuthState,
    pub approval_state: ApprovalState,
    pub is_logged_in: bool,
}

/// Splash first, then the main app for approved users, then the waiting
/// screen while a review is pending, otherwise onboarding.
pub fn route(inputs: &ShellInputs) -> Screen {
    if !inputs.splash_elapsed {
        return Screen::Splash;
    }
    if inputs.auth_state == AuthState::Approved || inputs.is_logged_in {
        return Screen::MainApplication;
    }
    if inputs.auth_state == AuthState::PendingApproval {
        return Screen::ApprovalWaiting;
    }
    Screen::OnboardingFlow
}

/// Measures how long the splash screen has been up.
#[derive(Debug, Clone)]
pub struct SplashClock {
    started: Instant,
    duration: Duration,
}

impl SplashClock {
    pub fn start(duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
        }
    }

    pub fn is_elapsed(&self) -> bool {
        self.started.elapsed() >= self.duration
    }

    /// Time left before the splash may be dismissed.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.started.elapsed())
    }
}
