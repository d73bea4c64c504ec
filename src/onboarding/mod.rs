//! Onboarding system: the step-by-step signup wizard.
//!
//! A new user verifies a phone number, grants permissions, fills in a
//! profile, sets a personality type and matching preferences, and submits
//! photos for review. The `StateMachine` decides every step; the
//! `OnboardingManager` owns the session and talks to the collaborators.

pub mod machine;
pub mod manager;
pub mod mbti;
pub mod model;
pub mod personality;
pub mod routes;
pub mod state;

pub use machine::{Effect, GatewayOutcome, OnboardingEvent, StateMachine, Transition, TransitionContext};
pub use manager::{ApplyReport, OnboardingManager, SessionSnapshot, SessionStatus};
pub use model::{ApprovalState, MatchingPreference, SessionProfile};
pub use routes::{OnboardingRouteState, app, onboarding_routes};
pub use state::{AuthState, NavCommand, NavigationState, OnboardingStep, ProfileStep};
