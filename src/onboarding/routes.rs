//! REST endpoints the presentation layer drives the onboarding flow through.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use super::machine::OnboardingEvent;
use super::manager::{OnboardingManager, SessionSnapshot};
use crate::error::Error;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

/// GET /api/onboarding/status
///
/// Current screen, step, auth and approval state, and the last error.
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.status().await)
}

/// GET /api/onboarding/profile
async fn get_profile(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.profile().await)
}

/// POST /api/onboarding/events
///
/// Apply one event. Validation failures return 422 with the message;
/// collaborator failures return 502. Either way the session keeps its
/// current step.
async fn post_event(
    State(state): State<OnboardingRouteState>,
    Json(event): Json<OnboardingEvent>,
) -> Response {
    match state.manager.apply(event).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            let code = match &e {
                Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Error::Gateway(_) | Error::Review(_) => StatusCode::BAD_GATEWAY,
                Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let status = state.manager.status().await;
            let message = status.last_error.clone().unwrap_or_else(|| e.to_string());
            (
                code,
                Json(serde_json::json!({ "error": message, "status": status })),
            )
                .into_response()
        }
    }
}

/// GET /api/onboarding/snapshot
async fn get_snapshot(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.snapshot().await)
}

/// PUT /api/onboarding/snapshot
///
/// Replace the session, e.g. after the app is relaunched.
async fn put_snapshot(
    State(state): State<OnboardingRouteState>,
    Json(snapshot): Json<SessionSnapshot>,
) -> impl IntoResponse {
    state.manager.restore(snapshot).await;
    Json(state.manager.status().await)
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/profile", get(get_profile))
        .route("/api/onboarding/events", post(post_event))
        .route("/api/onboarding/snapshot", get(get_snapshot).put(put_snapshot))
        .with_state(state)
}

/// The full HTTP app: onboarding routes plus CORS for the client.
pub fn app(manager: Arc<OnboardingManager>) -> Router {
    onboarding_routes(OnboardingRouteState { manager })
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
