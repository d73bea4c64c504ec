use std::sync::Arc;

use betogether::auth::{AuthGateway, DevAuthGateway, HttpAuthGateway, MemorySessionStore};
use betogether::config::{AuthConfig, CoreConfig, ServerConfig};
use betogether::onboarding::{self, OnboardingManager};
use betogether::review::MockReviewService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CoreConfig::from_env();
    let server = ServerConfig::from_env();

    eprintln!("💞 BeTogether v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", server.port);
    eprintln!(
        "   Minimum age: {}, OTP valid for {}s",
        config.onboarding.min_age,
        config.onboarding.otp_validity.as_secs()
    );

    // ── Auth provider ───────────────────────────────────────────────────
    let sessions = Arc::new(MemorySessionStore::new());
    let gateway: Arc<dyn AuthGateway> = match AuthConfig::from_env()? {
        Some(auth_config) => {
            eprintln!("   Auth: {}", auth_config.base_url);
            Arc::new(HttpAuthGateway::new(&auth_config, sessions.clone()))
        }
        None => {
            eprintln!("   Auth: development gateway (every code is 123456)");
            Arc::new(DevAuthGateway::new())
        }
    };

    // ── Review ──────────────────────────────────────────────────────────
    let reviewer = Arc::new(MockReviewService::default());
    eprintln!(
        "   Review: mock (deadline {}s, max {} submissions)\n",
        config.review.decision_deadline.as_secs(),
        config.onboarding.max_review_submissions
    );

    let manager = Arc::new(OnboardingManager::new(
        config,
        gateway,
        sessions,
        reviewer,
    ));

    let app = onboarding::app(manager);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port)).await?;
    tracing::info!(port = server.port, "Onboarding API started");
    axum::serve(listener, app).await?;

    Ok(())
}
