//! OnboardingManager: the single session context. Every state change goes
//! through here: events are checked by the state machine, collaborator calls
//! run with their budgets, and results are committed atomically.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::machine::{Effect, GatewayOutcome, OnboardingEvent, StateMachine, Transition, TransitionContext};
use super::model::{ApprovalState, SessionProfile};
use super::state::{AuthState, NavCommand, NavigationState, OnboardingStep};
use crate::auth::{AuthGateway, OtpTarget, SessionStore, SessionToken};
use crate::config::CoreConfig;
use crate::error::{Error, GatewayError, Result};
use crate::retry::{retry, with_timeout};
use crate::review::{ApprovalWorkflow, ReviewId, ReviewOutcome, ReviewService};
use crate::shell::{self, Screen, ShellInputs, SplashClock};

/// Serializable copy of the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub profile: SessionProfile,
    pub navigation: NavigationState,
}

/// Session status returned to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub screen: Screen,
    pub step: OnboardingStep,
    pub depth: usize,
    pub auth_state: AuthState,
    pub approval_state: ApprovalState,
    pub is_existing_user: bool,
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// What an accepted event did.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub status: SessionStatus,
    /// Navigation commands committed while handling the event, in order.
    pub commands: Vec<NavCommand>,
}

#[derive(Debug, Default)]
struct Session {
    profile: SessionProfile,
    nav: NavigationState,
}

impl Session {
    /// Apply a transition's writes. Callers hold the write guard, so readers
    /// never see a profile write without its navigation change.
    fn commit(&mut self, transition: &Transition, committed: &mut Vec<NavCommand>) {
        for update in &transition.updates {
            self.profile.apply(update.clone());
        }
        for command in &transition.commands {
            if command.is_navigation() {
                committed.push(command.clone());
            }
            self.nav.apply(command.clone());
        }
        if let Some(notice) = &transition.notice {
            self.nav.last_error = Some(notice.clone());
        }
    }
}

pub struct OnboardingManager {
    config: CoreConfig,
    gateway: Arc<dyn AuthGateway>,
    sessions: Arc<dyn SessionStore>,
    workflow: ApprovalWorkflow,
    splash: SplashClock,
    session: RwLock<Session>,
    /// Serializes `apply`, `restore` and review settlement.
    serial: Mutex<()>,
}

impl OnboardingManager {
    pub fn new(
        config: CoreConfig,
        gateway: Arc<dyn AuthGateway>,
        sessions: Arc<dyn SessionStore>,
        reviewer: Arc<dyn ReviewService>,
    ) -> Self {
        let splash = SplashClock::start(config.onboarding.splash_duration);
        let workflow = ApprovalWorkflow::new(reviewer, config.review.clone());
        Self {
            config,
            gateway,
            sessions,
            workflow,
            splash,
            session: RwLock::new(Session::default()),
            serial: Mutex::new(()),
        }
    }

    fn context(&self) -> TransitionContext {
        TransitionContext::new(&self.config.onboarding, Utc::now())
    }

    /// Handle one event to completion, including any collaborator calls it
    /// triggers. On failure the step does not advance and `last_error`
    /// carries the message.
    pub async fn apply(self: &Arc<Self>, event: OnboardingEvent) -> Result<ApplyReport> {
        let _serial = self.serial.lock().await;
        let event_name = event.name();
        let ctx = self.context();

        let transition = {
            let mut session = self.session.write().await;
            session.nav.last_error = None;
            StateMachine::transition(&session.nav, &session.profile, &event, &ctx)
        };
        let transition = match transition {
            Ok(t) => t,
            Err(e) => {
                tracing::info!(event = event_name, error = %e, "Event rejected");
                self.session.write().await.nav.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let mut committed = Vec::new();
        let mut effects: VecDeque<Effect> = transition.effects.iter().cloned().collect();
        self.session.write().await.commit(&transition, &mut committed);

        while let Some(effect) = effects.pop_front() {
            match self.run_effect(&effect).await {
                Ok(Some(outcome)) => {
                    let ctx = self.context();
                    let mut session = self.session.write().await;
                    let resolved = StateMachine::resolve(&session.nav, &session.profile, outcome, &ctx);
                    effects.extend(resolved.effects.iter().cloned());
                    session.commit(&resolved, &mut committed);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(event = event_name, error = %e, "Collaborator call failed");
                    self.session.write().await.nav.last_error = Some(failure_message(&effect, &e));
                    return Err(e);
                }
            }
        }

        let status = self.status().await;
        tracing::debug!(event = event_name, step = %status.step, "Event applied");
        Ok(ApplyReport {
            status,
            commands: committed,
        })
    }

    async fn run_effect(self: &Arc<Self>, effect: &Effect) -> Result<Option<GatewayOutcome>> {
        let budgets = &self.config.gateway;
        let outcome = match effect {
            Effect::StartPhoneVerification { phone } => {
                let existing_user = match retry(&budgets.retry, "check_exists", || {
                    with_timeout(
                        "check_exists",
                        budgets.check_exists_timeout,
                        self.gateway.check_exists(phone),
                    )
                })
                .await
                {
                    Ok(exists) => exists,
                    Err(e) => {
                        tracing::warn!(error = %e, "Existence check failed; continuing as a new user");
                        false
                    }
                };
                self.send_otp(&OtpTarget::Phone(phone.clone())).await?;
                GatewayOutcome::PhoneOtpSent {
                    phone: phone.clone(),
                    existing_user,
                }
            }
            Effect::StartEmailVerification { email } => {
                self.send_otp(&OtpTarget::Email(email.clone())).await?;
                GatewayOutcome::EmailOtpSent {
                    email: email.clone(),
                }
            }
            Effect::ResendOtp { target } => {
                self.send_otp(target).await?;
                GatewayOutcome::OtpResent
            }
            Effect::VerifyOtp { target, code } => {
                let verified = with_timeout(
                    "verify_otp",
                    budgets.verify_otp_timeout,
                    self.gateway.verify_otp(target, code),
                )
                .await?;
                tracing::info!(target = %target, account = ?verified.account, "OTP verified");
                match verified.token {
                    Some(token) => self.spawn_session_apply(token),
                    None => tracing::warn!("Provider returned no session token"),
                }
                GatewayOutcome::OtpVerified {
                    account: verified.account,
                }
            }
            Effect::SubmitForReview { photos } => {
                let review = self.workflow.submit(photos).await?;
                GatewayOutcome::ReviewSubmitted {
                    review,
                    photos: photos.clone(),
                }
            }
            Effect::PollReview { review } => {
                self.watch_review(*review).await;
                return Ok(None);
            }
            Effect::SignOut => {
                retry(&budgets.retry, "sign_out", || {
                    with_timeout("sign_out", budgets.sign_out_timeout, self.gateway.sign_out())
                })
                .await?;
                self.workflow.cancel().await;
                if let Err(e) = self.sessions.clear().await {
                    tracing::warn!(error = %e, "Failed to clear session token");
                }
                tracing::info!("Signed out");
                GatewayOutcome::SignedOut
            }
        };
        Ok(Some(outcome))
    }

    /// Sends are not idempotent (each one delivers a new code), so no retry.
    async fn send_otp(&self, target: &OtpTarget) -> std::result::Result<(), GatewayError> {
        with_timeout(
            "send_otp",
            self.config.gateway.send_otp_timeout,
            self.gateway.send_otp(target),
        )
        .await?;
        tracing::info!(gateway = self.gateway.name(), target = %target, "Verification code sent");
        Ok(())
    }

    /// Hand the token to the session store in the background. The user is
    /// already verified, so failure is only logged.
    fn spawn_session_apply(&self, token: SessionToken) {
        let sessions = Arc::clone(&self.sessions);
        let timeout = self.config.gateway.session_apply_timeout;
        let policy = self.config.gateway.retry;
        tokio::spawn(async move {
            let result = retry(&policy, "apply_session", || {
                with_timeout("apply_session", timeout, sessions.apply(token.clone()))
            })
            .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "Session token was not applied");
            }
        });
    }

    async fn watch_review(self: &Arc<Self>, review: ReviewId) {
        let manager = Arc::downgrade(self);
        self.workflow
            .watch(review, move |outcome| async move {
                if let Some(manager) = manager.upgrade() {
                    manager.settle_review(review, outcome).await;
                }
            })
            .await;
    }

    /// Commit a review result, unless the session has moved on to another
    /// submission (or signed out) since the watch started.
    async fn settle_review(&self, review: ReviewId, outcome: ReviewOutcome) {
        let _serial = self.serial.lock().await;
        let ctx = self.context();
        let mut session = self.session.write().await;
        if session.nav.pending_review != Some(review) {
            tracing::debug!(review = %review, "Ignoring outcome for a superseded review");
            return;
        }
        let outcome = match outcome {
            ReviewOutcome::Decided(status) => GatewayOutcome::ReviewDecided { status },
            ReviewOutcome::DeadlineExceeded => GatewayOutcome::ReviewTimedOut,
            ReviewOutcome::Failed(e) => {
                tracing::warn!(review = %review, error = %e, "Review status unavailable");
                GatewayOutcome::ReviewTimedOut
            }
        };
        let resolved = StateMachine::resolve(&session.nav, &session.profile, outcome, &ctx);
        session.commit(&resolved, &mut Vec::new());
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read().await;
        SessionSnapshot {
            profile: session.profile.clone(),
            navigation: session.nav.clone(),
        }
    }

    /// Replace the session with `snapshot`. A pending review in the snapshot
    /// is watched again.
    pub async fn restore(self: &Arc<Self>, snapshot: SessionSnapshot) {
        let _serial = self.serial.lock().await;
        self.workflow.cancel().await;
        let resume = match (&snapshot.profile.approval_state, snapshot.navigation.pending_review) {
            (ApprovalState::Pending, Some(review)) => Some(review),
            _ => None,
        };
        {
            let mut session = self.session.write().await;
            session.profile = snapshot.profile;
            session.nav = snapshot.navigation;
            tracing::info!(step = %session.nav.current_step(), "Session restored");
        }
        if let Some(review) = resume {
            self.watch_review(review).await;
        }
    }

    pub async fn current_step(&self) -> OnboardingStep {
        self.session.read().await.nav.current_step()
    }

    pub async fn profile(&self) -> SessionProfile {
        self.session.read().await.profile.clone()
    }

    pub async fn screen(&self) -> Screen {
        let session = self.session.read().await;
        self.route(&session)
    }

    fn route(&self, session: &Session) -> Screen {
        shell::route(&ShellInputs {
            splash_elapsed: self.splash.is_elapsed(),
            auth_state: session.nav.auth_state,
            approval_state: session.profile.approval_state.clone(),
            is_logged_in: session.nav.is_logged_in,
        })
    }

    pub async fn status(&self) -> SessionStatus {
        let session = self.session.read().await;
        SessionStatus {
            screen: self.route(&session),
            step: session.nav.current_step(),
            depth: session.nav.depth(),
            auth_state: session.nav.auth_state,
            approval_state: session.profile.approval_state.clone(),
            is_existing_user: session.nav.is_existing_user,
            is_logged_in: session.nav.is_logged_in,
            last_error: session.nav.last_error.clone(),
        }
    }
}

/// User-facing message for a failed collaborator call.
fn failure_message(effect: &Effect, error: &Error) -> String {
    let timed_out = matches!(
        error,
        Error::Gateway(GatewayError::Timeout { .. }) | Error::Review(crate::error::ReviewError::Timeout { .. })
    );
    if timed_out {
        return "The request timed out. Please check your connection and try again.".into();
    }
    match effect {
        Effect::StartPhoneVerification { .. }
        | Effect::StartEmailVerification { .. }
        | Effect::ResendOtp { .. } => "We couldn't send the verification code. Please try again.".into(),
        Effect::VerifyOtp { .. } => match error {
            Error::Gateway(GatewayError::Rejected { .. }) => {
                "The verification code is incorrect or has expired.".into()
            }
            _ => "Verification failed. Please try again.".into(),
        },
        Effect::SubmitForReview { .. } => {
            "We couldn't submit your photos for review. Please try again.".into()
        }
        Effect::PollReview { .. } => "We couldn't check your review status.".into(),
        Effect::SignOut => "Sign-out failed. Please try again.".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate};

    use super::*;
    use crate::auth::{AccountStatus, DevAuthGateway, MemorySessionStore, VerifiedSession};
    use crate::error::{ReviewError, ValidationError};
    use crate::onboarding::model::PhotoRef;
    use crate::onboarding::state::ProfileStep;
    use crate::retry::RetryPolicy;
    use crate::review::{MockReviewService, ReviewStatus};

    fn test_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.onboarding.splash_duration = Duration::ZERO;
        config.gateway.retry = RetryPolicy::none();
        config.gateway.check_exists_timeout = Duration::from_millis(50);
        config.gateway.send_otp_timeout = Duration::from_millis(200);
        config.review.retry = RetryPolicy::none();
        config.review.poll_interval = Duration::from_millis(5);
        config
    }

    /// Gateway with switchable failures. Accepts any well-formed code.
    #[derive(Default)]
    struct StubGateway {
        exists_fails: AtomicBool,
        exists_hangs: AtomicBool,
        send_fails: AtomicBool,
        sign_out_fails: AtomicBool,
        sends: AtomicU32,
    }

    #[async_trait]
    impl AuthGateway for StubGateway {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send_otp(&self, _target: &OtpTarget) -> std::result::Result<(), GatewayError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.send_fails.load(Ordering::SeqCst) {
                return Err(GatewayError::RequestFailed {
                    operation: "send_otp".into(),
                    reason: "network unreachable".into(),
                });
            }
            Ok(())
        }

        async fn verify_otp(
            &self,
            _target: &OtpTarget,
            _code: &str,
        ) -> std::result::Result<VerifiedSession, GatewayError> {
            Ok(VerifiedSession::default())
        }

        async fn check_exists(&self, _phone: &str) -> std::result::Result<bool, GatewayError> {
            if self.exists_hangs.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.exists_fails.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected {
                    operation: "check_exists".into(),
                    status: 500,
                    body: "function crashed".into(),
                });
            }
            Ok(true)
        }

        async fn sign_out(&self) -> std::result::Result<(), GatewayError> {
            if self.sign_out_fails.load(Ordering::SeqCst) {
                return Err(GatewayError::RequestFailed {
                    operation: "sign_out".into(),
                    reason: "offline".into(),
                });
            }
            Ok(())
        }
    }

    /// Reviewer that rejects the first submission and approves the rest.
    #[derive(Default)]
    struct RejectOnceReviewer {
        submissions: AtomicU32,
        first: std::sync::Mutex<Option<ReviewId>>,
    }

    #[async_trait]
    impl ReviewService for RejectOnceReviewer {
        async fn submit_for_review(
            &self,
            _photos: &[PhotoRef],
        ) -> std::result::Result<ReviewId, ReviewError> {
            let id = ReviewId::new();
            if self.submissions.fetch_add(1, Ordering::SeqCst) == 0 {
                *self.first.lock().unwrap() = Some(id);
            }
            Ok(id)
        }

        async fn poll_review_status(
            &self,
            id: ReviewId,
        ) -> std::result::Result<ReviewStatus, ReviewError> {
            if *self.first.lock().unwrap() == Some(id) {
                Ok(ReviewStatus::Rejected {
                    reason: "Face not clearly visible.".into(),
                })
            } else {
                Ok(ReviewStatus::Approved)
            }
        }
    }

    fn manager_with(
        gateway: Arc<dyn AuthGateway>,
        reviewer: Arc<dyn ReviewService>,
    ) -> Arc<OnboardingManager> {
        Arc::new(OnboardingManager::new(
            test_config(),
            gateway,
            Arc::new(MemorySessionStore::new()),
            reviewer,
        ))
    }

    fn stub_manager(gateway: Arc<StubGateway>) -> Arc<OnboardingManager> {
        manager_with(gateway, Arc::new(MockReviewService::always(true)))
    }

    /// Snapshot positioned at `step` with an otherwise empty session.
    fn snapshot_at(steps: &[OnboardingStep], auth_state: AuthState) -> SessionSnapshot {
        let mut navigation = NavigationState::default();
        navigation.apply(NavCommand::SetAuthState { state: auth_state });
        for step in steps {
            navigation.apply(NavCommand::Push { step: step.clone() });
        }
        SessionSnapshot {
            profile: SessionProfile::default(),
            navigation,
        }
    }

    async fn wait_for_approval(manager: &OnboardingManager, pred: impl Fn(&ApprovalState) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if pred(&manager.profile().await.approval_state) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("approval state did not change in time");
    }

    fn years_ago(years: i32) -> NaiveDate {
        let today = Utc::now().date_naive();
        NaiveDate::from_ymd_opt(today.year() - years, today.month(), today.day().min(28)).unwrap()
    }

    #[tokio::test]
    async fn phone_scenario_reaches_notification_permission() {
        let manager = manager_with(
            Arc::new(DevAuthGateway::new()),
            Arc::new(MockReviewService::always(true)),
        );
        manager.apply(OnboardingEvent::Start).await.unwrap();
        let report = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            report.status.step,
            OnboardingStep::Verification {
                phone: "+610000000".into()
            }
        );
        assert!(!report.status.is_existing_user);

        let report = manager
            .apply(OnboardingEvent::SubmitOtp {
                code: "123456".into(),
            })
            .await
            .unwrap();
        assert_eq!(report.status.step, OnboardingStep::NotificationPermission);
        assert_eq!(report.status.auth_state, AuthState::Onboarding);
        assert_eq!(report.status.screen, Screen::OnboardingFlow);
        assert_eq!(manager.profile().await.phone_number, "+610000000");
    }

    #[tokio::test]
    async fn existence_check_failure_is_soft() {
        let gateway = Arc::new(StubGateway::default());
        gateway.exists_fails.store(true, Ordering::SeqCst);
        let manager = stub_manager(Arc::clone(&gateway));
        manager.restore(snapshot_at(&[OnboardingStep::PhoneInput], AuthState::Unauthenticated)).await;

        let report = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await
            .unwrap();
        assert!(matches!(report.status.step, OnboardingStep::Verification { .. }));
        assert!(!report.status.is_existing_user);
        assert!(report.status.last_error.is_none());
    }

    #[tokio::test]
    async fn existence_check_timeout_is_soft() {
        let gateway = Arc::new(StubGateway::default());
        gateway.exists_hangs.store(true, Ordering::SeqCst);
        let manager = stub_manager(Arc::clone(&gateway));
        manager.restore(snapshot_at(&[OnboardingStep::PhoneInput], AuthState::Unauthenticated)).await;

        let report = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await
            .unwrap();
        assert!(matches!(report.status.step, OnboardingStep::Verification { .. }));
        assert!(!report.status.is_existing_user);
    }

    #[tokio::test]
    async fn existing_user_is_flagged() {
        let gateway = Arc::new(StubGateway::default());
        let manager = stub_manager(Arc::clone(&gateway));
        manager.restore(snapshot_at(&[OnboardingStep::PhoneInput], AuthState::Unauthenticated)).await;
        let report = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await
            .unwrap();
        assert!(report.status.is_existing_user);
    }

    #[tokio::test]
    async fn otp_send_failure_keeps_step_and_sets_error() {
        let gateway = Arc::new(StubGateway::default());
        gateway.send_fails.store(true, Ordering::SeqCst);
        let manager = stub_manager(Arc::clone(&gateway));
        manager.restore(snapshot_at(&[OnboardingStep::PhoneInput], AuthState::Unauthenticated)).await;

        let result = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await;
        assert!(matches!(result, Err(Error::Gateway(_))));
        let status = manager.status().await;
        assert_eq!(status.step, OnboardingStep::PhoneInput);
        assert!(!status.last_error.unwrap_or_default().is_empty());
        assert!(manager.profile().await.phone_number.is_empty());
        // One attempt only.
        assert_eq!(gateway.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn underage_birthday_sets_error_and_stays() {
        let manager = stub_manager(Arc::new(StubGateway::default()));
        manager
            .restore(snapshot_at(
                &[OnboardingStep::ProfileSetup {
                    field: ProfileStep::Birthday,
                }],
                AuthState::Onboarding,
            ))
            .await;

        let result = manager
            .apply(OnboardingEvent::SubmitBirthday { date: years_ago(15) })
            .await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::Underage { min_age: 19 }))
        ));
        let status = manager.status().await;
        assert_eq!(
            status.step,
            OnboardingStep::ProfileSetup {
                field: ProfileStep::Birthday
            }
        );
        assert!(status.last_error.is_some());
        assert!(manager.profile().await.birth_date.is_none());

        // The next accepted event clears the error.
        manager
            .apply(OnboardingEvent::SubmitBirthday { date: years_ago(25) })
            .await
            .unwrap();
        let status = manager.status().await;
        assert!(status.last_error.is_none());
        assert_eq!(
            status.step,
            OnboardingStep::ProfileSetup {
                field: ProfileStep::Nickname
            }
        );
    }

    #[tokio::test]
    async fn rejection_then_resubmission() {
        let manager = manager_with(
            Arc::new(StubGateway::default()),
            Arc::new(RejectOnceReviewer::default()),
        );
        manager.restore(snapshot_at(&[OnboardingStep::PhotoUpload], AuthState::Onboarding)).await;
        let photos = vec![
            Some(PhotoRef("photo://1".into())),
            Some(PhotoRef("photo://2".into())),
        ];

        let report = manager
            .apply(OnboardingEvent::SubmitPhotos {
                photos: photos.clone(),
            })
            .await
            .unwrap();
        assert_eq!(report.status.step, OnboardingStep::ApprovalWaiting);
        assert_eq!(report.status.screen, Screen::ApprovalWaiting);

        wait_for_approval(&manager, |s| matches!(s, ApprovalState::Rejected { .. })).await;
        assert!(matches!(
            manager.apply(OnboardingEvent::RetryReview).await,
            Err(Error::Validation(ValidationError::NoPendingReview))
        ));

        let report = manager.apply(OnboardingEvent::ResubmitPhotos).await.unwrap();
        assert_eq!(report.status.step, OnboardingStep::PhotoUpload);

        let report = manager
            .apply(OnboardingEvent::SubmitPhotos { photos })
            .await
            .unwrap();
        assert_eq!(report.status.step, OnboardingStep::ApprovalWaiting);
        assert_eq!(manager.profile().await.review_submissions, 2);

        wait_for_approval(&manager, |s| *s == ApprovalState::Approved).await;
        let status = manager.status().await;
        assert_eq!(status.step, OnboardingStep::Completed);
        assert_eq!(status.screen, Screen::MainApplication);
        assert!(status.is_logged_in);
    }

    #[tokio::test]
    async fn deadline_keeps_pending_and_retry_resumes() {
        let mut config = test_config();
        config.review.decision_deadline = Duration::from_millis(20);
        let reviewer = Arc::new(MockReviewService::new(
            Duration::from_millis(100),
            Duration::from_millis(100),
            1.0,
        ));
        let manager = Arc::new(OnboardingManager::new(
            config,
            Arc::new(StubGateway::default()),
            Arc::new(MemorySessionStore::new()),
            reviewer,
        ));
        manager.restore(snapshot_at(&[OnboardingStep::PhotoUpload], AuthState::Onboarding)).await;
        manager
            .apply(OnboardingEvent::SubmitPhotos {
                photos: vec![
                    Some(PhotoRef("photo://1".into())),
                    Some(PhotoRef("photo://2".into())),
                ],
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while manager.status().await.last_error.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(manager.profile().await.approval_state, ApprovalState::Pending);

        tokio::time::sleep(Duration::from_millis(120)).await;
        manager.apply(OnboardingEvent::RetryReview).await.unwrap();
        wait_for_approval(&manager, |s| *s == ApprovalState::Approved).await;
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let manager = manager_with(
            Arc::new(DevAuthGateway::new()),
            Arc::new(MockReviewService::always(true)),
        );
        manager.apply(OnboardingEvent::Start).await.unwrap();
        manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000000".into(),
            })
            .await
            .unwrap();
        let snapshot = manager.snapshot().await;
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: SessionSnapshot = serde_json::from_str(&json).unwrap();

        let other = manager_with(
            Arc::new(DevAuthGateway::new()),
            Arc::new(MockReviewService::always(true)),
        );
        other.restore(parsed).await;
        assert_eq!(other.snapshot().await, snapshot);
        assert_eq!(other.current_step().await, manager.current_step().await);
    }

    #[tokio::test]
    async fn sign_out_resets_session() {
        let manager = stub_manager(Arc::new(StubGateway::default()));
        let mut snapshot = snapshot_at(&[OnboardingStep::Completed], AuthState::Approved);
        snapshot.profile.nickname = "Jimin".into();
        snapshot.profile.approval_state = ApprovalState::Approved;
        manager.restore(snapshot).await;
        assert_eq!(manager.screen().await, Screen::MainApplication);

        manager.apply(OnboardingEvent::SignOut).await.unwrap();
        assert_eq!(manager.snapshot().await.profile, SessionProfile::default());
        assert_eq!(manager.current_step().await, OnboardingStep::Landing);
        assert_eq!(manager.screen().await, Screen::OnboardingFlow);
    }

    #[tokio::test]
    async fn sign_out_failure_keeps_state() {
        let gateway = Arc::new(StubGateway::default());
        gateway.sign_out_fails.store(true, Ordering::SeqCst);
        let manager = stub_manager(Arc::clone(&gateway));
        manager.restore(snapshot_at(&[OnboardingStep::Terms], AuthState::Onboarding)).await;

        assert!(manager.apply(OnboardingEvent::SignOut).await.is_err());
        let status = manager.status().await;
        assert_eq!(status.step, OnboardingStep::Terms);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn returning_approved_user_goes_to_main_app() {
        let gateway = Arc::new(DevAuthGateway::new());
        gateway.register("+610000001", AccountStatus::Approved).await;
        let manager = manager_with(gateway, Arc::new(MockReviewService::always(true)));
        manager.apply(OnboardingEvent::Start).await.unwrap();
        let report = manager
            .apply(OnboardingEvent::SubmitPhone {
                phone: "+610000001".into(),
            })
            .await
            .unwrap();
        assert!(report.status.is_existing_user);

        let report = manager
            .apply(OnboardingEvent::SubmitOtp {
                code: "123456".into(),
            })
            .await
            .unwrap();
        assert_eq!(report.status.step, OnboardingStep::Completed);
        assert_eq!(report.status.screen, Screen::MainApplication);
        assert!(
            report
                .commands
                .contains(&NavCommand::ResetTo {
                    step: OnboardingStep::Completed
                })
        );
    }
}
