//! Onboarding navigation state: step tokens, the navigation stack and the
//! commands that mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mbti::{Axis, ManualSliders, QuizChoice};
use crate::review::ReviewId;

/// The profile-setup subflow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStep {
    Birthday,
    Nickname,
    Gender,
    Occupation,
    Height,
    University,
    Drinking,
    Smoking,
    OneLineIntro,
    SelfIntro,
}

impl ProfileStep {
    pub const FIRST: ProfileStep = ProfileStep::Birthday;

    /// Next sub-step, or `None` when the subflow is done.
    pub fn next(&self) -> Option<ProfileStep> {
        use ProfileStep::*;
        match self {
            Birthday => Some(Nickname),
            Nickname => Some(Gender),
            Gender => Some(Occupation),
            Occupation => Some(Height),
            Height => Some(University),
            University => Some(Drinking),
            Drinking => Some(Smoking),
            Smoking => Some(OneLineIntro),
            OneLineIntro => Some(SelfIntro),
            SelfIntro => None,
        }
    }
}

impl std::fmt::Display for ProfileStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Birthday => "birthday",
            Self::Nickname => "nickname",
            Self::Gender => "gender",
            Self::Occupation => "occupation",
            Self::Height => "height",
            Self::University => "university",
            Self::Drinking => "drinking",
            Self::Smoking => "smoking",
            Self::OneLineIntro => "one_line_intro",
            Self::SelfIntro => "self_intro",
        };
        write!(f, "{s}")
    }
}

/// A navigable onboarding screen. Some steps carry the data their screen
/// was opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OnboardingStep {
    Landing,
    PhoneInput,
    Verification { phone: String },
    EmailVerification { email: String },
    NotificationPermission,
    LocationPermission,
    Terms,
    EmailInput,
    ProfileSetup { field: ProfileStep },
    MbtiManualInput,
    MbtiTestIntro,
    MbtiTest,
    MbtiResult,
    PersonalityQaIntro,
    PersonalityQa,
    MatchingPreference,
    ContactBlocking,
    PhotoUpload,
    ApprovalWaiting,
    Completed,
}

impl OnboardingStep {
    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Landing => write!(f, "landing"),
            Self::PhoneInput => write!(f, "phone_input"),
            Self::Verification { .. } => write!(f, "verification"),
            Self::EmailVerification { .. } => write!(f, "email_verification"),
            Self::NotificationPermission => write!(f, "notification_permission"),
            Self::LocationPermission => write!(f, "location_permission"),
            Self::Terms => write!(f, "terms"),
            Self::EmailInput => write!(f, "email_input"),
            Self::ProfileSetup { field } => write!(f, "profile_setup.{field}"),
            Self::MbtiManualInput => write!(f, "mbti_manual_input"),
            Self::MbtiTestIntro => write!(f, "mbti_test_intro"),
            Self::MbtiTest => write!(f, "mbti_test"),
            Self::MbtiResult => write!(f, "mbti_result"),
            Self::PersonalityQaIntro => write!(f, "personality_qa_intro"),
            Self::PersonalityQa => write!(f, "personality_qa"),
            Self::MatchingPreference => write!(f, "matching_preference"),
            Self::ContactBlocking => write!(f, "contact_blocking"),
            Self::PhotoUpload => write!(f, "photo_upload"),
            Self::ApprovalWaiting => write!(f, "approval_waiting"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// App-wide authentication gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// A code has been sent and is waiting to be checked.
    CheckingOtp,
    Onboarding,
    PendingApproval,
    Approved,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::CheckingOtp => "checking_otp",
            Self::Onboarding => "onboarding",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
        };
        write!(f, "{s}")
    }
}

/// A state write emitted by a transition. Push/Pop/Reset are the
/// navigation commands the presentation layer follows; the rest update the
/// per-step working data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum NavCommand {
    Push { step: OnboardingStep },
    Pop,
    /// Clear the stack and show `step` as the only entry.
    ResetTo { step: OnboardingStep },
    SetAuthState { state: AuthState },
    SetExistingUser { existing: bool },
    SetLoggedIn { logged_in: bool },
    StartOtpCountdown { expires_at: DateTime<Utc> },
    ClearOtpCountdown,
    SetSlider { axis: Axis, value: f64 },
    ResetQuiz,
    RecordQuizAnswer { choice: QuizChoice },
    /// Forget the most recent quiz answer.
    DropQuizAnswer,
    SetPendingReview { review: Option<ReviewId> },
    ResetSession,
}

impl NavCommand {
    /// Whether the presentation layer needs to change screens for this command.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::Push { .. } | Self::Pop | Self::ResetTo { .. } | Self::ResetSession
        )
    }
}

/// Process-wide navigation state for one app session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    pub auth_state: AuthState,
    path: Vec<OnboardingStep>,
    pub is_existing_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Legacy flag kept alongside `AuthState::Approved`.
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual_mbti: ManualSliders,
    #[serde(default)]
    pub quiz_answers: Vec<QuizChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_review: Option<ReviewId>,
}

impl NavigationState {
    /// Top of the stack, or `Landing` when nothing has been pushed.
    pub fn current_step(&self) -> OnboardingStep {
        self.path.last().cloned().unwrap_or(OnboardingStep::Landing)
    }

    pub fn path(&self) -> &[OnboardingStep] {
        &self.path
    }

    /// The step a `Pop` would reveal.
    pub fn previous_step(&self) -> OnboardingStep {
        match self.path.len() {
            0 | 1 => OnboardingStep::Landing,
            n => self.path[n - 2].clone(),
        }
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn apply(&mut self, command: NavCommand) {
        match command {
            NavCommand::Push { step } => {
                tracing::debug!(step = %step, depth = self.path.len() + 1, "Navigate");
                self.path.push(step);
            }
            NavCommand::Pop => {
                self.path.pop();
            }
            NavCommand::ResetTo { step } => {
                self.path.clear();
                self.path.push(step);
            }
            NavCommand::SetAuthState { state } => self.auth_state = state,
            NavCommand::SetExistingUser { existing } => self.is_existing_user = existing,
            NavCommand::SetLoggedIn { logged_in } => self.is_logged_in = logged_in,
            NavCommand::StartOtpCountdown { expires_at } => self.otp_expires_at = Some(expires_at),
            NavCommand::ClearOtpCountdown => self.otp_expires_at = None,
            NavCommand::SetSlider { axis, value } => {
                // Values are range-checked before the command is emitted.
                if let Err(e) = self.manual_mbti.set(axis, value) {
                    tracing::warn!("Ignoring slider update: {}", e);
                }
            }
            NavCommand::ResetQuiz => self.quiz_answers.clear(),
            NavCommand::RecordQuizAnswer { choice } => self.quiz_answers.push(choice),
            NavCommand::DropQuizAnswer => {
                self.quiz_answers.pop();
            }
            NavCommand::SetPendingReview { review } => self.pending_review = review,
            NavCommand::ResetSession => *self = Self::default(),
        }
    }
}
