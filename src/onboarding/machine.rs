//! Onboarding state machine.
//!
//! Pure transition functions: given the navigation state, the profile and
//! an event, decide which profile writes, navigation commands and
//! collaborator calls follow. Nothing here performs I/O. Steps that need
//! the auth provider or the reviewer emit an `Effect`; the manager runs it
//! and feeds the result back through [`StateMachine::resolve`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::mbti::{self, Axis, ManualSliders, QuizChoice};
use super::model::{
    self, ApprovalState, DrinkingHabit, Gender, MatchingPreference, PhotoRef, ProfileUpdate,
    SessionProfile, SmokingHabit, MAX_HEIGHT_CM, MIN_HEIGHT_CM, REQUIRED_PHOTOS,
};
use super::personality;
use super::state::{AuthState, NavCommand, NavigationState, OnboardingStep, ProfileStep};
use crate::auth::{AccountStatus, OtpTarget};
use crate::config::OnboardingConfig;
use crate::error::ValidationError;
use crate::review::{ReviewId, ReviewStatus};

/// Input submitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnboardingEvent {
    Start,
    Back,
    Continue,
    SubmitPhone {
        phone: String,
    },
    SubmitOtp {
        code: String,
    },
    ResendOtp,
    UseEmailVerification {
        email: String,
    },
    ResolvePermission {
        granted: bool,
    },
    AcceptTerms {
        terms: bool,
        privacy: bool,
        #[serde(default)]
        marketing: bool,
    },
    SubmitEmail {
        email: String,
    },
    SubmitBirthday {
        date: NaiveDate,
    },
    SubmitNickname {
        nickname: String,
    },
    SelectGender {
        gender: Gender,
    },
    SubmitOccupation {
        occupation: String,
    },
    SubmitHeight {
        height_cm: u16,
    },
    SubmitUniversity {
        university: String,
    },
    SelectDrinking {
        habit: DrinkingHabit,
    },
    SelectSmoking {
        habit: SmokingHabit,
    },
    SubmitOneLineIntro {
        intro: String,
    },
    SubmitSelfIntro {
        intro: String,
    },
    SetMbtiSlider {
        axis: Axis,
        value: f64,
    },
    CompleteManualMbti,
    DontKnowMbti,
    StartMbtiTest,
    AnswerMbtiQuestion {
        choice: QuizChoice,
    },
    RetakeMbtiTest,
    SubmitPersonalityQa {
        answers: BTreeMap<String, usize>,
    },
    SubmitMatchingPreference {
        preference: MatchingPreference,
    },
    SubmitContactBlocking {
        #[serde(default)]
        contacts: Vec<String>,
    },
    /// One entry per photo slot; empty slots are `null`.
    SubmitPhotos {
        photos: Vec<Option<PhotoRef>>,
    },
    ResubmitPhotos,
    RetryReview,
    SignOut,
}

impl OnboardingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Back => "back",
            Self::Continue => "continue",
            Self::SubmitPhone { .. } => "submit_phone",
            Self::SubmitOtp { .. } => "submit_otp",
            Self::ResendOtp => "resend_otp",
            Self::UseEmailVerification { .. } => "use_email_verification",
            Self::ResolvePermission { .. } => "resolve_permission",
            Self::AcceptTerms { .. } => "accept_terms",
            Self::SubmitEmail { .. } => "submit_email",
            Self::SubmitBirthday { .. } => "submit_birthday",
            Self::SubmitNickname { .. } => "submit_nickname",
            Self::SelectGender { .. } => "select_gender",
            Self::SubmitOccupation { .. } => "submit_occupation",
            Self::SubmitHeight { .. } => "submit_height",
            Self::SubmitUniversity { .. } => "submit_university",
            Self::SelectDrinking { .. } => "select_drinking",
            Self::SelectSmoking { .. } => "select_smoking",
            Self::SubmitOneLineIntro { .. } => "submit_one_line_intro",
            Self::SubmitSelfIntro { .. } => "submit_self_intro",
            Self::SetMbtiSlider { .. } => "set_mbti_slider",
            Self::CompleteManualMbti => "complete_manual_mbti",
            Self::DontKnowMbti => "dont_know_mbti",
            Self::StartMbtiTest => "start_mbti_test",
            Self::AnswerMbtiQuestion { .. } => "answer_mbti_question",
            Self::RetakeMbtiTest => "retake_mbti_test",
            Self::SubmitPersonalityQa { .. } => "submit_personality_qa",
            Self::SubmitMatchingPreference { .. } => "submit_matching_preference",
            Self::SubmitContactBlocking { .. } => "submit_contact_blocking",
            Self::SubmitPhotos { .. } => "submit_photos",
            Self::ResubmitPhotos => "resubmit_photos",
            Self::RetryReview => "retry_review",
            Self::SignOut => "sign_out",
        }
    }
}

/// A collaborator call requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Existence check (best-effort) followed by an OTP send (required).
    StartPhoneVerification { phone: String },
    StartEmailVerification { email: String },
    ResendOtp { target: OtpTarget },
    VerifyOtp { target: OtpTarget, code: String },
    SubmitForReview { photos: Vec<PhotoRef> },
    PollReview { review: ReviewId },
    SignOut,
}

/// What a completed collaborator call reported back.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    PhoneOtpSent { phone: String, existing_user: bool },
    EmailOtpSent { email: String },
    OtpResent,
    OtpVerified { account: AccountStatus },
    ReviewSubmitted { review: ReviewId, photos: Vec<PhotoRef> },
    ReviewDecided { status: ReviewStatus },
    ReviewTimedOut,
    SignedOut,
}

/// Writes and calls produced by one transition. Updates and commands are
/// applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub updates: Vec<ProfileUpdate>,
    pub commands: Vec<NavCommand>,
    pub effects: Vec<Effect>,
    /// User-facing message to surface without rejecting the transition.
    pub notice: Option<String>,
}

impl Transition {
    pub fn push(step: OnboardingStep) -> Self {
        Self::default().command(NavCommand::Push { step })
    }

    pub fn effect(effect: Effect) -> Self {
        Self {
            effects: vec![effect],
            ..Self::default()
        }
    }

    pub fn update(mut self, update: ProfileUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn command(mut self, command: NavCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Clock and rules a transition is evaluated against.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    pub min_age: u32,
    pub otp_validity: TimeDelta,
    pub max_review_submissions: u32,
}

impl TransitionContext {
    pub fn new(config: &OnboardingConfig, now: DateTime<Utc>) -> Self {
        Self {
            now,
            min_age: config.min_age,
            otp_validity: TimeDelta::from_std(config.otp_validity)
                .unwrap_or_else(|_| TimeDelta::minutes(3)),
            max_review_submissions: config.max_review_submissions,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

fn unexpected(event: &OnboardingEvent, step: &OnboardingStep) -> ValidationError {
    ValidationError::UnexpectedEvent {
        event: event.name().to_string(),
        step: step.to_string(),
    }
}

/// Push the sub-step after `field`, or leave the subflow for MBTI entry.
fn after_profile_step(field: ProfileStep) -> Transition {
    match field.next() {
        Some(next) => Transition::push(OnboardingStep::ProfileSetup { field: next }),
        None => Transition::push(OnboardingStep::MbtiManualInput),
    }
}

/// Pure onboarding state machine.
pub struct StateMachine;

impl StateMachine {
    /// Decide what `event` does on the current step. Rejected events leave
    /// the session untouched.
    pub fn transition(
        nav: &NavigationState,
        profile: &SessionProfile,
        event: &OnboardingEvent,
        ctx: &TransitionContext,
    ) -> Result<Transition, ValidationError> {
        use OnboardingEvent as E;
        use OnboardingStep as S;

        let step = nav.current_step();

        if let E::SignOut = event {
            return Ok(Transition::effect(Effect::SignOut));
        }
        if step.is_terminal() {
            return Err(ValidationError::Terminal);
        }
        if let E::Back = event {
            return match step {
                S::Landing | S::ApprovalWaiting => Err(ValidationError::NothingToPop),
                _ if nav.depth() == 0 => Err(ValidationError::NothingToPop),
                _ => Ok(back(nav, &step)),
            };
        }

        let transition = match (&step, event) {
            (S::Landing, E::Start) => Transition::push(S::PhoneInput),

            (S::PhoneInput, E::SubmitPhone { phone }) => {
                let phone = model::normalize_phone(phone)?;
                Transition::effect(Effect::StartPhoneVerification { phone })
            }

            (S::Verification { phone }, E::SubmitOtp { code }) => {
                check_code(nav, code, ctx)?;
                Transition::effect(Effect::VerifyOtp {
                    target: OtpTarget::Phone(phone.clone()),
                    code: code.clone(),
                })
            }
            (S::EmailVerification { email }, E::SubmitOtp { code }) => {
                check_code(nav, code, ctx)?;
                Transition::effect(Effect::VerifyOtp {
                    target: OtpTarget::Email(email.clone()),
                    code: code.clone(),
                })
            }
            (S::Verification { phone }, E::ResendOtp) => Transition::effect(Effect::ResendOtp {
                target: OtpTarget::Phone(phone.clone()),
            }),
            (S::EmailVerification { email }, E::ResendOtp) => {
                Transition::effect(Effect::ResendOtp {
                    target: OtpTarget::Email(email.clone()),
                })
            }
            (S::Verification { .. }, E::UseEmailVerification { email }) => {
                if !nav.is_existing_user {
                    return Err(ValidationError::EmailPathUnavailable);
                }
                let email = email.trim();
                if !model::is_valid_email(email) {
                    return Err(ValidationError::InvalidEmail);
                }
                Transition::effect(Effect::StartEmailVerification {
                    email: email.to_string(),
                })
            }

            (S::NotificationPermission, E::ResolvePermission { granted }) => {
                Transition::push(S::LocationPermission)
                    .update(ProfileUpdate::NotificationsEnabled(*granted))
            }
            (S::LocationPermission, E::ResolvePermission { granted }) => {
                Transition::push(S::Terms).update(ProfileUpdate::LocationEnabled(*granted))
            }

            (
                S::Terms,
                E::AcceptTerms {
                    terms,
                    privacy,
                    marketing,
                },
            ) => {
                if !(*terms && *privacy) {
                    return Err(ValidationError::TermsNotAccepted);
                }
                Transition::push(S::EmailInput).update(ProfileUpdate::MarketingOptIn(*marketing))
            }

            (S::EmailInput, E::SubmitEmail { email }) => {
                let email = email.trim();
                if !model::is_valid_email(email) {
                    return Err(ValidationError::InvalidEmail);
                }
                Transition::push(S::ProfileSetup {
                    field: ProfileStep::FIRST,
                })
                .update(ProfileUpdate::Email(email.to_string()))
            }

            (S::ProfileSetup { field }, event) => profile_setup(*field, event, ctx)
                .ok_or_else(|| unexpected(event, &step))??,

            (S::MbtiManualInput, E::SetMbtiSlider { axis, value }) => {
                ManualSliders::check(*value)?;
                Transition::default().command(NavCommand::SetSlider {
                    axis: *axis,
                    value: *value,
                })
            }
            (S::MbtiManualInput, E::CompleteManualMbti) => {
                let code = nav.manual_mbti.resolve()?;
                Transition::push(S::MbtiResult).update(ProfileUpdate::Mbti(code))
            }
            (S::MbtiManualInput, E::DontKnowMbti) => Transition::push(S::MbtiTestIntro),
            (S::MbtiTestIntro, E::StartMbtiTest) => {
                Transition::default()
                    .command(NavCommand::ResetQuiz)
                    .command(NavCommand::Push { step: S::MbtiTest })
            }
            (S::MbtiTest, E::AnswerMbtiQuestion { choice }) => {
                if nav.quiz_answers.len() >= mbti::QUESTIONS.len() {
                    return Err(ValidationError::QuizComplete);
                }
                let mut answers = nav.quiz_answers.clone();
                answers.push(*choice);
                let recorded =
                    Transition::default().command(NavCommand::RecordQuizAnswer { choice: *choice });
                if answers.len() < mbti::QUESTIONS.len() {
                    recorded
                } else {
                    let code = mbti::score(&answers);
                    tracing::info!(code = %code, "MBTI test scored");
                    recorded
                        .update(ProfileUpdate::Mbti(code))
                        .command(NavCommand::Push { step: S::MbtiResult })
                }
            }
            (S::MbtiResult, E::RetakeMbtiTest) => Transition::push(S::MbtiTestIntro),
            (S::MbtiResult, E::Continue) => {
                if profile.mbti_result.is_none() {
                    return Err(ValidationError::MbtiMissing);
                }
                Transition::push(S::PersonalityQaIntro)
            }

            (S::PersonalityQaIntro, E::Continue) => Transition::push(S::PersonalityQa),
            (S::PersonalityQa, E::SubmitPersonalityQa { answers }) => {
                let resolved = personality::resolve_answers(answers)?;
                Transition::push(S::MatchingPreference)
                    .update(ProfileUpdate::PersonalityAnswers(resolved))
            }

            (S::MatchingPreference, E::SubmitMatchingPreference { preference }) => {
                preference.validate()?;
                Transition::push(S::ContactBlocking)
                    .update(ProfileUpdate::Preferences(preference.clone()))
            }

            (S::ContactBlocking, E::SubmitContactBlocking { contacts }) => {
                let contacts: Vec<String> = contacts
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                Transition::push(S::PhotoUpload).update(ProfileUpdate::BlockedContacts(contacts))
            }

            (S::PhotoUpload, E::SubmitPhotos { photos }) => {
                let filled: Vec<PhotoRef> = photos
                    .iter()
                    .flatten()
                    .filter(|p| !p.0.trim().is_empty())
                    .cloned()
                    .collect();
                if filled.len() < REQUIRED_PHOTOS {
                    return Err(ValidationError::MissingPhotos {
                        required: REQUIRED_PHOTOS,
                        provided: filled.len(),
                    });
                }
                if profile.review_submissions >= ctx.max_review_submissions {
                    return Err(ValidationError::ResubmissionLimit {
                        limit: ctx.max_review_submissions,
                    });
                }
                Transition::effect(Effect::SubmitForReview { photos: filled })
            }

            (S::ApprovalWaiting, E::ResubmitPhotos) => {
                if !matches!(profile.approval_state, ApprovalState::Rejected { .. }) {
                    return Err(ValidationError::NotRejected);
                }
                Transition::default()
                    .command(NavCommand::SetAuthState {
                        state: AuthState::Onboarding,
                    })
                    .command(NavCommand::Push { step: S::PhotoUpload })
            }
            (S::ApprovalWaiting, E::RetryReview) => match (&profile.approval_state, nav.pending_review)
            {
                (ApprovalState::Pending, Some(review)) => {
                    Transition::effect(Effect::PollReview { review })
                }
                _ => return Err(ValidationError::NoPendingReview),
            },

            (step, event) => return Err(unexpected(event, step)),
        };

        Ok(transition)
    }

    /// Turn a collaborator result into the writes that complete the step.
    pub fn resolve(
        nav: &NavigationState,
        _profile: &SessionProfile,
        outcome: GatewayOutcome,
        ctx: &TransitionContext,
    ) -> Transition {
        use OnboardingStep as S;

        match outcome {
            GatewayOutcome::PhoneOtpSent {
                phone,
                existing_user,
            } => Transition::default()
                .update(ProfileUpdate::PhoneNumber(phone.clone()))
                .command(NavCommand::SetExistingUser {
                    existing: existing_user,
                })
                .command(NavCommand::SetAuthState {
                    state: AuthState::CheckingOtp,
                })
                .command(NavCommand::StartOtpCountdown {
                    expires_at: ctx.now + ctx.otp_validity,
                })
                .command(NavCommand::Push {
                    step: S::Verification { phone },
                }),

            GatewayOutcome::EmailOtpSent { email } => Transition::default()
                .update(ProfileUpdate::Email(email.clone()))
                .command(NavCommand::StartOtpCountdown {
                    expires_at: ctx.now + ctx.otp_validity,
                })
                .command(NavCommand::Push {
                    step: S::EmailVerification { email },
                }),

            GatewayOutcome::OtpResent => Transition::default().command(NavCommand::StartOtpCountdown {
                expires_at: ctx.now + ctx.otp_validity,
            }),

            GatewayOutcome::OtpVerified { account } => match account {
                AccountStatus::New => Transition::default()
                    .command(NavCommand::SetAuthState {
                        state: AuthState::Onboarding,
                    })
                    .command(NavCommand::Push {
                        step: S::NotificationPermission,
                    }),
                AccountStatus::PendingApproval => Transition::default()
                    .update(ProfileUpdate::Approval(ApprovalState::Pending))
                    .command(NavCommand::SetAuthState {
                        state: AuthState::PendingApproval,
                    })
                    .command(NavCommand::ResetTo {
                        step: S::ApprovalWaiting,
                    }),
                AccountStatus::Approved => approved(),
            },

            GatewayOutcome::ReviewSubmitted { review, photos } => Transition::default()
                .update(ProfileUpdate::Photos(photos))
                .update(ProfileUpdate::ReviewSubmitted)
                .update(ProfileUpdate::Approval(ApprovalState::Pending))
                .command(NavCommand::SetAuthState {
                    state: AuthState::PendingApproval,
                })
                .command(NavCommand::SetPendingReview {
                    review: Some(review),
                })
                .command(NavCommand::ResetTo {
                    step: S::ApprovalWaiting,
                })
                .with_effect(Effect::PollReview { review }),

            GatewayOutcome::ReviewDecided { status } => match status {
                ReviewStatus::Pending => Transition::default(),
                ReviewStatus::Approved => {
                    approved().command(NavCommand::SetPendingReview { review: None })
                }
                ReviewStatus::Rejected { reason } => {
                    tracing::info!(reason = %reason, "Profile review rejected");
                    Transition::default()
                        .update(ProfileUpdate::Approval(ApprovalState::Rejected { reason }))
                        .command(NavCommand::SetPendingReview { review: None })
                }
            },

            GatewayOutcome::ReviewTimedOut => {
                let mut transition = Transition::default();
                if nav.pending_review.is_some() {
                    transition.notice = Some(
                        "Your review is taking longer than expected. Retry, or contact support if this keeps happening."
                            .to_string(),
                    );
                }
                transition
            }

            GatewayOutcome::SignedOut => Transition::default()
                .update(ProfileUpdate::Reset)
                .command(NavCommand::ResetSession),
        }
    }
}

fn approved() -> Transition {
    Transition::default()
        .update(ProfileUpdate::Approval(ApprovalState::Approved))
        .command(NavCommand::SetAuthState {
            state: AuthState::Approved,
        })
        .command(NavCommand::SetLoggedIn { logged_in: true })
        .command(NavCommand::ResetTo {
            step: OnboardingStep::Completed,
        })
}

/// Pop the current step, undoing the working data that only belongs to it.
fn back(nav: &NavigationState, step: &OnboardingStep) -> Transition {
    use OnboardingStep as S;

    let transition = match step {
        S::Verification { .. } => Transition::default()
            .command(NavCommand::SetAuthState {
                state: AuthState::Unauthenticated,
            })
            .command(NavCommand::ClearOtpCountdown),
        // Back on the phone code screen; the email code no longer applies.
        S::EmailVerification { .. } => {
            Transition::default().command(NavCommand::ClearOtpCountdown)
        }
        // Reopening the last question: its answer is asked again.
        S::MbtiResult if nav.previous_step() == S::MbtiTest => {
            Transition::default().command(NavCommand::DropQuizAnswer)
        }
        _ => Transition::default(),
    };
    transition.command(NavCommand::Pop)
}

fn check_code(
    nav: &NavigationState,
    code: &str,
    ctx: &TransitionContext,
) -> Result<(), ValidationError> {
    if !model::is_valid_otp(code) {
        return Err(ValidationError::InvalidOtpFormat);
    }
    if nav.otp_expires_at.is_some_and(|expires_at| ctx.now > expires_at) {
        return Err(ValidationError::OtpExpired);
    }
    Ok(())
}

/// Profile-setup sub-steps. `None` means the event does not belong to `field`.
fn profile_setup(
    field: ProfileStep,
    event: &OnboardingEvent,
    ctx: &TransitionContext,
) -> Option<Result<Transition, ValidationError>> {
    use OnboardingEvent as E;
    use ProfileStep as P;

    let update = match (field, event) {
        (P::Birthday, E::SubmitBirthday { date }) => {
            if model::age_on(*date, ctx.today()) < ctx.min_age {
                return Some(Err(ValidationError::Underage {
                    min_age: ctx.min_age,
                }));
            }
            Ok(ProfileUpdate::BirthDate(*date))
        }
        (P::Nickname, E::SubmitNickname { nickname }) => {
            model::required_text("Nickname", nickname).map(ProfileUpdate::Nickname)
        }
        (P::Gender, E::SelectGender { gender }) => Ok(ProfileUpdate::Gender(*gender)),
        (P::Occupation, E::SubmitOccupation { occupation }) => {
            model::required_text("Occupation", occupation).map(ProfileUpdate::Occupation)
        }
        (P::Height, E::SubmitHeight { height_cm }) => {
            if (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(height_cm) {
                Ok(ProfileUpdate::Height(*height_cm))
            } else {
                Err(ValidationError::InvalidHeight {
                    min: MIN_HEIGHT_CM,
                    max: MAX_HEIGHT_CM,
                })
            }
        }
        (P::University, E::SubmitUniversity { university }) => {
            model::required_text("University", university).map(ProfileUpdate::University)
        }
        (P::Drinking, E::SelectDrinking { habit }) => Ok(ProfileUpdate::Drinking(*habit)),
        (P::Smoking, E::SelectSmoking { habit }) => Ok(ProfileUpdate::Smoking(*habit)),
        (P::OneLineIntro, E::SubmitOneLineIntro { intro }) => {
            model::required_text("One-line intro", intro).map(ProfileUpdate::OneLineIntro)
        }
        (P::SelfIntro, E::SubmitSelfIntro { intro }) => {
            model::required_text("Self intro", intro).map(ProfileUpdate::SelfIntro)
        }
        _ => return None,
    };

    Some(update.map(|update| after_profile_step(field).update(update)))
}
