//! Session profile and onboarding data models.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::mbti::MbtiType;
use crate::error::ValidationError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,64}$").unwrap()
});

pub const MIN_HEIGHT_CM: u16 = 100;
pub const MAX_HEIGHT_CM: u16 = 250;
pub const MIN_PREFERRED_AGE: u8 = 19;
pub const MAX_PREFERRED_AGE: u8 = 100;
pub const MAX_DISTANCE_KM: u16 = 100;
/// Photo slots that must be filled before review.
pub const REQUIRED_PHOTOS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrinkingHabit {
    NonDrinker,
    Socially,
    Reviewer,
}

impl std::fmt::Display for DrinkingHabit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonDrinker => write!(f, "Non-drinker"),
            Self::Socially => write!(f, "Socially"),
            Self::Reviewer => write!(f, "Reviewer"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmokingHabit {
    NonSmoker,
    Smoker,
    Electronic,
    TryingToQuit,
}

impl std::fmt::Display for SmokingHabit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonSmoker => write!(f, "Non-smoker"),
            Self::Smoker => write!(f, "Smoker"),
            Self::Electronic => write!(f, "Electronic Cigarette"),
            Self::TryingToQuit => write!(f, "Trying to quit"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreferredGender {
    Male,
    Female,
    #[default]
    Any,
}

/// Inclusive age bounds for matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl Default for AgeRange {
    fn default() -> Self {
        Self { min: 20, max: 35 }
    }
}

impl AgeRange {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min < MIN_PREFERRED_AGE || self.max > MAX_PREFERRED_AGE || self.min > self.max {
            return Err(ValidationError::InvalidAgeRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Who the user wants to be matched with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingPreference {
    pub preferred_gender: PreferredGender,
    pub age_range: AgeRange,
    pub max_distance_km: u16,
    pub filter_smoking: bool,
    pub filter_drinking: bool,
    #[serde(default)]
    pub filter_mbti: BTreeSet<MbtiType>,
}

impl Default for MatchingPreference {
    fn default() -> Self {
        Self {
            preferred_gender: PreferredGender::default(),
            age_range: AgeRange::default(),
            max_distance_km: 10,
            filter_smoking: false,
            filter_drinking: false,
            filter_mbti: BTreeSet::new(),
        }
    }
}

impl MatchingPreference {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.age_range.validate()?;
        if self.max_distance_km == 0 || self.max_distance_km > MAX_DISTANCE_KM {
            return Err(ValidationError::InvalidDistance);
        }
        Ok(())
    }
}

/// Where the profile is in the approval review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    NotSubmitted,
    Pending,
    Approved,
    Rejected { reason: String },
}

/// Opaque reference to an uploaded photo (the upload pipeline is external).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

/// Everything collected about the user during onboarding.
///
/// Owned by the running session; reset on sign-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionProfile {
    pub phone_number: String,
    pub email: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub occupation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<u16>,
    pub university: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drinking: Option<DrinkingHabit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking: Option<SmokingHabit>,
    pub one_line_intro: String,
    pub self_intro: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbti_result: Option<MbtiType>,
    pub notifications_enabled: bool,
    pub location_enabled: bool,
    pub marketing_opt_in: bool,
    #[serde(default)]
    pub personality_answers: BTreeMap<String, String>,
    #[serde(default)]
    pub preferences: MatchingPreference,
    #[serde(default)]
    pub blocked_contacts: Vec<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(default)]
    pub approval_state: ApprovalState,
    /// Review submissions made this session.
    #[serde(default)]
    pub review_submissions: u32,
}

/// A single field write produced by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    PhoneNumber(String),
    Email(String),
    BirthDate(NaiveDate),
    Nickname(String),
    Gender(Gender),
    Occupation(String),
    Height(u16),
    University(String),
    Drinking(DrinkingHabit),
    Smoking(SmokingHabit),
    OneLineIntro(String),
    SelfIntro(String),
    Mbti(MbtiType),
    NotificationsEnabled(bool),
    LocationEnabled(bool),
    MarketingOptIn(bool),
    PersonalityAnswers(BTreeMap<String, String>),
    Preferences(MatchingPreference),
    BlockedContacts(Vec<String>),
    Photos(Vec<PhotoRef>),
    Approval(ApprovalState),
    ReviewSubmitted,
    /// Drop everything collected so far.
    Reset,
}

impl SessionProfile {
    pub fn apply(&mut self, update: ProfileUpdate) {
        match update {
            ProfileUpdate::PhoneNumber(v) => self.phone_number = v,
            ProfileUpdate::Email(v) => self.email = v,
            ProfileUpdate::BirthDate(v) => self.birth_date = Some(v),
            ProfileUpdate::Nickname(v) => self.nickname = v,
            ProfileUpdate::Gender(v) => self.gender = Some(v),
            ProfileUpdate::Occupation(v) => self.occupation = v,
            ProfileUpdate::Height(v) => self.height_cm = Some(v),
            ProfileUpdate::University(v) => self.university = v,
            ProfileUpdate::Drinking(v) => self.drinking = Some(v),
            ProfileUpdate::Smoking(v) => self.smoking = Some(v),
            ProfileUpdate::OneLineIntro(v) => self.one_line_intro = v,
            ProfileUpdate::SelfIntro(v) => self.self_intro = v,
            ProfileUpdate::Mbti(v) => self.mbti_result = Some(v),
            ProfileUpdate::NotificationsEnabled(v) => self.notifications_enabled = v,
            ProfileUpdate::LocationEnabled(v) => self.location_enabled = v,
            ProfileUpdate::MarketingOptIn(v) => self.marketing_opt_in = v,
            ProfileUpdate::PersonalityAnswers(v) => self.personality_answers = v,
            ProfileUpdate::Preferences(v) => self.preferences = v,
            ProfileUpdate::BlockedContacts(v) => self.blocked_contacts = v,
            ProfileUpdate::Photos(v) => self.photos = v,
            ProfileUpdate::Approval(v) => self.approval_state = v,
            ProfileUpdate::ReviewSubmitted => self.review_submissions += 1,
            ProfileUpdate::Reset => *self = Self::default(),
        }
    }

    /// Whether every profile-setup field has been filled in.
    pub fn is_profile_complete(&self) -> bool {
        self.birth_date.is_some()
            && !self.nickname.is_empty()
            && self.gender.is_some()
            && !self.occupation.is_empty()
            && self.height_cm.is_some()
            && !self.university.is_empty()
            && self.drinking.is_some()
            && self.smoking.is_some()
            && !self.one_line_intro.is_empty()
            && !self.self_intro.is_empty()
    }

    pub fn is_approved(&self) -> bool {
        self.approval_state == ApprovalState::Approved
    }
}

/// Full years between `birth` and `today`; zero for future dates.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    if birth > today {
        return 0;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Strip spaces and dashes and check for `+` followed by 8 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = compact
        .strip_prefix('+')
        .ok_or(ValidationError::InvalidPhone)?;
    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(compact)
}

pub fn is_valid_otp(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// Trim a required text field, failing when nothing is left.
pub fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(trimmed.to_string())
}
