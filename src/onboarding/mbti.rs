//! MBTI personality types: the 16-code set, manual slider entry, and the
//! forced-choice test used when the user does not know their type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Every valid 4-letter code.
pub const ALL_TYPES: [&str; 16] = [
    "ISTJ", "ISFJ", "INFJ", "INTJ", "ISTP", "ISFP", "INFP", "INTP", "ESTP", "ESFP", "ENFP",
    "ENTP", "ESTJ", "ESFJ", "ENFJ", "ENTJ",
];

/// A member of the fixed 16-code set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MbtiType(String);

impl MbtiType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_letters(letters: [char; 4]) -> Self {
        // Every combination of one letter per axis is in ALL_TYPES.
        Self(letters.iter().collect())
    }
}

impl FromStr for MbtiType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if ALL_TYPES.contains(&code.as_str()) {
            Ok(Self(code))
        } else {
            Err(ValidationError::UnknownMbti {
                code: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for MbtiType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MbtiType> for String {
    fn from(value: MbtiType) -> Self {
        value.0
    }
}

impl fmt::Display for MbtiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four independent MBTI axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// E vs I
    Energy,
    /// N vs S
    Information,
    /// F vs T
    Decision,
    /// P vs J
    Lifestyle,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Energy, Axis::Information, Axis::Decision, Axis::Lifestyle];

    /// Letter chosen by a positive score (or the left half of a slider).
    pub fn positive(&self) -> char {
        match self {
            Self::Energy => 'E',
            Self::Information => 'N',
            Self::Decision => 'F',
            Self::Lifestyle => 'P',
        }
    }

    /// Letter chosen by a zero or negative score (or the right half of a slider).
    pub fn negative(&self) -> char {
        match self {
            Self::Energy => 'I',
            Self::Information => 'S',
            Self::Decision => 'T',
            Self::Lifestyle => 'J',
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Energy => 0,
            Self::Information => 1,
            Self::Decision => 2,
            Self::Lifestyle => 3,
        }
    }
}

/// Value a slider starts at; a slider left here counts as unset.
pub const SLIDER_MIDPOINT: f64 = 0.5;

/// Manual entry: one slider per axis over `0.0..=1.0`. Values below the
/// midpoint pick the positive letter, values above it the negative one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualSliders {
    pub energy: f64,
    pub information: f64,
    pub decision: f64,
    pub lifestyle: f64,
}

impl Default for ManualSliders {
    fn default() -> Self {
        Self {
            energy: SLIDER_MIDPOINT,
            information: SLIDER_MIDPOINT,
            decision: SLIDER_MIDPOINT,
            lifestyle: SLIDER_MIDPOINT,
        }
    }
}

impl ManualSliders {
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Energy => self.energy,
            Axis::Information => self.information,
            Axis::Decision => self.decision,
            Axis::Lifestyle => self.lifestyle,
        }
    }

    /// Validate a slider value without storing it.
    pub fn check(value: f64) -> Result<(), ValidationError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::InvalidSliderValue {
                value: value.to_string(),
            })
        }
    }

    pub fn set(&mut self, axis: Axis, value: f64) -> Result<(), ValidationError> {
        Self::check(value)?;
        let slot = match axis {
            Axis::Energy => &mut self.energy,
            Axis::Information => &mut self.information,
            Axis::Decision => &mut self.decision,
            Axis::Lifestyle => &mut self.lifestyle,
        };
        *slot = value;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        Axis::ALL
            .iter()
            .all(|axis| (self.get(*axis) - SLIDER_MIDPOINT).abs() > f64::EPSILON)
    }

    /// Resolve the sliders to a code. Fails while any slider sits at the midpoint.
    pub fn resolve(&self) -> Result<MbtiType, ValidationError> {
        if !self.is_complete() {
            return Err(ValidationError::MbtiIncomplete);
        }
        let letters = Axis::ALL.map(|axis| {
            if self.get(axis) < SLIDER_MIDPOINT {
                axis.positive()
            } else {
                axis.negative()
            }
        });
        Ok(MbtiType::from_letters(letters))
    }
}

/// One forced-choice test question.
#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub id: u8,
    pub text: &'static str,
    pub option_a: &'static str,
    pub option_b: &'static str,
    pub axis: Axis,
    pub option_a_weight: i32,
    pub option_b_weight: i32,
}

const fn question(
    id: u8,
    text: &'static str,
    option_a: &'static str,
    option_b: &'static str,
    axis: Axis,
) -> Question {
    Question {
        id,
        text,
        option_a,
        option_b,
        axis,
        option_a_weight: 1,
        option_b_weight: -1,
    }
}

/// The test bank: three questions per axis.
pub const QUESTIONS: [Question; 12] = [
    question(1, "At a party, you usually...", "Talk to many people", "Stick to a few friends", Axis::Energy),
    question(2, "After a long week, you prefer...", "Going out with friends", "Staying home alone", Axis::Energy),
    question(3, "You feel more energetic...", "With others", "By yourself", Axis::Energy),
    question(4, "You focus more on...", "Possibilities & Future", "Facts & Reality", Axis::Information),
    question(5, "You trust...", "Your gut instinct", "Concrete evidence", Axis::Information),
    question(6, "You prefer descriptions that are...", "Metaphorical", "Literal", Axis::Information),
    question(7, "In arguments, you prioritize...", "People's feelings", "Logic and truth", Axis::Decision),
    question(8, "You are more capable of being...", "Compassionate", "Objective", Axis::Decision),
    question(9, "When making decisions, you listen to...", "Your heart", "Your brain", Axis::Decision),
    question(10, "You prefer to...", "Go with the flow", "Stick to a plan", Axis::Lifestyle),
    question(11, "Your workspace is usually...", "A bit messy", "Organized", Axis::Lifestyle),
    question(12, "Deadlines represent...", "Suggestions", "Commands", Axis::Lifestyle),
];

/// Answer to a test question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizChoice {
    OptionA,
    OptionB,
}

/// Signed score per axis, in `Axis::ALL` order. Answers beyond the bank
/// are ignored.
pub fn axis_scores(answers: &[QuizChoice]) -> [i32; 4] {
    let mut scores = [0; 4];
    for (question, choice) in QUESTIONS.iter().zip(answers) {
        let weight = match choice {
            QuizChoice::OptionA => question.option_a_weight,
            QuizChoice::OptionB => question.option_b_weight,
        };
        scores[question.axis.index()] += weight;
    }
    scores
}

/// Score a test. A tie on an axis resolves to the negative letter.
pub fn score(answers: &[QuizChoice]) -> MbtiType {
    let scores = axis_scores(answers);
    let letters = Axis::ALL.map(|axis| {
        if scores[axis.index()] > 0 {
            axis.positive()
        } else {
            axis.negative()
        }
    });
    MbtiType::from_letters(letters)
}
