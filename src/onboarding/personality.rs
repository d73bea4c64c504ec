//! Personality Q&A: relationship-style questions asked after the MBTI step.

use std::collections::BTreeMap;

use crate::error::ValidationError;

/// One multiple-choice question.
#[derive(Debug, Clone, Copy)]
pub struct QaQuestion {
    pub category: &'static str,
    pub question: &'static str,
    pub options: &'static [&'static str],
}

pub const QA_QUESTIONS: [QaQuestion; 4] = [
    QaQuestion {
        category: "skinship",
        question: "How do you feel about public displays of affection?",
        options: &[
            "Love it! Everywhere provided.",
            "Fine with holding hands.",
            "Prefer to keep it private.",
        ],
    },
    QaQuestion {
        category: "drinking",
        question: "What is your drinking style?",
        options: &[
            "Enjoy the atmosphere.",
            "Drink until I drop!",
            "Prefer non-alcoholic fun.",
        ],
    },
    QaQuestion {
        category: "dating",
        question: "How often do you prefer to contact your partner?",
        options: &[
            "Every hour!",
            "Morning & Night.",
            "Just for making plans.",
            "When I have time.",
        ],
    },
    QaQuestion {
        category: "spending",
        question: "What's your stance on dating expenses?",
        options: &[
            "I'll pay for everything.",
            "Let's go 50/50.",
            "Take turns paying.",
            "Whoever asks pays.",
        ],
    },
];

/// Check a category → option-index map against the bank and resolve each
/// answer to its option text. Unknown categories are ignored.
pub fn resolve_answers(
    answers: &BTreeMap<String, usize>,
) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut resolved = BTreeMap::new();
    let mut missing = 0;
    for question in &QA_QUESTIONS {
        match answers.get(question.category) {
            Some(&option) => {
                let text = question.options.get(option).ok_or_else(|| {
                    ValidationError::InvalidAnswer {
                        category: question.category.to_string(),
                        option,
                    }
                })?;
                resolved.insert(question.category.to_string(), (*text).to_string());
            }
            None => missing += 1,
        }
    }
    if missing > 0 {
        return Err(ValidationError::IncompleteAnswers { missing });
    }
    Ok(resolved)
}
