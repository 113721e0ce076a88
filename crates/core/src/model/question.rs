use url::Url;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One exam question as loaded from a bank row.
///
/// The prompt itself lives in an external image resource located by
/// `topic` and `number`; the record carries only what the engine needs to
/// score and explain an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    id: QuestionId,
    topic: TopicId,
    number: u32,
    correct_answer: String,
    explanation: String,
    reference_link: Option<String>,
}

impl Question {
    #[must_use]
    pub fn new(
        id: QuestionId,
        topic: TopicId,
        number: u32,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
        reference_link: Option<String>,
    ) -> Self {
        Self {
            id,
            topic,
            number,
            correct_answer: correct_answer.into(),
            explanation: explanation.into(),
            reference_link: reference_link.filter(|l| !l.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> TopicId {
        self.topic
    }

    /// Ordinal within the bank, used to locate the question's image.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn reference_link(&self) -> Option<&str> {
        self.reference_link.as_deref()
    }

    /// The reference link parsed as a URL, when present and well formed.
    ///
    /// Links come straight from spreadsheet cells; a malformed value is
    /// treated the same as no link at all.
    #[must_use]
    pub fn reference_url(&self) -> Option<Url> {
        self.reference_link
            .as_deref()
            .and_then(|l| Url::parse(l.trim()).ok())
    }

    /// Whether `user_input` counts as a correct answer to this question.
    #[must_use]
    pub fn accepts(&self, user_input: &str) -> bool {
        answers_match(user_input, &self.correct_answer)
    }
}

/// Case-insensitive answer comparison, ignoring surrounding whitespace on
/// both sides. No partial credit, no multi-token support.
#[must_use]
pub fn answers_match(user_input: &str, expected: &str) -> bool {
    user_input.trim().to_uppercase() == expected.trim().to_uppercase()
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
