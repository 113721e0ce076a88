use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use std::fmt;

use quiz_core::model::{
    CertId, Question, QuestionBank, QuestionId, Score, TopicFilter, TopicId, answers_match,
};

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// In-memory quiz session for one certification.
///
/// Owns its question bank, the active topic filter, the draw order and
/// the running score. Draws are a shuffle-bag: a shuffled arena of the
/// active subset's ids stepped by a cursor, reshuffled when exhausted, so
/// no question repeats within a filter epoch until every question in the
/// subset has been shown.
pub struct QuizSession {
    cert: CertId,
    bank: QuestionBank,
    filter: TopicFilter,
    order: Vec<QuestionId>,
    cursor: usize,
    score: Score,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Create a session over a freshly loaded bank, starting on the
    /// "all" filter. An empty bank is a valid, representable state.
    #[must_use]
    pub fn new(bank: QuestionBank) -> Self {
        let mut session = Self {
            cert: bank.cert().clone(),
            bank,
            filter: TopicFilter::All,
            order: Vec::new(),
            cursor: 0,
            score: Score::new(),
            started_at: Utc::now(),
        };
        session.rebuild_order();
        session
    }

    #[must_use]
    pub fn cert(&self) -> &CertId {
        &self.cert
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn filter(&self) -> TopicFilter {
        self.filter
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Topics offered for filtering: distinct, ascending, unclassified
    /// excluded.
    #[must_use]
    pub fn topic_choices(&self) -> Vec<TopicId> {
        self.bank.topic_choices()
    }

    /// Size of the active subset under the current filter.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.order.len()
    }

    /// Number of questions shown since the last filter change or
    /// exhaustion reshuffle.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.cursor
    }

    /// Ids shown in the current filter epoch, in draw order.
    #[must_use]
    pub fn seen_ids(&self) -> &[QuestionId] {
        &self.order[..self.cursor]
    }

    /// Change the active topic filter.
    ///
    /// The seen state is cleared unconditionally, even when the filter is
    /// set to its current value. The score persists: only a certification
    /// change (a new session) or an explicit `reset` clears it.
    pub fn set_filter(&mut self, filter: TopicFilter) {
        self.filter = filter;
        self.rebuild_order();
    }

    /// Draw the next unseen question from the active subset.
    ///
    /// When every question in the subset has been shown, the bag reshuffles
    /// and the draw proceeds over the full subset again. Returns `None`
    /// only when the active subset itself is empty.
    pub fn next_question(&mut self) -> Option<&Question> {
        if self.order.is_empty() {
            return None;
        }

        if self.cursor >= self.order.len() {
            self.order.shuffle(&mut rng());
            self.cursor = 0;
        }

        let id = self.order[self.cursor];
        self.cursor += 1;
        self.bank.get(id)
    }

    /// Whether `user_input` answers `question` correctly. Side-effect
    /// free; recording is a separate step.
    #[must_use]
    pub fn check_answer(&self, user_input: &str, question: &Question) -> bool {
        answers_match(user_input, question.correct_answer())
    }

    /// Record one answered question in the running score.
    pub fn record_answer(&mut self, is_correct: bool) {
        self.score.record(is_correct);
    }

    /// Clear the score and the seen state. Called on certification change.
    pub fn reset(&mut self) {
        self.score.reset();
        self.rebuild_order();
    }

    fn rebuild_order(&mut self) {
        self.order = self.bank.matching_ids(self.filter);
        self.order.shuffle(&mut rng());
        self.cursor = 0;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("cert", &self.cert)
            .field("bank_len", &self.bank.len())
            .field("filter", &self.filter)
            .field("available", &self.order.len())
            .field("seen", &self.cursor)
            .field("score", &self.score)
            .field("started_at", &self.started_at)
            .finish()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
