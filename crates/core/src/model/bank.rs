use std::fmt;

use thiserror::Error;

use crate::model::ids::{CertId, QuestionId, TopicId};
use crate::model::question::Question;
use crate::model::table::{Cell, RawTable};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Loading a bank only fails on a data-contract violation: the workbook
/// must carry the columns the engine scores with. Malformed *values* are
/// normalized, never rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("bank is missing required column '{name}'")]
    MissingColumn { name: String },
}

//
// ─── COLUMNS ───────────────────────────────────────────────────────────────────
//

/// Header names as they appear in the source workbooks.
pub mod columns {
    pub const TOPIC: &str = "Topic";
    pub const NUMBER: &str = "Numero";
    pub const CORRECT_ANSWER: &str = "Risposta Esatta";
    pub const EXPLANATION: &str = "Commento";
    pub const LINK: &str = "Link";
}

//
// ─── TOPIC FILTER ──────────────────────────────────────────────────────────────
//

/// Selector for the active subset: the whole bank, or one exact topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicFilter {
    All,
    Topic(TopicId),
}

impl TopicFilter {
    /// Whether a question belongs to the subset this filter selects.
    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        match self {
            TopicFilter::All => true,
            TopicFilter::Topic(topic) => question.topic() == *topic,
        }
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicFilter::All => write!(f, "all"),
            TopicFilter::Topic(topic) => write!(f, "topic {topic}"),
        }
    }
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// The full ordered set of questions for one certification.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBank {
    cert: CertId,
    questions: Vec<Question>,
}

impl QuestionBank {
    /// A bank with no questions. Loader failures degrade to this rather
    /// than taking the session down.
    #[must_use]
    pub fn empty(cert: CertId) -> Self {
        Self {
            cert,
            questions: Vec::new(),
        }
    }

    /// Build a bank from a loader-supplied table.
    ///
    /// Rows that are entirely empty are dropped. `Topic` and `Numero`
    /// values that are missing or non-numeric normalize to 0; negative
    /// values clamp to 0. Missing `Commento`/`Link` columns degrade to
    /// empty explanations and absent links.
    ///
    /// # Errors
    ///
    /// Returns `BankError::MissingColumn` when `Topic`, `Numero` or
    /// `Risposta Esatta` is absent from the header row.
    pub fn from_table(cert: CertId, table: &RawTable) -> Result<Self, BankError> {
        let topic_col = require_column(table, columns::TOPIC)?;
        let number_col = require_column(table, columns::NUMBER)?;
        let answer_col = require_column(table, columns::CORRECT_ANSWER)?;
        let explanation_col = table.column_index(columns::EXPLANATION);
        let link_col = table.column_index(columns::LINK);

        let mut questions = Vec::new();
        for row in table.rows() {
            if row.iter().all(Cell::is_empty) {
                continue;
            }

            let id = QuestionId::new(questions.len() as u64);
            let topic = TopicId::new(coerce_non_negative(row.get(topic_col)));
            let number = coerce_non_negative(row.get(number_col));
            let correct_answer = row
                .get(answer_col)
                .map(Cell::as_text)
                .unwrap_or_default();
            let explanation = RawTable::cell(row, explanation_col)
                .map(Cell::as_text)
                .unwrap_or_default();
            let reference_link = RawTable::cell(row, link_col)
                .filter(|c| !c.is_empty())
                .map(Cell::as_text);

            questions.push(Question::new(
                id,
                topic,
                number,
                correct_answer,
                explanation,
                reference_link,
            ));
        }

        Ok(Self { cert, questions })
    }

    #[must_use]
    pub fn cert(&self) -> &CertId {
        &self.cert
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.get(id.value() as usize)
    }

    /// Distinct topic ids present in the bank, sorted ascending.
    /// Includes the unclassified bucket when present.
    #[must_use]
    pub fn topics(&self) -> Vec<TopicId> {
        let mut topics: Vec<TopicId> = self.questions.iter().map(Question::topic).collect();
        topics.sort_unstable();
        topics.dedup();
        topics
    }

    /// Topics offered in a selector: distinct, sorted, unclassified excluded.
    #[must_use]
    pub fn topic_choices(&self) -> Vec<TopicId> {
        self.topics()
            .into_iter()
            .filter(|t| !t.is_unclassified())
            .collect()
    }

    /// Ids of the questions matching `filter`, in bank order.
    #[must_use]
    pub fn matching_ids(&self, filter: TopicFilter) -> Vec<QuestionId> {
        self.questions
            .iter()
            .filter(|q| filter.matches(q))
            .map(Question::id)
            .collect()
    }
}

fn require_column(table: &RawTable, name: &str) -> Result<usize, BankError> {
    table.column_index(name).ok_or_else(|| BankError::MissingColumn {
        name: name.to_string(),
    })
}

fn coerce_non_negative(cell: Option<&Cell>) -> u32 {
    cell.and_then(Cell::as_int)
        .filter(|v| *v >= 0)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec![
            columns::TOPIC.into(),
            columns::NUMBER.into(),
            columns::CORRECT_ANSWER.into(),
            columns::EXPLANATION.into(),
            columns::LINK.into(),
        ]
    }

    fn row(topic: Cell, number: Cell, answer: &str) -> Vec<Cell> {
        vec![
            topic,
            number,
            Cell::Text(answer.into()),
            Cell::Text("why".into()),
            Cell::Empty,
        ]
    }

    fn load(rows: Vec<Vec<Cell>>) -> QuestionBank {
        let table = RawTable::new(headers(), rows);
        QuestionBank::from_table(CertId::new("demo"), &table).unwrap()
    }

    #[test]
    fn missing_required_column_fails() {
        let table = RawTable::new(
            vec![columns::TOPIC.into(), columns::NUMBER.into()],
            Vec::new(),
        );
        let err = QuestionBank::from_table(CertId::new("demo"), &table).unwrap_err();
        assert_eq!(
            err,
            BankError::MissingColumn {
                name: columns::CORRECT_ANSWER.into()
            }
        );
    }

    #[test]
    fn empty_rows_are_dropped() {
        let bank = load(vec![
            row(Cell::Int(1), Cell::Int(1), "A"),
            vec![Cell::Empty, Cell::Empty, Cell::Text("  ".into())],
            row(Cell::Int(2), Cell::Int(2), "B"),
        ]);
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn non_numeric_topic_normalizes_to_unclassified() {
        let bank = load(vec![
            row(Cell::Text("N/A".into()), Cell::Int(4), "A"),
            row(Cell::Int(2), Cell::Empty, "B"),
            row(Cell::Int(-3), Cell::Float(7.0), "C"),
        ]);

        let topics: Vec<u32> = bank.questions().iter().map(|q| q.topic().value()).collect();
        assert_eq!(topics, vec![0, 2, 0]);
        let numbers: Vec<u32> = bank.questions().iter().map(Question::number).collect();
        assert_eq!(numbers, vec![4, 0, 7]);
    }

    #[test]
    fn unclassified_rows_stay_in_all_but_not_in_choices() {
        let bank = load(vec![
            row(Cell::Text("N/A".into()), Cell::Int(1), "A"),
            row(Cell::Int(1), Cell::Int(2), "B"),
            row(Cell::Int(3), Cell::Int(3), "C"),
        ]);

        assert_eq!(bank.matching_ids(TopicFilter::All).len(), 3);
        assert_eq!(
            bank.topics(),
            vec![TopicId::new(0), TopicId::new(1), TopicId::new(3)]
        );
        assert_eq!(
            bank.topic_choices(),
            vec![TopicId::new(1), TopicId::new(3)]
        );
        assert!(
            bank.matching_ids(TopicFilter::Topic(TopicId::new(1)))
                .len()
                == 1
        );
    }

    #[test]
    fn topic_filter_matches_exactly() {
        let bank = load(vec![
            row(Cell::Int(1), Cell::Int(1), "A"),
            row(Cell::Int(1), Cell::Int(2), "B"),
            row(Cell::Int(2), Cell::Int(1), "C"),
        ]);

        let ids = bank.matching_ids(TopicFilter::Topic(TopicId::new(1)));
        assert_eq!(ids.len(), 2);
        for id in ids {
            assert_eq!(bank.get(id).unwrap().topic(), TopicId::new(1));
        }
    }

    #[test]
    fn missing_optional_columns_degrade() {
        let table = RawTable::new(
            vec![
                columns::TOPIC.into(),
                columns::NUMBER.into(),
                columns::CORRECT_ANSWER.into(),
            ],
            vec![vec![Cell::Int(1), Cell::Int(1), Cell::Text("A".into())]],
        );
        let bank = QuestionBank::from_table(CertId::new("demo"), &table).unwrap();
        let q = &bank.questions()[0];
        assert_eq!(q.explanation(), "");
        assert_eq!(q.reference_link(), None);
    }

    #[test]
    fn numeric_answer_cells_render_as_plain_text() {
        let bank = load(vec![row(Cell::Int(1), Cell::Int(1), "A")]);
        assert_eq!(bank.questions()[0].correct_answer(), "A");

        let table = RawTable::new(
            headers(),
            vec![vec![
                Cell::Int(1),
                Cell::Int(1),
                Cell::Float(4.0),
                Cell::Empty,
                Cell::Empty,
            ]],
        );
        let bank = QuestionBank::from_table(CertId::new("demo"), &table).unwrap();
        assert_eq!(bank.questions()[0].correct_answer(), "4");
    }
}
