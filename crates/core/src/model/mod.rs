mod bank;
mod cert_config;
mod ids;
mod question;
mod score;
mod table;

pub use bank::{BankError, QuestionBank, TopicFilter, columns};
pub use cert_config::CertConfig;
pub use ids::{CertId, ParseIdError, QuestionId, TopicId};
pub use question::{Question, answers_match};
pub use score::Score;
pub use table::{Cell, RawTable};
