use std::sync::Arc;
use tracing::warn;

use quiz_core::model::{CertConfig, CertId, Question, QuestionBank};
use storage::store::BankStore;

use crate::error::CatalogError;
use crate::session::QuizSession;

/// Boundary between the stores and the quiz engine.
///
/// Every store failure is absorbed here: listings degrade to empty,
/// banks to empty banks, images to `None`, configs to the defaults. The
/// only error that propagates is a workbook missing its required columns,
/// which is a data-contract violation rather than a transient condition.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn BankStore>,
    default_ai_agent_url: Option<String>,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn BankStore>, default_ai_agent_url: Option<String>) -> Self {
        Self {
            store,
            default_ai_agent_url,
        }
    }

    #[must_use]
    pub fn default_agent_url(&self) -> Option<&str> {
        self.default_ai_agent_url.as_deref()
    }

    /// Certifications offering a question bank. Failures degrade to an
    /// empty list.
    pub async fn certifications(&self) -> Vec<CertId> {
        match self.store.list_certifications().await {
            Ok(certs) => certs,
            Err(err) => {
                warn!(error = %err, "certification listing unavailable");
                Vec::new()
            }
        }
    }

    /// Start a session for a certification.
    ///
    /// A store failure yields a session over an empty bank; the caller
    /// can still render the (empty) quiz and surface a warning.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Bank` when the workbook loads but lacks
    /// required columns.
    pub async fn start_session(&self, cert: &CertId) -> Result<QuizSession, CatalogError> {
        let bank = match self.store.load_bank(cert).await {
            Ok(table) => QuestionBank::from_table(cert.clone(), &table)?,
            Err(err) => {
                warn!(cert = %cert, error = %err, "bank unavailable, starting empty session");
                QuestionBank::empty(cert.clone())
            }
        };
        Ok(QuizSession::new(bank))
    }

    /// The certification's configuration with the global default applied.
    /// Always yields a usable config.
    pub async fn cert_config(&self, cert: &CertId) -> CertConfig {
        let mut config = match self.store.load_cert_config(cert).await {
            Ok(config) => config.unwrap_or_default(),
            Err(err) => {
                warn!(cert = %cert, error = %err, "cert config unavailable, using defaults");
                CertConfig::default()
            }
        };
        config.ai_agent_url = config
            .agent_url(self.default_ai_agent_url.as_deref())
            .map(str::to_string);
        config
    }

    /// Screenshot bytes for a question, or `None` when absent or the
    /// store is unreachable.
    pub async fn question_image(&self, cert: &CertId, question: &Question) -> Option<Vec<u8>> {
        match self
            .store
            .find_image(cert, question.topic(), question.number())
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    cert = %cert,
                    topic = %question.topic(),
                    number = question.number(),
                    error = %err,
                    "image lookup failed"
                );
                None
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
