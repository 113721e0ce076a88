//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::BankError;

/// Errors emitted by `CatalogService`.
///
/// Store failures never appear here: the catalog degrades them to empty
/// results at the boundary. What remains is the one genuine contract
/// violation, a bank whose workbook lacks the required columns.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Errors emitted by `GuideService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuideError {
    #[error("no guide is configured")]
    NotConfigured,
    #[error("guide request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors emitted while loading the application configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("config file '{path}' is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}
