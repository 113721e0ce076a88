#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod guide;
pub mod session;
pub mod supplement;

pub use quiz_core::model::answers_match;

pub use catalog::CatalogService;
pub use config::AppConfig;
pub use error::{CatalogError, ConfigError, GuideError};
pub use guide::GuideService;
pub use session::QuizSession;
pub use supplement::SupplementFetcher;
