use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{CertConfig, CertId, RawTable, TopicId};

/// Errors surfaced by bank store backends.
///
/// Services degrade these at the boundary (empty bank, absent image);
/// nothing here is fatal to the process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed data: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Data layout shared by every backend, matching the content repositories
/// the banks are authored in.
pub mod layout {
    use quiz_core::model::{CertId, TopicId};

    /// Workbook holding the certification's question bank.
    pub const DATABASE_FILE: &str = "database.xlsx";
    /// Optional per-certification configuration.
    pub const CONFIG_FILE: &str = "config.json";
    /// Directory of question screenshots, one subdirectory per topic.
    pub const IMAGES_DIR: &str = "Domande";
    /// Topic subdirectory prefix, e.g. `Topic3`.
    pub const TOPIC_DIR_PREFIX: &str = "Topic";

    /// Relative directory holding a topic's images.
    #[must_use]
    pub fn topic_dir(cert: &CertId, topic: TopicId) -> String {
        format!("{}/{IMAGES_DIR}/{TOPIC_DIR_PREFIX}{topic}", cert.as_str())
    }

    /// Filename prefix an image must carry to match a question number.
    #[must_use]
    pub fn image_prefix(number: u32) -> String {
        format!("{number}.")
    }
}

/// Read-only capability every storage backend provides: certification
/// discovery, bank and config loading, and image lookup.
#[async_trait]
pub trait BankStore: Send + Sync {
    /// Certifications that actually carry a question bank.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backing listing cannot be fetched.
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError>;

    /// Load the certification's bank as a raw table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when the workbook is absent, or
    /// other store errors on transport/parse failures.
    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError>;

    /// Load the certification's own configuration, when present.
    ///
    /// An absent or unreadable `config.json` is `Ok(None)`; only
    /// transport failures surface as errors.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backend itself is unreachable.
    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError>;

    /// Bytes of the image whose filename starts with `<number>.` under the
    /// question's topic directory, or `None` when no file matches.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backend is unreachable.
    async fn find_image(
        &self,
        cert: &CertId,
        topic: TopicId,
        number: u32,
    ) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Select a backend from the configured data path.
///
/// A URL carrying a query string is a SAS-qualified blob container; a
/// plain `http(s)` URL is a directory listing; anything else is a local
/// path.
///
/// # Errors
///
/// Returns `StoreError::Malformed` when a URL-shaped path cannot be
/// parsed into a usable backend.
pub fn open_store(
    data_path: &str,
    container_name: Option<&str>,
) -> Result<Arc<dyn BankStore>, StoreError> {
    if data_path.starts_with("http://") || data_path.starts_with("https://") {
        if data_path.contains('?') {
            Ok(Arc::new(crate::azure::BlobStore::from_sas_url(
                data_path,
                container_name,
            )?))
        } else {
            Ok(Arc::new(crate::http::HttpStore::new(data_path)?))
        }
    } else {
        Ok(Arc::new(crate::local::LocalStore::new(data_path)))
    }
}

//
// ─── IN-MEMORY STORE ───────────────────────────────────────────────────────────
//

/// Simple in-memory store implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    banks: Arc<Mutex<HashMap<CertId, RawTable>>>,
    configs: Arc<Mutex<HashMap<CertId, CertConfig>>>,
    images: Arc<Mutex<HashMap<(CertId, TopicId, u32), Vec<u8>>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a certification's bank table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the backing map is unusable.
    pub fn put_bank(&self, cert: CertId, table: RawTable) -> Result<(), StoreError> {
        let mut guard = self
            .banks
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        guard.insert(cert, table);
        Ok(())
    }

    /// Register a certification's own configuration.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the backing map is unusable.
    pub fn put_cert_config(&self, cert: CertId, config: CertConfig) -> Result<(), StoreError> {
        let mut guard = self
            .configs
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        guard.insert(cert, config);
        Ok(())
    }

    /// Register image bytes for a question.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the backing map is unusable.
    pub fn put_image(
        &self,
        cert: CertId,
        topic: TopicId,
        number: u32,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut guard = self
            .images
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        guard.insert((cert, topic, number), bytes);
        Ok(())
    }
}

#[async_trait]
impl BankStore for InMemoryStore {
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
        let guard = self
            .banks
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let mut certs: Vec<CertId> = guard.keys().cloned().collect();
        certs.sort();
        Ok(certs)
    }

    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
        let guard = self
            .banks
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        guard.get(cert).cloned().ok_or(StoreError::NotFound)
    }

    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
        let guard = self
            .configs
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(guard.get(cert).cloned())
    }

    async fn find_image(
        &self,
        cert: &CertId,
        topic: TopicId,
        number: u32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self
            .images
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(guard.get(&(cert.clone(), topic, number)).cloned())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::Cell;

    fn demo_table() -> RawTable {
        RawTable::new(
            vec!["Topic".into(), "Numero".into(), "Risposta Esatta".into()],
            vec![vec![Cell::Int(1), Cell::Int(1), Cell::Text("A".into())]],
        )
    }

    #[tokio::test]
    async fn in_memory_store_roundtrip() {
        let store = InMemoryStore::new();
        let cert = CertId::new("demo");
        store.put_bank(cert.clone(), demo_table()).unwrap();
        store
            .put_image(cert.clone(), TopicId::new(1), 1, vec![0xFF, 0xD8])
            .unwrap();

        assert_eq!(store.list_certifications().await.unwrap(), vec![cert.clone()]);
        assert!(!store.load_bank(&cert).await.unwrap().is_empty());
        assert_eq!(store.load_cert_config(&cert).await.unwrap(), None);
        assert_eq!(
            store
                .find_image(&cert, TopicId::new(1), 1)
                .await
                .unwrap()
                .unwrap(),
            vec![0xFF, 0xD8]
        );
        assert!(
            store
                .find_image(&cert, TopicId::new(2), 1)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn missing_bank_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.load_bank(&CertId::new("nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn poisoned_map_surfaces_a_transport_error() {
        let store = InMemoryStore::new();
        store.put_bank(CertId::new("demo"), demo_table()).unwrap();

        let banks = Arc::clone(&store.banks);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = banks.lock().unwrap();
            panic!("poison the bank map");
        }));

        let err = store.load_bank(&CertId::new("demo")).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        let err = store.list_certifications().await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[test]
    fn layout_helpers_match_content_repo_shape() {
        let cert = CertId::new("AZ-900");
        assert_eq!(
            layout::topic_dir(&cert, TopicId::new(3)),
            "AZ-900/Domande/Topic3"
        );
        assert_eq!(layout::image_prefix(12), "12.");
    }
}
