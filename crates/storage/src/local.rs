use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use quiz_core::model::{CertConfig, CertId, RawTable, TopicId};

use crate::store::{BankStore, StoreError, layout};
use crate::xlsx;

/// Filesystem backend: each certification is a subdirectory of the data
/// root holding `database.xlsx`, `config.json` and a `Domande/` image tree.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cert_dir(&self, cert: &CertId) -> PathBuf {
        self.root.join(cert.as_str())
    }
}

#[async_trait]
impl BankStore for LocalStore {
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
        let mut certs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            if entry.path().join(layout::DATABASE_FILE).is_file() {
                certs.push(CertId::new(entry.file_name().to_string_lossy()));
            }
        }
        certs.sort();
        Ok(certs)
    }

    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
        let path = self.cert_dir(cert).join(layout::DATABASE_FILE);
        let bytes = fs::read(&path)?;
        xlsx::parse_workbook(&bytes)
    }

    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
        let path = self.cert_dir(cert).join(layout::CONFIG_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                // A broken per-cert config degrades to the defaults.
                warn!(cert = %cert, error = %err, "ignoring unparsable cert config");
                Ok(None)
            }
        }
    }

    async fn find_image(
        &self,
        cert: &CertId,
        topic: TopicId,
        number: u32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let dir = self.root.join(layout::topic_dir(cert, topic));
        if !dir.is_dir() {
            return Ok(None);
        }

        let prefix = layout::image_prefix(number);
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                return Ok(Some(fs::read(entry.path())?));
            }
        }
        Ok(None)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_cert(root: &Path, cert: &str) {
        let dir = root.join(cert);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(layout::DATABASE_FILE), b"stub").unwrap();
    }

    #[tokio::test]
    async fn lists_only_directories_with_a_bank() {
        let tmp = tempfile::tempdir().unwrap();
        seed_cert(tmp.path(), "AZ-900");
        seed_cert(tmp.path(), "AI-102");
        fs::create_dir_all(tmp.path().join("empty-dir")).unwrap();
        fs::write(tmp.path().join("stray-file"), b"x").unwrap();

        let store = LocalStore::new(tmp.path());
        let certs = store.list_certifications().await.unwrap();
        assert_eq!(certs, vec![CertId::new("AI-102"), CertId::new("AZ-900")]);
    }

    #[tokio::test]
    async fn image_lookup_matches_number_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let cert = CertId::new("AZ-900");
        let dir = tmp.path().join(layout::topic_dir(&cert, TopicId::new(2)));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("1.png"), b"one").unwrap();
        fs::write(dir.join("12.png"), b"twelve").unwrap();

        let store = LocalStore::new(tmp.path());
        assert_eq!(
            store
                .find_image(&cert, TopicId::new(2), 12)
                .await
                .unwrap()
                .unwrap(),
            b"twelve"
        );
        // "1." must not match "12.png".
        assert_eq!(
            store
                .find_image(&cert, TopicId::new(2), 1)
                .await
                .unwrap()
                .unwrap(),
            b"one"
        );
        assert!(
            store
                .find_image(&cert, TopicId::new(2), 3)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .find_image(&cert, TopicId::new(9), 1)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn missing_cert_config_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        seed_cert(tmp.path(), "AZ-900");
        let store = LocalStore::new(tmp.path());
        let cert = CertId::new("AZ-900");

        assert_eq!(store.load_cert_config(&cert).await.unwrap(), None);

        fs::write(
            tmp.path().join("AZ-900").join(layout::CONFIG_FILE),
            br#"{"ai_agent_url": "https://agent.example"}"#,
        )
        .unwrap();
        let config = store.load_cert_config(&cert).await.unwrap().unwrap();
        assert_eq!(config.ai_agent_url.as_deref(), Some("https://agent.example"));
    }

    #[tokio::test]
    async fn broken_cert_config_degrades_to_none() {
        let tmp = tempfile::tempdir().unwrap();
        seed_cert(tmp.path(), "AZ-900");
        fs::write(
            tmp.path().join("AZ-900").join(layout::CONFIG_FILE),
            b"{ not json",
        )
        .unwrap();

        let store = LocalStore::new(tmp.path());
        assert_eq!(
            store.load_cert_config(&CertId::new("AZ-900")).await.unwrap(),
            None
        );
    }
}
