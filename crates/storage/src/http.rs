use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::warn;
use url::Url;

use quiz_core::model::{CertConfig, CertId, RawTable, TopicId};

use crate::store::{BankStore, StoreError, layout};
use crate::xlsx;

/// Directory-listing backend: the data root is a plain HTTP(S) URL whose
/// index pages expose anchors, the way static file servers render
/// directories. Subdirectory anchors are certifications; file anchors
/// under a topic directory are images.
#[derive(Debug)]
pub struct HttpStore {
    base: Url,
    client: Client,
    href_pattern: Regex,
}

impl HttpStore {
    /// Build a store rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Malformed` when the URL cannot be parsed.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        // Join semantics need a trailing slash on the root.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base = Url::parse(&normalized)
            .map_err(|e| StoreError::Malformed(format!("invalid data url: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let href_pattern = Regex::new(r#"href\s*=\s*["']([^"']+)["']"#)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok(Self {
            base,
            client,
            href_pattern,
        })
    }

    /// Anchor targets on a listing page, keeping only relative entries.
    fn listing_entries(&self, html: &str) -> Vec<String> {
        self.href_pattern
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .filter(|href| {
                !href.contains("://")
                    && !href.starts_with('/')
                    && !href.starts_with('?')
                    && !href.starts_with('#')
                    && !href.starts_with("..")
            })
            .collect()
    }

    async fn fetch_listing(&self, dir: &Url) -> Result<Vec<String>, StoreError> {
        let response = self.client.get(dir.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "listing {dir} returned {}",
                response.status()
            )));
        }
        Ok(self.listing_entries(&response.text().await?))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, StoreError> {
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "fetching {url} returned {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn remote_file_exists(&self, url: &Url) -> bool {
        match self.client.head(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn join(&self, relative: &str) -> Result<Url, StoreError> {
        self.base
            .join(relative)
            .map_err(|e| StoreError::Malformed(format!("invalid path '{relative}': {e}")))
    }
}

#[async_trait]
impl BankStore for HttpStore {
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
        let mut certs = Vec::new();
        for entry in self.fetch_listing(&self.base).await? {
            let Some(name) = entry.strip_suffix('/') else {
                continue;
            };
            let database = self.join(&format!("{name}/{}", layout::DATABASE_FILE))?;
            if self.remote_file_exists(&database).await {
                certs.push(CertId::new(name));
            }
        }
        certs.sort();
        Ok(certs)
    }

    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
        let url = self.join(&format!("{}/{}", cert.as_str(), layout::DATABASE_FILE))?;
        let bytes = self.fetch_bytes(&url).await?;
        xlsx::parse_workbook(&bytes)
    }

    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
        let url = self.join(&format!("{}/{}", cert.as_str(), layout::CONFIG_FILE))?;
        let bytes = match self.fetch_bytes(&url).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };
        match serde_json::from_slice(&bytes) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
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
        let dir = self.join(&format!("{}/", layout::topic_dir(cert, topic)))?;
        let entries = match self.fetch_listing(&dir).await {
            Ok(entries) => entries,
            Err(StoreError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        let prefix = layout::image_prefix(number);
        for entry in entries {
            if entry.starts_with(&prefix) {
                let url = dir
                    .join(&entry)
                    .map_err(|e| StoreError::Malformed(e.to_string()))?;
                return Ok(Some(self.fetch_bytes(&url).await?));
            }
        }
        Ok(None)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpStore {
        HttpStore::new("https://files.example/banks").unwrap()
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let store = store();
        assert_eq!(store.base.as_str(), "https://files.example/banks/");
        assert_eq!(
            store.join("AZ-900/database.xlsx").unwrap().as_str(),
            "https://files.example/banks/AZ-900/database.xlsx"
        );
    }

    #[test]
    fn listing_entries_keep_relative_anchors_only() {
        let html = r#"
            <a href="AZ-900/">AZ-900/</a>
            <a href='notes.txt'>notes.txt</a>
            <a href="../">parent</a>
            <a href="/absolute/">abs</a>
            <a href="https://elsewhere.example/">out</a>
            <a href="?sort=name">sort</a>
        "#;
        let entries = store().listing_entries(html);
        assert_eq!(entries, vec!["AZ-900/".to_string(), "notes.txt".to_string()]);
    }

    #[test]
    fn invalid_base_url_is_malformed() {
        let err = HttpStore::new("http://").unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }
}
