use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::warn;
use url::Url;

use quiz_core::model::{CertConfig, CertId, RawTable, TopicId};

use crate::store::{BankStore, StoreError, layout};
use crate::xlsx;

/// Prefix all quiz content lives under inside the container.
const DATA_PREFIX: &str = "data";

/// Object-storage backend speaking the blob REST surface directly with a
/// SAS-qualified container URL. Listing uses the container's
/// `restype=container&comp=list` endpoint; reads are plain GETs with the
/// SAS token appended.
#[derive(Debug)]
pub struct BlobStore {
    container_url: String,
    sas_token: String,
    client: Client,
}

impl BlobStore {
    /// Build a store from a SAS container URL, e.g.
    /// `https://account.blob.example.net/container?sv=...&sig=...`.
    ///
    /// When `container_name` is not configured it is taken from the URL's
    /// last path segment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Malformed` when the URL carries no SAS token
    /// or no container segment.
    pub fn from_sas_url(sas_url: &str, container_name: Option<&str>) -> Result<Self, StoreError> {
        let (base, sas_token) = sas_url
            .split_once('?')
            .ok_or_else(|| StoreError::Malformed("SAS url has no signature token".to_string()))?;

        let base = base.trim_end_matches('/');
        let derived = base.rsplit('/').next().filter(|s| !s.is_empty());
        let container = container_name.or(derived).ok_or_else(|| {
            StoreError::Malformed("SAS url has no container segment".to_string())
        })?;

        // Rebuild the container URL so a configured container name wins
        // over whatever segment the SAS url happened to end with.
        let account_base = base
            .strip_suffix(container)
            .map_or(base, |prefix| prefix.trim_end_matches('/'));
        let container_url = format!("{account_base}/{container}");

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            container_url,
            sas_token: sas_token.to_string(),
            client,
        })
    }

    #[must_use]
    pub fn container_url(&self) -> &str {
        &self.container_url
    }

    /// Names of every blob under `prefix`, following continuation markers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on transport failures or unparsable listings.
    pub async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut marker = String::new();

        loop {
            let url = self.listing_url(prefix, &marker)?;
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(StoreError::Transport(format!(
                    "blob listing returned {}",
                    response.status()
                )));
            }

            let body = response.text().await?;
            let listing: EnumerationResults = quick_xml::de::from_str(&body)
                .map_err(|e| StoreError::Malformed(format!("unparsable blob listing: {e}")))?;

            if let Some(blobs) = listing.blobs {
                names.extend(blobs.blob.into_iter().map(|b| b.name));
            }

            match listing.next_marker.filter(|m| !m.is_empty()) {
                Some(next) => marker = next,
                None => break,
            }
        }

        Ok(names)
    }

    /// Listing URL with the SAS token's pairs kept verbatim and the
    /// listing parameters percent-encoded on top.
    fn listing_url(&self, prefix: &str, marker: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}?{}", self.container_url, self.sas_token))
            .map_err(|e| StoreError::Malformed(format!("invalid container url: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("prefix", prefix);
            if !marker.is_empty() {
                pairs.append_pair("marker", marker);
            }
        }
        Ok(url)
    }

    async fn get_blob(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/{name}?{}", self.container_url, self.sas_token);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "blob '{name}' returned {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn database_blob(cert: &CertId) -> String {
        format!("{DATA_PREFIX}/{}/{}", cert.as_str(), layout::DATABASE_FILE)
    }
}

#[async_trait]
impl BankStore for BlobStore {
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
        let names = self.list_blobs(&format!("{DATA_PREFIX}/")).await?;

        // One listing pass: collect candidate directories, then keep the
        // ones that actually hold a bank workbook.
        let mut candidates = BTreeSet::new();
        for name in &names {
            let mut parts = name.split('/');
            if parts.next() == Some(DATA_PREFIX)
                && let Some(cert) = parts.next().filter(|c| !c.is_empty())
            {
                candidates.insert(cert.to_string());
            }
        }

        Ok(candidates
            .into_iter()
            .map(CertId::new)
            .filter(|cert| names.iter().any(|n| n == &Self::database_blob(cert)))
            .collect())
    }

    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
        let bytes = self.get_blob(&Self::database_blob(cert)).await?;
        xlsx::parse_workbook(&bytes)
    }

    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
        let name = format!("{DATA_PREFIX}/{}/{}", cert.as_str(), layout::CONFIG_FILE);
        let bytes = match self.get_blob(&name).await {
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
        let prefix = format!("{DATA_PREFIX}/{}/", layout::topic_dir(cert, topic));
        let names = self.list_blobs(&prefix).await?;

        let file_prefix = layout::image_prefix(number);
        let matching = names.iter().find(|name| {
            name.rsplit('/')
                .next()
                .is_some_and(|file| file.starts_with(&file_prefix))
        });

        match matching {
            Some(name) => Ok(Some(self.get_blob(name).await?)),
            None => Ok(None),
        }
    }
}

//
// ─── LISTING XML ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    blobs: Option<Blobs>,
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Blobs {
    #[serde(default)]
    blob: Vec<Blob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Blob {
    name: String,
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAS_URL: &str = "https://account.blob.example.net/content?sv=2024&sig=abc";

    #[test]
    fn container_derived_from_url_path() {
        let store = BlobStore::from_sas_url(SAS_URL, None).unwrap();
        assert_eq!(
            store.container_url(),
            "https://account.blob.example.net/content"
        );
        assert_eq!(store.sas_token, "sv=2024&sig=abc");
    }

    #[test]
    fn configured_container_wins() {
        let store = BlobStore::from_sas_url(SAS_URL, Some("other")).unwrap();
        assert_eq!(
            store.container_url(),
            "https://account.blob.example.net/content/other"
        );
    }

    #[test]
    fn url_without_token_is_malformed() {
        let err = BlobStore::from_sas_url("https://account.blob.example.net/content", None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn listing_url_encodes_prefix_and_marker() {
        let store = BlobStore::from_sas_url(SAS_URL, None).unwrap();
        let url = store.listing_url("data/My Cert & Co/", "cursor 2").unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("sv=2024"));
        assert!(query.contains("sig=abc"));
        assert!(query.contains("restype=container"));
        assert!(query.contains("prefix=data%2FMy+Cert+%26+Co%2F"));
        assert!(query.contains("marker=cursor+2"));

        // No marker pair before the first page.
        let first = store.listing_url("data/", "").unwrap();
        assert!(!first.query().unwrap().contains("marker="));
    }

    #[test]
    fn listing_xml_parses_names_and_marker() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <EnumerationResults>
              <Prefix>data/</Prefix>
              <Blobs>
                <Blob><Name>data/AZ-900/database.xlsx</Name></Blob>
                <Blob><Name>data/AZ-900/Domande/Topic1/1.png</Name></Blob>
              </Blobs>
              <NextMarker>cursor-2</NextMarker>
            </EnumerationResults>"#;

        let listing: EnumerationResults = quick_xml::de::from_str(xml).unwrap();
        let names: Vec<String> = listing.blobs.unwrap().blob.into_iter().map(|b| b.name).collect();
        assert_eq!(
            names,
            vec![
                "data/AZ-900/database.xlsx".to_string(),
                "data/AZ-900/Domande/Topic1/1.png".to_string()
            ]
        );
        assert_eq!(listing.next_marker.as_deref(), Some("cursor-2"));
    }

    #[test]
    fn empty_listing_parses() {
        let xml = r"<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>";
        let listing: EnumerationResults = quick_xml::de::from_str(xml).unwrap();
        assert!(listing.blobs.unwrap().blob.is_empty());
        assert_eq!(listing.next_marker.as_deref(), Some(""));
    }
}
