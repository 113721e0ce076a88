use reqwest::Client;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::guide::sanitize_html;

/// Browser-like agent string; the discussion sites reject the default
/// library one.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort fetcher for supplementary discussion content linked from a
/// question's reference link.
///
/// This is an optional enhancement behind the `supplement_hosts`
/// allowlist: any link outside the allowlist, and any failure of any
/// kind, yields `None` so the caller falls back to the stored image.
#[derive(Clone)]
pub struct SupplementFetcher {
    client: Client,
    allowed_hosts: Vec<String>,
}

impl SupplementFetcher {
    #[must_use]
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether the capability is enabled at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.allowed_hosts.is_empty()
    }

    /// Whether a link points at an allowlisted host.
    #[must_use]
    pub fn accepts_link(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link.trim()) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }

    /// Fetch the linked page and return a sanitized read-only fragment.
    ///
    /// Never errors: disallowed links, transport failures and non-success
    /// statuses all degrade to `None`.
    pub async fn fetch(&self, link: &str) -> Option<String> {
        if !self.accepts_link(link) {
            return None;
        }

        let response = match self.client.get(link.trim()).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(link, error = %err, "supplement fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(link, status = %response.status(), "supplement fetch rejected");
            return None;
        }

        match response.text().await {
            Ok(body) => {
                let fragment = sanitize_html(&body);
                if fragment.trim().is_empty() {
                    None
                } else {
                    Some(fragment)
                }
            }
            Err(err) => {
                warn!(link, error = %err, "supplement body unreadable");
                None
            }
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
