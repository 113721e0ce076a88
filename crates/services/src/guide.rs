use reqwest::Client;
use std::collections::{HashMap, HashSet};

use crate::error::GuideError;

/// Renders the usage-guide markdown, sourced from a local file or a URL,
/// into sanitized HTML.
#[derive(Clone)]
pub struct GuideService {
    client: Client,
    guide_path: Option<String>,
}

impl GuideService {
    #[must_use]
    pub fn new(guide_path: Option<String>) -> Self {
        Self {
            client: Client::new(),
            guide_path: guide_path.filter(|p| !p.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.guide_path.is_some()
    }

    /// Fetch the guide source and render it.
    ///
    /// # Errors
    ///
    /// Returns `GuideError::NotConfigured` when no guide path is set, and
    /// transport or filesystem errors otherwise.
    pub async fn render(&self) -> Result<String, GuideError> {
        let path = self.guide_path.as_deref().ok_or(GuideError::NotConfigured)?;

        let source = if path.starts_with("http://") || path.starts_with("https://") {
            let response = self.client.get(path).send().await?;
            if !response.status().is_success() {
                return Err(GuideError::HttpStatus(response.status()));
            }
            response.text().await?
        } else {
            std::fs::read_to_string(path)?
        };

        Ok(markdown_to_html(&source))
    }
}

/// Render markdown to sanitized HTML with the extensions the guides use.
#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);
    options.insert(pulldown_cmark::Options::ENABLE_TASKLISTS);

    let parser = pulldown_cmark::Parser::new_ext(input, options);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    sanitize_html(&html)
}

/// Strip everything but a small set of formatting tags.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "div", "span", "br", "em", "strong", "b", "i", "code", "pre", "blockquote", "ul",
        "ol", "li", "a", "h1", "h2", "h3", "h4", "table", "thead", "tbody", "tr", "th", "td",
        "img",
    ]
    .into_iter()
    .collect();

    let mut attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    attributes.insert("a", ["href"].into_iter().collect());
    attributes.insert("img", ["src", "alt"].into_iter().collect());

    ammonia::Builder::new()
        .tags(tags)
        .tag_attributes(attributes)
        .clean(html)
        .to_string()
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
