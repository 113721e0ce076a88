use serde::Deserialize;

/// Per-certification configuration, read from the certification's own
/// `config.json` when one exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CertConfig {
    pub ai_agent_url: Option<String>,
}

impl CertConfig {
    /// Effective AI agent URL: the certification's own value when set and
    /// non-blank, otherwise the global default.
    #[must_use]
    pub fn agent_url<'a>(&'a self, global_default: Option<&'a str>) -> Option<&'a str> {
        self.ai_agent_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or(global_default)
    }
}
