use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "citerescue/0.1";
pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_ARCHIVE_ENDPOINT: &str = "https://archive.org/wayback/available";
pub const DEFAULT_MAX_WINDOW_DAYS: u64 = 365 * 7;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CITATION_TEMPLATE: &str = "Cite web";
pub const DEFAULT_DEAD_LINK_TEMPLATE: &str = "Dead link";
pub const DEFAULT_CONFIG_PATH: &str = ".citerescue/config.toml";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RescueConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub archive: ArchiveSection,
    #[serde(default)]
    pub templates: TemplateSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ArchiveSection {
    pub endpoint: Option<String>,
    pub max_window_days: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TemplateSection {
    pub citation: Option<String>,
    pub dead_link: Option<String>,
}

impl RescueConfig {
    /// Resolve the MediaWiki API URL: env WIKI_API_URL > config > DEFAULT_API_URL.
    pub fn api_url(&self) -> String {
        env_override("WIKI_API_URL")
            .or_else(|| self.wiki.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn archive_endpoint(&self) -> String {
        env_override("ARCHIVE_ENDPOINT")
            .or_else(|| self.archive.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_ENDPOINT.to_string())
    }

    /// Maximum drift between access date and snapshot, in seconds.
    pub fn max_window_secs(&self) -> i64 {
        let days = env_override("ARCHIVE_MAX_WINDOW_DAYS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.archive.max_window_days)
            .unwrap_or(DEFAULT_MAX_WINDOW_DAYS);
        i64::try_from(days.saturating_mul(86_400)).unwrap_or(i64::MAX)
    }

    pub fn timeout_ms(&self) -> u64 {
        env_override("ARCHIVE_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.archive.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn archive_retries(&self) -> usize {
        env_override("ARCHIVE_HTTP_RETRIES")
            .and_then(|value| value.parse::<usize>().ok())
            .or(self.archive.retries)
            .unwrap_or(0)
    }

    pub fn citation_template(&self) -> &str {
        self.templates
            .citation
            .as_deref()
            .unwrap_or(DEFAULT_CITATION_TEMPLATE)
    }

    pub fn dead_link_template(&self) -> &str {
        self.templates
            .dead_link
            .as_deref()
            .unwrap_or(DEFAULT_DEAD_LINK_TEMPLATE)
    }
}

/// Load and parse a RescueConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<RescueConfig> {
    if !config_path.exists() {
        return Ok(RescueConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: RescueConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
