use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::RescueConfig;

pub const NS_TEMPLATE: i32 = 10;

/// Read-only wiki metadata needed to identify templates.
pub trait WikiMetadataApi {
    /// Titles of every page redirecting to `title`, restricted to `namespace`.
    fn get_redirects(&mut self, title: &str, namespace: i32) -> Result<Vec<String>>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl MediaWikiClientConfig {
    pub fn from_config(config: &RescueConfig) -> Self {
        Self {
            api_url: config.api_url(),
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
            rate_limit_read_ms: 300,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

pub struct MediaWikiClient {
    client: Client,
    config: MediaWikiClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl MediaWikiClient {
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    fn request_json_get(&mut self, params: &[(&str, String)]) -> Result<Value> {
        let base_url = Url::parse(&self.config.api_url)
            .with_context(|| format!("invalid WIKI_API_URL: {}", self.config.api_url))?;

        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        for (key, value) in params {
            if !value.is_empty() {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            let response = self
                .client
                .get(base_url.clone())
                .header("User-Agent", self.config.user_agent.clone())
                .query(&pairs)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt);
                            continue;
                        }
                        bail!("MediaWiki API request failed with HTTP {status}");
                    }

                    let payload: Value = response
                        .json()
                        .context("failed to decode MediaWiki API JSON response")?;
                    if let Some(error) = payload.get("error") {
                        let code = error
                            .get("code")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown_error");
                        let info = error
                            .get("info")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown info");
                        bail!("MediaWiki API error [{code}]: {info}");
                    }
                    return Ok(payload);
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(error).context("failed to call MediaWiki API");
                }
            }
        }

        bail!("MediaWiki API request exhausted retry budget")
    }

    fn apply_rate_limit(&mut self) {
        let delay = Duration::from_millis(self.config.rate_limit_read_ms);
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl WikiMetadataApi for MediaWikiClient {
    fn get_redirects(&mut self, title: &str, namespace: i32) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query".to_string()),
                ("prop", "redirects".to_string()),
                ("titles", title.to_string()),
                ("rdnamespace", namespace.to_string()),
                ("rdprop", "title".to_string()),
                ("rdlimit", "max".to_string()),
            ];
            if let Some(token) = &continue_token {
                params.push(("rdcontinue", token.clone()));
            }

            let response = self.request_json_get(&params)?;
            let parsed: RedirectQueryResponse = serde_json::from_value(response)
                .context("failed to decode redirects API response")?;

            for page in parsed.query.pages {
                for item in page.redirects {
                    titles.push(item.title);
                }
            }

            continue_token = parsed.continuation.and_then(|cont| cont.rdcontinue);
            if continue_token.is_none() {
                break;
            }
        }

        debug!(title, count = titles.len(), "fetched template redirects");
        Ok(titles)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Drop a leading `Namespace:` prefix from a page title.
pub fn strip_namespace(title: &str, namespace_name: &str) -> String {
    let trimmed = title.trim();
    if let Some((prefix, rest)) = trimmed.split_once(':')
        && prefix.trim().eq_ignore_ascii_case(namespace_name)
    {
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[derive(Debug, Deserialize, Default)]
struct RedirectQueryResponse {
    #[serde(default)]
    query: RedirectQueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<ContinuationPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct RedirectQueryPayload {
    #[serde(default)]
    pages: Vec<RedirectPageItem>,
}

#[derive(Debug, Deserialize)]
struct RedirectPageItem {
    #[serde(default)]
    redirects: Vec<TitleQueryItem>,
}

#[derive(Debug, Deserialize, Default)]
struct ContinuationPayload {
    rdcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleQueryItem {
    title: String,
}
