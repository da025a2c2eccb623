use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RescueConfig;

pub const WAYBACK_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const ARCHIVE_DATE_FORMAT: &str = "%d %B %Y";
const DEFAULT_RETRY_DELAY_MS: u64 = 350;

/// An archived copy returned by the availability service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub url: String,
    /// Raw 14-digit capture time as returned by the service.
    pub timestamp: String,
}

impl Snapshot {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        parse_wayback_timestamp(&self.timestamp)
    }

    /// Capture date in citation style, e.g. `01 January 2015`.
    pub fn archive_date(&self) -> Option<String> {
        self.captured_at()
            .map(|value| value.format(ARCHIVE_DATE_FORMAT).to_string())
    }
}

/// Why a service response was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InvalidJson,
    NoSnapshots,
    BadStatus(String),
    MissingUrl,
    BadTimestamp(String),
    OutOfWindow { drift_secs: i64 },
}

pub trait SnapshotLookup {
    /// Closest acceptable snapshot of `url`, or `None` on any soft failure.
    fn lookup(&mut self, url: &str, reference: Option<DateTime<Utc>>) -> Option<Snapshot>;
}

/// Raw access to the availability endpoint.
pub trait AvailabilityApi {
    fn fetch_availability(&mut self, url: &str, timestamp: Option<&str>) -> Result<String>;
}

pub struct ArchiveLookupClient<A: AvailabilityApi> {
    api: A,
    max_window_secs: i64,
}

impl<A: AvailabilityApi> ArchiveLookupClient<A> {
    pub fn new(api: A, max_window_secs: i64) -> Self {
        Self {
            api,
            max_window_secs,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

impl<A: AvailabilityApi> SnapshotLookup for ArchiveLookupClient<A> {
    fn lookup(&mut self, url: &str, reference: Option<DateTime<Utc>>) -> Option<Snapshot> {
        let url = url.trim();
        let timestamp = reference.map(format_wayback_timestamp);
        info!(url, timestamp = timestamp.as_deref(), "checking archive");

        let body = match self.api.fetch_availability(url, timestamp.as_deref()) {
            Ok(body) => body,
            Err(error) => {
                warn!(url, error = %format!("{error:#}"), "archive request failed");
                return None;
            }
        };

        match evaluate_availability(&body, reference, self.max_window_secs) {
            Ok(snapshot) => {
                info!(url, snapshot = %snapshot.url, "archived snapshot accepted");
                Some(snapshot)
            }
            Err(rejection) => {
                debug!(url, ?rejection, "archived snapshot rejected");
                None
            }
        }
    }
}

/// Validate an availability response against the reference time window.
pub fn evaluate_availability(
    body: &str,
    reference: Option<DateTime<Utc>>,
    max_window_secs: i64,
) -> std::result::Result<Snapshot, Rejection> {
    let payload: Value = serde_json::from_str(body).map_err(|_| Rejection::InvalidJson)?;
    let snapshots = payload
        .get("archived_snapshots")
        .filter(|value| is_truthy(value))
        .ok_or(Rejection::NoSnapshots)?;
    let closest = snapshots
        .get("closest")
        .filter(|value| is_truthy(value))
        .ok_or(Rejection::NoSnapshots)?;

    let status = closest.get("status").map(value_as_text).unwrap_or_default();
    if !status.starts_with('2') {
        return Err(Rejection::BadStatus(status));
    }

    let url = closest
        .get("url")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or(Rejection::MissingUrl)?
        .to_string();
    // Checked even without a reference time: the capture date is written
    // into the citation as `archivedate`.
    let timestamp = closest.get("timestamp").map(value_as_text).unwrap_or_default();
    let captured_at = parse_wayback_timestamp(&timestamp)
        .ok_or_else(|| Rejection::BadTimestamp(timestamp.clone()))?;

    if let Some(reference) = reference {
        let drift_secs = (reference - captured_at).num_seconds().abs();
        if drift_secs > max_window_secs {
            return Err(Rejection::OutOfWindow { drift_secs });
        }
    }

    Ok(Snapshot { url, timestamp })
}

pub fn format_wayback_timestamp(value: DateTime<Utc>) -> String {
    value.format(WAYBACK_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_wayback_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.len() != 14 || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(trimmed, WAYBACK_TIMESTAMP_FORMAT)
        .ok()
        .map(|value| value.and_utc())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct WaybackClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl WaybackClientConfig {
    pub fn from_config(config: &RescueConfig) -> Self {
        Self {
            endpoint: config.archive_endpoint(),
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
            retries: config.archive_retries(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

pub struct WaybackClient {
    client: Client,
    config: WaybackClientConfig,
    request_count: usize,
}

impl WaybackClient {
    pub fn new(config: WaybackClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build archive HTTP client")?;
        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }
}

impl AvailabilityApi for WaybackClient {
    fn fetch_availability(&mut self, url: &str, timestamp: Option<&str>) -> Result<String> {
        let mut pairs = vec![("url".to_string(), url.trim().to_string())];
        if let Some(timestamp) = timestamp {
            pairs.push(("timestamp".to_string(), timestamp.to_string()));
        }

        let mut last_error = None::<String>;
        for attempt in 0..=self.config.retries {
            self.request_count += 1;
            let response = self
                .client
                .get(&self.config.endpoint)
                .header("User-Agent", self.config.user_agent.clone())
                .query(&pairs)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .context("failed to read archive response body");
                    }
                    last_error = Some(format!("HTTP {status}"));
                }
                Err(error) => last_error = Some(error.to_string()),
            }

            if attempt < self.config.retries {
                sleep(Duration::from_millis(
                    self.config
                        .retry_delay_ms
                        .saturating_mul(attempt as u64 + 1),
                ));
            }
        }

        let message = last_error.unwrap_or_else(|| "archive request failed".to_string());
        bail!("{message}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::bail;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{
        ArchiveLookupClient, AvailabilityApi, Rejection, Snapshot, SnapshotLookup,
        evaluate_availability, format_wayback_timestamp, parse_wayback_timestamp,
    };

    const SEVEN_YEARS: i64 = 60 * 60 * 24 * 365 * 7;

    #[derive(Default)]
    struct MockApi {
        responses: VecDeque<anyhow::Result<String>>,
        calls: Vec<(String, Option<String>)>,
    }

    impl MockApi {
        fn replying(body: &str) -> Self {
            let mut api = Self::default();
            api.responses.push_back(Ok(body.to_string()));
            api
        }
    }

    impl AvailabilityApi for MockApi {
        fn fetch_availability(
            &mut self,
            url: &str,
            timestamp: Option<&str>,
        ) -> anyhow::Result<String> {
            self.calls
                .push((url.to_string(), timestamp.map(ToString::to_string)));
            match self.responses.pop_front() {
                Some(response) => response,
                None => bail!("no canned response"),
            }
        }
    }

    fn body(status: &str, timestamp: &str) -> String {
        format!(
            r#"{{"url": "example.com", "archived_snapshots": {{"closest": {{"status": "{status}", "available": true, "url": "http://web.archive.org/web/{timestamp}/http://example.com", "timestamp": "{timestamp}"}}}}}}"#
        )
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).single().expect("valid")
    }

    #[test]
    fn lookup_sends_trimmed_url_and_timestamp_hint() {
        let mut client = ArchiveLookupClient::new(
            MockApi::replying(&body("200", "20150101000000")),
            SEVEN_YEARS,
        );
        let snapshot = client
            .lookup("  http://example.com \n", Some(reference()))
            .expect("snapshot");

        assert_eq!(
            snapshot,
            Snapshot {
                url: "http://web.archive.org/web/20150101000000/http://example.com".to_string(),
                timestamp: "20150101000000".to_string(),
            }
        );
        assert_eq!(
            client.api().calls,
            vec![(
                "http://example.com".to_string(),
                Some("20150101000000".to_string())
            )]
        );
    }

    #[test]
    fn lookup_without_reference_skips_window_check() {
        let mut client = ArchiveLookupClient::new(
            MockApi::replying(&body("200", "19990101000000")),
            SEVEN_YEARS,
        );
        assert!(client.lookup("http://example.com", None).is_some());
        assert_eq!(client.api().calls[0].1, None);
    }

    #[test]
    fn empty_snapshot_set_and_bad_status_are_soft_failures() {
        let mut client = ArchiveLookupClient::new(
            MockApi::replying(r#"{"archived_snapshots": {}}"#),
            SEVEN_YEARS,
        );
        assert_eq!(client.lookup("http://example.com", None), None);

        let mut client = ArchiveLookupClient::new(
            MockApi::replying(&body("404", "20150101000000")),
            SEVEN_YEARS,
        );
        assert_eq!(client.lookup("http://example.com", None), None);

        assert_eq!(
            evaluate_availability(r#"{"archived_snapshots": {}}"#, None, SEVEN_YEARS),
            Err(Rejection::NoSnapshots)
        );
        assert_eq!(
            evaluate_availability(r#"{"url": "x"}"#, None, SEVEN_YEARS),
            Err(Rejection::NoSnapshots)
        );
        assert_eq!(
            evaluate_availability(&body("404", "20150101000000"), None, SEVEN_YEARS),
            Err(Rejection::BadStatus("404".to_string()))
        );
    }

    #[test]
    fn numeric_and_missing_status_use_string_form() {
        let numeric = r#"{"archived_snapshots": {"closest": {"status": 200, "url": "http://a", "timestamp": "20150101000000"}}}"#;
        assert!(evaluate_availability(numeric, None, SEVEN_YEARS).is_ok());

        let missing = r#"{"archived_snapshots": {"closest": {"url": "http://a", "timestamp": "20150101000000"}}}"#;
        assert_eq!(
            evaluate_availability(missing, None, SEVEN_YEARS),
            Err(Rejection::BadStatus(String::new()))
        );
    }

    #[test]
    fn unparseable_body_and_transport_errors_are_soft_failures() {
        assert_eq!(
            evaluate_availability("<html>busy</html>", None, SEVEN_YEARS),
            Err(Rejection::InvalidJson)
        );

        let mut client = ArchiveLookupClient::new(MockApi::default(), SEVEN_YEARS);
        assert_eq!(client.lookup("http://example.com", None), None);
    }

    #[test]
    fn drift_window_is_inclusive() {
        let captured = reference() + Duration::seconds(SEVEN_YEARS);
        let at_bound = format_wayback_timestamp(captured);
        let past_bound = format_wayback_timestamp(captured + Duration::seconds(1));

        assert!(
            evaluate_availability(&body("200", &at_bound), Some(reference()), SEVEN_YEARS).is_ok()
        );
        assert_eq!(
            evaluate_availability(&body("200", &past_bound), Some(reference()), SEVEN_YEARS),
            Err(Rejection::OutOfWindow {
                drift_secs: SEVEN_YEARS + 1
            })
        );

        let earlier = format_wayback_timestamp(reference() - Duration::seconds(SEVEN_YEARS + 1));
        assert!(
            evaluate_availability(&body("200", &earlier), Some(reference()), SEVEN_YEARS).is_err()
        );
    }

    #[test]
    fn bad_snapshot_timestamp_is_rejected() {
        assert_eq!(
            evaluate_availability(&body("200", "2015"), Some(reference()), SEVEN_YEARS),
            Err(Rejection::BadTimestamp("2015".to_string()))
        );
    }

    #[test]
    fn bad_snapshot_timestamp_is_rejected_without_reference_time() {
        assert_eq!(
            evaluate_availability(&body("200", "not-a-date"), None, SEVEN_YEARS),
            Err(Rejection::BadTimestamp("not-a-date".to_string()))
        );

        let mut client = ArchiveLookupClient::new(
            MockApi::replying(&body("200", "2015")),
            SEVEN_YEARS,
        );
        assert_eq!(client.lookup("http://example.com", None), None);
    }

    #[test]
    fn archive_date_uses_citation_style() {
        let snapshot = Snapshot {
            url: "http://web.archive.org/web/20150101/http://example.com".to_string(),
            timestamp: "20150101000000".to_string(),
        };
        assert_eq!(snapshot.archive_date().as_deref(), Some("01 January 2015"));
        assert_eq!(parse_wayback_timestamp("2015010100000x"), None);
    }
}
