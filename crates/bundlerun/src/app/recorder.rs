//! Capture and replay of outgoing HTTP requests.
//!
//! Independent of the build pipeline. A [`RequestRecorder`] wraps a [`Transport`]; requests
//! whose URL passes the [`UrlFilter`] are appended to a [`KeyValueStore`] under
//! [`STORAGE_KEY`] before being forwarded, and can later be re-issued in order.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::infra::config::RecorderConfig;
use crate::infra::store::KeyValueStore;

/// Key the captured request list is stored under.
pub const STORAGE_KEY: &str = "intercepted_requests";

/// Pause between replayed requests.
pub const DEFAULT_REPLAY_DELAY: Duration = Duration::from_millis(100);

pub const DEFAULT_KEYWORDS: [&str; 4] = ["chat", "completions", "completed", "new"];

/// Request options that survive serialization. Abort signals are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default = "RequestOptions::default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<bool>,
}

impl RequestOptions {
    fn default_method() -> String {
        "GET".into()
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Self::default_method(),
            headers: BTreeMap::new(),
            body: None,
            mode: None,
            credentials: None,
            cache: None,
            redirect: None,
            referrer: None,
            referrer_policy: None,
            integrity: None,
            keepalive: None,
        }
    }
}

/// One stored request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    pub options: RequestOptions,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Status line of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub status_text: String,
}

/// Something that can send a request.
pub trait Transport {
    fn send(&mut self, url: &str, options: &RequestOptions) -> Result<ResponseSummary>;
}

/// Which URLs get captured.
#[derive(Debug, Clone)]
pub enum UrlFilter {
    /// Case-insensitive substring match against any keyword.
    Keywords(Vec<String>),
    /// Glob match against the whole URL, unless it contains one of the exclusions.
    Pattern {
        matcher: GlobMatcher,
        exclusions: Vec<String>,
    },
}

impl UrlFilter {
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UrlFilter::Keywords(
            keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        )
    }

    pub fn pattern(pattern: &str, exclusions: Vec<String>) -> Result<Self> {
        let matcher = Glob::new(pattern)
            .with_context(|| format!("invalid URL pattern '{pattern}'"))?
            .compile_matcher();
        Ok(UrlFilter::Pattern {
            matcher,
            exclusions,
        })
    }

    /// Pattern filter when one is configured, keyword filter otherwise.
    pub fn from_config(config: &RecorderConfig) -> Result<Self> {
        match config.pattern() {
            Some(pattern) => UrlFilter::pattern(&pattern, config.exclusions()),
            None => Ok(UrlFilter::keywords(config.keywords())),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlFilter::Keywords(keywords) => {
                let lowered = url.to_lowercase();
                keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
            }
            UrlFilter::Pattern {
                matcher,
                exclusions,
            } => {
                matcher.is_match(url)
                    && !exclusions
                        .iter()
                        .any(|excluded| url.contains(excluded.as_str()))
            }
        }
    }
}

impl Default for UrlFilter {
    fn default() -> Self {
        UrlFilter::keywords(DEFAULT_KEYWORDS)
    }
}

/// Outcome of replaying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed(ResponseSummary),
    Failed(String),
}

pub struct RequestRecorder<S: KeyValueStore> {
    store: S,
    filter: UrlFilter,
    delay: Duration,
}

impl<S: KeyValueStore> RequestRecorder<S> {
    pub fn new(store: S, filter: UrlFilter) -> Self {
        Self {
            store,
            filter,
            delay: DEFAULT_REPLAY_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wrap `inner` so matching requests are captured before being forwarded.
    pub fn install<T: Transport>(&mut self, inner: T) -> RecordingTransport<'_, S, T> {
        tracing::info!("request recorder installed");
        RecordingTransport {
            recorder: self,
            inner,
        }
    }

    /// All captured requests, oldest first.
    pub fn list(&self) -> Result<Vec<CapturedRequest>> {
        match self.store.get(STORAGE_KEY)? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).context("captured request list is corrupt")
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.set(STORAGE_KEY, "[]".into())?;
        tracing::info!("cleared captured requests");
        Ok(())
    }

    /// Store `url` if it passes the filter. Returns whether it was captured.
    pub fn capture(&mut self, url: &str, options: &RequestOptions) -> Result<bool> {
        if !self.filter.matches(url) {
            return Ok(false);
        }
        let mut requests = self.list()?;
        requests.push(CapturedRequest {
            url: url.to_owned(),
            options: options.clone(),
            timestamp: now_millis(),
        });
        let raw = serde_json::to_string(&requests).context("failed to encode captured requests")?;
        self.store.set(STORAGE_KEY, raw)?;
        tracing::info!(url, "intercepted request");
        Ok(true)
    }

    /// Re-issue every captured request in order, pausing between requests.
    ///
    /// Failures of individual requests are logged and reported, not returned as errors.
    pub fn replay<T: Transport>(&self, transport: &mut T) -> Result<Vec<ReplayOutcome>> {
        let requests = self.list()?;
        if requests.is_empty() {
            tracing::info!("no requests to replay");
            return Ok(Vec::new());
        }

        let total = requests.len();
        tracing::info!(total, "replaying requests");
        let mut outcomes = Vec::with_capacity(total);
        for (idx, request) in requests.iter().enumerate() {
            if idx > 0 && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            tracing::info!(n = idx + 1, total, url = %request.url, "replaying request");
            let outcome = match transport.send(&request.url, &request.options) {
                Ok(response) => {
                    tracing::info!(n = idx + 1, status = response.status, "request completed");
                    ReplayOutcome::Completed(response)
                }
                Err(err) => {
                    tracing::warn!(n = idx + 1, error = %err, "request failed");
                    ReplayOutcome::Failed(err.to_string())
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Transport returned by [`RequestRecorder::install`].
pub struct RecordingTransport<'a, S: KeyValueStore, T: Transport> {
    recorder: &'a mut RequestRecorder<S>,
    inner: T,
}

impl<S: KeyValueStore, T: Transport> RecordingTransport<'_, S, T> {
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<S: KeyValueStore, T: Transport> Transport for RecordingTransport<'_, S, T> {
    fn send(&mut self, url: &str, options: &RequestOptions) -> Result<ResponseSummary> {
        if let Err(err) = self.recorder.capture(url, options) {
            tracing::warn!(error = %err, url, "failed to capture request");
        }
        self.inner.send(url, options)
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
