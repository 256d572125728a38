//! Rate-limited HTTP client for the Dados Abertos API.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use url::Url;

use crate::pacing::RequestPacer;
use crate::Error;

/// Default production base URL.
pub const DEFAULT_BASE_URL: &str = "https://dadosabertos.camara.leg.br/api/v2";

const DEFAULT_MIN_INTERVAL_MS: u64 = 1_000;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// HTTP GET client that serializes all outbound calls through a
/// [`RequestPacer`] and retries transient failures with exponential
/// backoff.
///
/// One instance owns the process-wide "time of last request" state; clone
/// an `Arc` of it wherever extraction happens rather than constructing a
/// second one.
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    pacer: RequestPacer,
    retry: RetryConfig,
}

/// Retry behavior for transient failures (429, 5xx, network errors).
#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn from_env() -> Self {
        Self {
            max_retries: env_usize("CAMARA_RETRY_MAX", 3),
            base_delay_ms: env_u64("CAMARA_RETRY_BASE_MS", 2_000),
            max_delay_ms: env_u64("CAMARA_RETRY_MAX_MS", 30_000),
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(30) as u32;
        let exp = 1u64 << shift;
        let base = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client pointing at the production API, with the pacing
    /// interval, timeout, and retry policy taken from the environment
    /// (`CAMARA_MIN_INTERVAL_MS`, `CAMARA_HTTP_TIMEOUT_MS`,
    /// `CAMARA_RETRY_*`).
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL. Used for testing.
    pub fn with_base_url(base_url: &str) -> Self {
        Self::with_config(
            base_url,
            Duration::from_millis(env_u64("CAMARA_MIN_INTERVAL_MS", DEFAULT_MIN_INTERVAL_MS)),
            RetryConfig::from_env(),
        )
    }

    /// Fully explicit constructor; tests use this to supply a short
    /// interval and a fast retry policy.
    pub fn with_config(base_url: &str, min_interval: Duration, retry: RetryConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(env_u64(
                "CAMARA_HTTP_TIMEOUT_MS",
                DEFAULT_TIMEOUT_MS,
            )))
            .build()
            .expect("default reqwest client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            pacer: RequestPacer::new(min_interval),
            retry,
        }
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;
        for (name, value) in params {
            url.query_pairs_mut().append_pair(name, value);
        }
        Ok(url)
    }

    /// Performs one GET against `path`, returning the parsed JSON body.
    ///
    /// Transient failures are retried up to the configured count; the
    /// pacing interval is enforced before every attempt, including
    /// retries.
    pub async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value, Error> {
        let url = self.build_url(path, params)?;
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.attempt(&url).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() => {
                    if attempt > self.retry.max_retries {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "GET {} failed (attempt {}/{}), retrying in {:.1}s: {}",
                        url.path(),
                        attempt,
                        self.retry.max_retries + 1,
                        delay.as_secs_f64(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One paced request. The pacer slot is held for the whole exchange so
    /// no other call can issue its request while this one is in flight; the
    /// last-request marker is stamped whether the send succeeded or not.
    async fn attempt(&self, url: &Url) -> Result<Value, Error> {
        let mut slot = self.pacer.acquire().await;
        let sent = self
            .http
            .get(url.clone())
            .header("accept", "application/json")
            .send()
            .await;
        slot.mark();

        let resp = sent?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        format!("{}...[truncated]", &body[..MAX])
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}
