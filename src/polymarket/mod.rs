pub mod clob;
pub mod gamma;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::config::{PolymarketConfig, CLOB_API_URL, GAMMA_API_URL};
use crate::error::{AppError, Result};
use rate_limit::RateLimiter;

pub use clob::ClobTrade;
pub use gamma::GammaMarket;

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub gamma_url: String,
    pub clob_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub timeout: Duration,
    /// Sustained requests per second across both endpoint groups.
    pub rate_limit: f64,
    pub burst: u32,
    pub max_retries: u32,
    pub retry_wait: Duration,
    pub retry_max_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gamma_url: GAMMA_API_URL.to_string(),
            clob_url: CLOB_API_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
            timeout: Duration::from_secs(10),
            rate_limit: 5.0,
            burst: 10,
            max_retries: 3,
            retry_wait: Duration::from_secs(1),
            retry_max_wait: Duration::from_secs(5),
        }
    }
}

impl From<&PolymarketConfig> for ClientConfig {
    fn from(cfg: &PolymarketConfig) -> Self {
        Self {
            gamma_url: cfg.gamma_url.trim_end_matches('/').to_string(),
            clob_url: cfg.clob_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
            passphrase: cfg.passphrase.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            rate_limit: cfg.rate_limit,
            burst: cfg.burst,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// MarketClient
// ---------------------------------------------------------------------------

/// REST client for the Gamma (market metadata) and CLOB (trades, books) APIs.
///
/// Every request, including each retry, first takes a token from the one
/// shared [`RateLimiter`]. Transport errors and 5xx responses are retried with
/// capped exponential backoff; 429 is surfaced immediately as
/// [`AppError::RateLimited`]. No response caching happens here.
#[derive(Debug, Clone)]
pub struct MarketClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    gamma_url: String,
    clob_url: String,
    max_retries: u32,
    retry_wait: Duration,
    retry_max_wait: Duration,
}

impl MarketClient {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            limiter: Arc::new(RateLimiter::new(cfg.rate_limit, cfg.burst)),
            gamma_url: cfg.gamma_url,
            clob_url: cfg.clob_url,
            max_retries: cfg.max_retries,
            retry_wait: cfg.retry_wait,
            retry_max_wait: cfg.retry_max_wait,
        })
    }

    pub(crate) fn gamma_url(&self) -> &str {
        &self.gamma_url
    }

    pub(crate) fn clob_url(&self) -> &str {
        &self.clob_url
    }

    /// GET `url` and decode the JSON body, with rate limiting and retry.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;
            match self.send_once(url, query).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let wait = backoff(self.retry_wait, self.retry_max_wait, attempt);
                    attempt += 1;
                    warn!(url, attempt, wait_ms = wait.as_millis() as u64, "Request failed, retrying: {e}");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(url, "GET");
        let resp = self.http.get(url).query(query).send().await?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// `min(base * 2^attempt, max)`
pub fn backoff(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map a non-2xx body to a structured API error when it carries `{"error": "..."}`.
pub(crate) fn classify_error(status: u16, body: &str) -> AppError {
    if status == 429 {
        return AppError::RateLimited { status };
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(b) if !b.error.trim().is_empty() => AppError::Api { message: b.error, status },
        _ => AppError::HttpStatus { status },
    }
}

// ---------------------------------------------------------------------------
// Lenient wire decoding: numbers arrive as JSON numbers or strings
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

fn parse_num<E: serde::de::Error>(v: Option<NumOrStr>) -> std::result::Result<Option<f64>, E> {
    match v {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| E::custom(format!("invalid number: {s:?}"))),
    }
}

/// Missing, null or empty decodes to 0.0.
pub(crate) fn de_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    Ok(parse_num::<D::Error>(Option::<NumOrStr>::deserialize(d)?)?.unwrap_or(0.0))
}

pub(crate) fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    parse_num::<D::Error>(Option::<NumOrStr>::deserialize(d)?)
}

/// Unix seconds; millisecond values are scaled down.
pub(crate) fn de_unix_secs<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let n = parse_num::<D::Error>(Option::<NumOrStr>::deserialize(d)?)?
        .ok_or_else(|| D::Error::custom("missing timestamp"))?;
    let secs = if n > 1e12 { n / 1000.0 } else { n };
    Ok(secs as i64)
}
