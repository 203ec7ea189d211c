//! HTTP(S) GET with a memoizing front

use std::time::Duration;

use bytes::Bytes;
use freqcache::{CacheKey, SharedCache, StatsSnapshot};
use reqwest::{redirect, Client, Url};
use tracing::{debug, info};

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Errors from fetching a URL
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("unsupported scheme in '{0}' (only http:// and https:// are supported)")]
    UnsupportedScheme(String),

    #[error("request timed out")]
    Timeout,

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }
}

/// Build the client used for every fetch
pub fn client(timeout: Duration) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(concat!("memofetch/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Check that `url` is an absolute http(s) URL
pub fn parse_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        "http" | "https" => Err(FetchError::InvalidUrl(url.to_string())),
        _ => Err(FetchError::UnsupportedScheme(url.to_string())),
    }
}

/// Fetch `url` and keep the first `first_n` bytes of the body (0 keeps all)
pub async fn fetch(client: &Client, url: &str, first_n: usize) -> Result<Bytes, FetchError> {
    let target = parse_url(url)?;

    let response = client.get(target).send().await?;
    let status = response.status();
    debug!("{} answered {}", response.url(), status);
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    if first_n > 0 && body.len() > first_n {
        Ok(body.slice(..first_n))
    } else {
        Ok(body)
    }
}

/// How a call was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
        }
    }
}

/// `fetch` memoized on `(url; first_n=N)`
pub struct CachedFetcher {
    cache: SharedCache<CacheKey, Bytes>,
    client: Client,
    first_n: usize,
}

impl CachedFetcher {
    pub fn new(
        cache: SharedCache<CacheKey, Bytes>,
        first_n: usize,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            cache,
            client: client(timeout)?,
            first_n,
        })
    }

    pub async fn get(&self, url: &str) -> Result<(Bytes, Outcome), FetchError> {
        let key = CacheKey::builder()
            .arg(url)
            .kwarg("first_n", self.first_n)
            .build();

        let mut outcome = Outcome::Hit;
        let body = self
            .cache
            .get_or_compute_async(key, || {
                outcome = Outcome::Miss;
                info!("Fetching {}", url);
                fetch(&self.client, url, self.first_n)
            })
            .await?;

        Ok((body, outcome))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.cache.stats().snapshot()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
