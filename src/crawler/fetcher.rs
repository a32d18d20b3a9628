//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client around an explicit transport (SOCKS proxy or direct)
//! - Streaming bodies under a byte cap and a wall-clock deadline
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::FetchConfig;
use crate::crawler::backoff::ExponentialBackoff;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use url::Url;

/// Statuses meaning "page intentionally gone"; returned as successes
pub const ARCHIVE_STATUSES: [u16; 2] = [404, 410];

/// Local Tor SOCKS listener used when nothing else is configured
pub const DEFAULT_PROXY: &str = "socks5h://127.0.0.1:9050";

/// Environment variable consulted before [`DEFAULT_PROXY`]
pub const PROXY_ENV: &str = "TOR_SOCKS";

const PROXY_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 10;

/// Terminal fetch failure, after retries where applicable
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl { .. })
    }

    fn from_reqwest(url: &Url, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_builder() {
            Self::InvalidUrl {
                url,
                message: err.to_string(),
            }
        } else if err.is_connect() {
            Self::Network {
                url,
                message: format!("connection failed: {}", err),
            }
        } else {
            Self::Network {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// How requests leave this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Through a SOCKS proxy, e.g. `socks5h://127.0.0.1:9050`
    Proxy(String),
    Direct,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy(url) => write!(f, "proxy {}", url),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl Transport {
    /// Picks the transport for a session
    ///
    /// The candidate proxy is `fetch.proxy`, then `$TOR_SOCKS`, then the local
    /// Tor default. A candidate that does not accept TCP connections falls
    /// back to a direct connection with a warning.
    pub async fn detect(config: &FetchConfig) -> Self {
        if config.direct {
            tracing::info!("Proxy disabled by configuration; connecting directly");
            return Self::Direct;
        }

        let candidate = config
            .proxy
            .clone()
            .or_else(|| std::env::var(PROXY_ENV).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_PROXY.to_string());

        if probe_proxy(&candidate).await {
            tracing::info!("Routing requests through {}", candidate);
            Self::Proxy(candidate)
        } else {
            tracing::warn!(
                "Proxy {} is not reachable; falling back to direct connections",
                candidate
            );
            Self::Direct
        }
    }
}

/// Checks that something listens at the proxy's host and port
async fn probe_proxy(proxy: &str) -> bool {
    let Ok(url) = Url::parse(proxy) else {
        tracing::warn!("Proxy URL {} does not parse", proxy);
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let port = url.port_or_known_default().unwrap_or(1080);

    matches!(
        timeout(PROXY_PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Builds an HTTP client for the given transport
pub fn build_http_client(config: &FetchConfig, transport: &Transport) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    builder = match transport {
        Transport::Proxy(proxy) => builder.proxy(reqwest::Proxy::all(proxy.as_str())?),
        Transport::Direct => builder.no_proxy(),
    };

    builder.build()
}

/// A response that made it through the fetcher
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// The body was cut at the byte cap
    pub truncated: bool,
}

impl FetchedPage {
    pub fn is_archived(&self) -> bool {
        ARCHIVE_STATUSES.contains(&self.status)
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// HTML or XHTML, or no declared type at all
    pub fn is_markup(&self) -> bool {
        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fetches pages with limits and retries
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    transport: Transport,
    total_timeout: Duration,
    max_bytes: usize,
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl Fetcher {
    /// Creates a fetcher, detecting the transport first
    pub async fn connect(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let transport = Transport::detect(config).await;
        Self::with_transport(config, transport)
    }

    /// Creates a fetcher over an explicit transport
    pub fn with_transport(config: &FetchConfig, transport: Transport) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, &transport)?;
        Ok(Self {
            client,
            transport,
            total_timeout: config.total_timeout(),
            max_bytes: config.max_bytes,
            max_attempts: config.max_attempts.max(1),
            backoff: ExponentialBackoff::new(config.backoff_base(), MAX_BACKOFF),
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx/3xx | Return page |
    /// | HTTP 404, 410 | Return page (archive signal) |
    /// | Any other status >= 400 | Retry with backoff |
    /// | Timeout, connection error | Retry with backoff |
    /// | Unusable URL | Fail immediately |
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if !e.is_retryable() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff.delay(attempt - 1);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One attempt under the wall-clock deadline
    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let deadline = Instant::now() + self.total_timeout;
        let timed_out = || FetchError::Timeout {
            url: url.to_string(),
        };

        let response = timeout_at(deadline, self.client.get(url.clone()).send())
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        if status >= 400 && !ARCHIVE_STATUSES.contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = timeout_at(deadline, stream.next())
            .await
            .map_err(|_| timed_out())?
        {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            let room = self.max_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if truncated {
            tracing::debug!("Body of {} truncated at {} bytes", url, self.max_bytes);
        }

        Ok(FetchedPage {
            url: final_url,
            status,
            headers,
            body,
            truncated,
        })
    }
}
