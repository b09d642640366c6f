//! Market-data collaborator used by the stock options tool.
//!
//! The production source is Yahoo Finance's options endpoint. The tool only
//! sees the [`MarketData`] trait, so tests substitute a mock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

pub const DEFAULT_YAHOO_URL: &str = "https://query2.finance.yahoo.com";
/// Any response from this host sets the session cookie the crumb is tied to.
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";

const USER_AGENT: &str = concat!("ticker-chat/", env!("CARGO_PKG_VERSION"));
// `instrument` and `expirations` read the same undated chain within one tool call.
const CHAIN_REUSE_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketDataError {
    #[error("market data provider unreachable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Request(String),
    #[error("unexpected response from market data provider: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub currency: Option<String>,
}

/// An options expiration, as the unix timestamp the provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expiration(i64);

impl Expiration {
    pub fn from_timestamp(ts: i64) -> Self {
        Self(ts)
    }

    pub fn timestamp(&self) -> i64 {
        self.0
    }

    pub fn date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.0, 0).map(|dt| dt.date_naive())
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date() {
            Some(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            None => write!(f, "{}", self.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuote {
    pub strike: f64,
    pub last_price: f64,
    pub volume: Option<u64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Instrument metadata, `None` when the provider knows nothing about it.
    async fn instrument(&self, symbol: &str) -> Result<Option<InstrumentInfo>, MarketDataError>;

    /// Available expirations, nearest first.
    async fn expirations(&self, symbol: &str) -> Result<Vec<Expiration>, MarketDataError>;

    /// Call options for one expiration, in provider order.
    async fn call_options(
        &self,
        symbol: &str,
        expiration: Expiration,
    ) -> Result<Vec<OptionQuote>, MarketDataError>;
}

pub struct YahooFinance {
    base_url: String,
    cookie_url: String,
    http: reqwest::Client,
    crumb: Mutex<Option<String>>,
    recent: Mutex<Option<RecentChain>>,
}

struct RecentChain {
    symbol: String,
    fetched_at: Instant,
    chain: Option<ChainResult>,
}

impl YahooFinance {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
            http,
            crumb: Mutex::new(None),
            recent: Mutex::new(None),
        })
    }

    pub fn with_cookie_url(mut self, cookie_url: String) -> Self {
        self.cookie_url = cookie_url;
        self
    }

    /// Session crumb, fetched once and cached until the provider rejects it.
    async fn crumb(&self) -> Result<String, MarketDataError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie host answers 404; only the Set-Cookie header matters.
        self.http
            .get(&self.cookie_url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let resp = self
            .http
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(map_reqwest_error)?;
        let crumb = body.trim();
        if !status.is_success() || crumb.is_empty() || crumb.contains(char::is_whitespace) {
            return Err(MarketDataError::Request(format!(
                "could not obtain a session crumb (HTTP {})",
                status
            )));
        }

        tracing::debug!("market data session established");
        *cached = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn fetch_chain(
        &self,
        symbol: &str,
        expiration: Option<Expiration>,
    ) -> Result<Option<ChainResult>, MarketDataError> {
        let url = format!("{}/v7/finance/options/{}", self.base_url, symbol);
        let mut refreshed = false;

        loop {
            let crumb = self.crumb().await?;
            let mut req = self.http.get(&url).query(&[("crumb", crumb.as_str())]);
            if let Some(exp) = expiration {
                req = req.query(&[("date", exp.timestamp())]);
            }

            let resp = req.send().await.map_err(map_reqwest_error)?;
            let status = resp.status();
            let body = resp.text().await.map_err(map_reqwest_error)?;
            tracing::debug!(%symbol, status = %status, "market data response");

            // Expired sessions come back as 401 "Invalid Crumb"; retry once with a new one.
            if status == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                tracing::debug!(%symbol, "crumb rejected, refreshing session");
                *self.crumb.lock().await = None;
                refreshed = true;
                continue;
            }
            // Unknown symbols come back as 404 with an empty result list.
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(MarketDataError::Request(format!(
                    "HTTP {} from market data provider",
                    status
                )));
            }
            return parse_option_chain(&body);
        }
    }

    async fn undated_chain(&self, symbol: &str) -> Result<Option<ChainResult>, MarketDataError> {
        if let Some(recent) = self.recent.lock().await.as_ref() {
            if recent.symbol == symbol && recent.fetched_at.elapsed() < CHAIN_REUSE_WINDOW {
                tracing::debug!(%symbol, "reusing option chain");
                return Ok(recent.chain.clone());
            }
        }

        let chain = self.fetch_chain(symbol, None).await?;
        *self.recent.lock().await = Some(RecentChain {
            symbol: symbol.to_string(),
            fetched_at: Instant::now(),
            chain: chain.clone(),
        });
        Ok(chain)
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn instrument(&self, symbol: &str) -> Result<Option<InstrumentInfo>, MarketDataError> {
        let chain = self.undated_chain(symbol).await?;
        Ok(chain.and_then(|c| {
            c.quote.map(|q| InstrumentInfo {
                symbol: q.symbol.unwrap_or_else(|| c.underlying_symbol.clone()),
                name: q.long_name.or(q.short_name),
                currency: q.currency,
            })
        }))
    }

    async fn expirations(&self, symbol: &str) -> Result<Vec<Expiration>, MarketDataError> {
        let chain = self.undated_chain(symbol).await?;
        Ok(chain
            .map(|c| {
                c.expiration_dates
                    .into_iter()
                    .map(Expiration::from_timestamp)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn call_options(
        &self,
        symbol: &str,
        expiration: Expiration,
    ) -> Result<Vec<OptionQuote>, MarketDataError> {
        let chain = self.fetch_chain(symbol, Some(expiration)).await?;
        let calls = chain
            .and_then(|c| c.options.into_iter().next())
            .map(|o| o.calls)
            .unwrap_or_default();
        Ok(calls
            .into_iter()
            .map(|c| OptionQuote {
                strike: c.strike,
                last_price: c.last_price.unwrap_or(0.0),
                volume: c.volume,
            })
            .collect())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MarketDataError {
    if e.is_connect() || e.is_timeout() {
        MarketDataError::Unavailable(e.to_string())
    } else {
        MarketDataError::Request(e.to_string())
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "optionChain")]
    option_chain: OptionChain,
}

#[derive(Deserialize)]
struct OptionChain {
    #[serde(default)]
    result: Vec<ChainResult>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChainResult {
    #[serde(default)]
    pub underlying_symbol: String,
    #[serde(default)]
    pub expiration_dates: Vec<i64>,
    #[serde(default)]
    pub quote: Option<Quote>,
    #[serde(default)]
    pub options: Vec<OptionsAtDate>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Quote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct OptionsAtDate {
    #[serde(default)]
    pub calls: Vec<ContractRow>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContractRow {
    pub strike: f64,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
}

pub(crate) fn parse_option_chain(body: &str) -> Result<Option<ChainResult>, MarketDataError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| MarketDataError::Decode(e.to_string()))?;
    let chain = envelope.option_chain;

    if let Some(err) = chain.error {
        if chain.result.is_empty() {
            let code = err.code.unwrap_or_default();
            if code.eq_ignore_ascii_case("not found") {
                return Ok(None);
            }
            return Err(MarketDataError::Request(
                err.description.unwrap_or(code),
            ));
        }
    }
    Ok(chain.result.into_iter().next())
}
