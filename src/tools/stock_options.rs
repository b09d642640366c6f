use crate::error::ChatError;
use crate::market_data::{MarketData, MarketDataError, OptionQuote};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const NAME: &str = "get_stock_options";
pub const DESCRIPTION: &str = "Fetches the top X stock option calls for a given stock symbol.";
pub const DEFAULT_TOP_X: i64 = 5;

pub const INVALID_SYMBOL: &str = "Invalid stock symbol. Please provide a valid ticker symbol.";
pub const INVALID_TOP_X: &str = "Invalid value for topX. Please provide a positive integer.";
pub const PROVIDER_UNAVAILABLE: &str =
    "The market data provider is not available. Please enable it to use this function.";
const SOURCE_LINE: &str = "Source: Yahoo Finance API.";

/// Arguments the model passes to `get_stock_options`.
///
/// `topX` stays a raw JSON value here: a present but non-integer count is a
/// validation failure with its own message, not a decode failure. Only an
/// absent key means the default; `"topX": null` is `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockOptionsArgs {
    pub symbol: String,
    #[serde(rename = "topX", default, deserialize_with = "present")]
    pub top_x: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl StockOptionsArgs {
    pub fn new(symbol: impl Into<String>, top_x: i64) -> Self {
        Self {
            symbol: symbol.into(),
            top_x: Some(Value::from(top_x)),
        }
    }

    pub fn from_json(args: &Value) -> Result<Self, ChatError> {
        if !args.is_object() {
            return Err(ChatError::argument_decode(NAME, "expected a JSON object"));
        }
        Self::deserialize(args).map_err(|e| ChatError::argument_decode(NAME, e.to_string()))
    }
}

#[derive(Clone)]
pub struct StockOptionsTool {
    market: Option<Arc<dyn MarketData>>,
}

impl StockOptionsTool {
    pub fn new(market: Option<Arc<dyn MarketData>>) -> Self {
        Self { market }
    }

    /// Always yields displayable text; failures render as their message.
    pub async fn call(&self, args: &StockOptionsArgs) -> String {
        match self.run(args).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool = NAME, kind = ?e.kind(), "{}", e);
                e.to_string()
            }
        }
    }

    pub async fn run(&self, args: &StockOptionsArgs) -> Result<String, ChatError> {
        let symbol = args.symbol.as_str();
        if !is_valid_symbol(symbol) {
            return Err(ChatError::Validation(INVALID_SYMBOL.to_string()));
        }
        let top_x = match &args.top_x {
            None => DEFAULT_TOP_X as usize,
            Some(v) => positive_count(v).ok_or_else(|| ChatError::Validation(INVALID_TOP_X.to_string()))?,
        };
        let market = self
            .market
            .as_ref()
            .ok_or_else(|| ChatError::DependencyUnavailable(PROVIDER_UNAVAILABLE.to_string()))?;

        match market.instrument(symbol).await {
            Ok(Some(info)) => {
                tracing::debug!(%symbol, listed_as = %info.symbol, name = ?info.name, currency = ?info.currency, "instrument found");
            }
            Ok(None) => {
                return Err(ChatError::UpstreamEmpty(format!(
                    "No data available for {}.",
                    symbol
                )));
            }
            Err(e) => return Err(fetch_error("Error fetching data for", symbol, e)),
        }

        let expirations = market
            .expirations(symbol)
            .await
            .map_err(|e| fetch_error("Error fetching options for", symbol, e))?;
        let Some(&nearest) = expirations.first() else {
            return Err(ChatError::UpstreamEmpty(format!(
                "No options data available for {}.",
                symbol
            )));
        };

        let calls = market
            .call_options(symbol, nearest)
            .await
            .map_err(|e| fetch_error("Error fetching options for", symbol, e))?;
        let rows: Vec<&OptionQuote> = calls.iter().take(top_x).collect();
        tracing::info!(%symbol, expiration = %nearest, rows = rows.len(), "fetched call options");

        Ok(format!(
            "Top {} calls options for {} expiring {}:\n\n{}\n\n{}",
            top_x,
            symbol,
            nearest,
            render_table(&rows),
            SOURCE_LINE
        ))
    }
}

fn fetch_error(prefix: &str, symbol: &str, e: MarketDataError) -> ChatError {
    match e {
        MarketDataError::Unavailable(_) => {
            ChatError::DependencyUnavailable(format!("{} {}: {}", prefix, symbol, e))
        }
        _ => ChatError::Transport(format!("{} {}: {}", prefix, symbol, e)),
    }
}

pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(char::is_alphabetic)
}

fn positive_count(v: &Value) -> Option<usize> {
    v.as_i64()
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
}

/// Markdown table with right-aligned numeric columns.
pub fn render_table(rows: &[&OptionQuote]) -> String {
    let headers = ["strike", "lastPrice", "volume"];
    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|q| {
            [
                q.strike.to_string(),
                q.last_price.to_string(),
                q.volume.map(|v| v.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = Vec::with_capacity(cells.len() + 2);
    out.push(format_row(&headers.map(String::from), &widths));
    out.push(format!(
        "|{}|",
        widths
            .iter()
            .map(|w| format!("{}:", "-".repeat(w + 1)))
            .collect::<Vec<_>>()
            .join("|")
    ));
    for row in &cells {
        out.push(format_row(row, &widths));
    }
    out.join("\n")
}

fn format_row(row: &[String; 3], widths: &[usize; 3]) -> String {
    let cols: Vec<String> = row
        .iter()
        .zip(widths.iter())
        .map(|(cell, w)| format!(" {:>width$} ", cell, width = w))
        .collect();
    format!("|{}|", cols.join("|"))
}
