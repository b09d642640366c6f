use crate::error::{ChatError, ErrorKind};
use crate::market_data::{MarketDataError, MockMarketData, OptionQuote};
use crate::tests::fixtures::*;
use crate::tools::StockOptionsTool;
use crate::tools::stock_options::{
    INVALID_SYMBOL, INVALID_TOP_X, PROVIDER_UNAVAILABLE, StockOptionsArgs, is_valid_symbol, render_table,
};
use serde_json::json;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_top_calls_for_valid_symbol() {
        let tool = tool_with(market_with_chain("AAPL", 8));

        let out = tool.run(&StockOptionsArgs::new("AAPL", 3)).await.unwrap();

        assert!(out.contains("Top 3 calls options for AAPL expiring 2024-06-21:"));
        assert!(out.contains("Source: Yahoo Finance API."));
        assert_eq!(table_rows(&out), 3);
        // Provider order is kept: first three strikes only
        assert!(out.contains("| 100 ") || out.contains(" 100 |"));
        assert!(out.contains(" 110 |"));
        assert!(!out.contains(" 115 |"));
    }

    #[tokio::test]
    async fn test_fewer_rows_than_requested() {
        let tool = tool_with(market_with_chain("TSLA", 2));

        let out = tool.run(&StockOptionsArgs::new("TSLA", 5)).await.unwrap();

        assert!(out.contains("TSLA"));
        assert!(out.contains("2024-06-21"));
        assert_eq!(table_rows(&out), 2);
    }

    #[tokio::test]
    async fn test_default_top_x_is_five() {
        let tool = tool_with(market_with_chain("GOOGL", 9));
        let args = StockOptionsArgs::from_json(&json!({ "symbol": "GOOGL" })).unwrap();
        assert_eq!(args.top_x, None);

        let out = tool.run(&args).await.unwrap();

        assert!(out.starts_with("Top 5 calls options for GOOGL"));
        assert_eq!(table_rows(&out), 5);
    }

    #[tokio::test]
    async fn test_invalid_symbols_skip_market_data() {
        for symbol in ["", "AAPL1", "BRK.B", "A B", "^GSPC", "12"] {
            let tool = tool_with(untouched_market());
            let err = tool.run(&StockOptionsArgs::new(symbol, 3)).await.unwrap_err();
            assert_eq!(err, ChatError::Validation(INVALID_SYMBOL.to_string()), "symbol {:?}", symbol);
            assert_eq!(tool.call(&StockOptionsArgs::new(symbol, 3)).await, INVALID_SYMBOL);
        }
    }

    #[tokio::test]
    async fn test_invalid_top_x_skips_market_data() {
        for top_x in [json!(0), json!(-2), json!(2.5), json!("3"), json!(true), json!([1]), json!(null)] {
            let tool = tool_with(untouched_market());
            let args = StockOptionsArgs::from_json(&json!({ "symbol": "AAPL", "topX": top_x.clone() })).unwrap();
            let err = tool.run(&args).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "topX {}", top_x);
            assert_eq!(err.to_string(), INVALID_TOP_X);
            assert_eq!(tool.call(&args).await, INVALID_TOP_X);
        }
    }

    #[test]
    fn test_null_top_x_is_not_absent() {
        let absent = StockOptionsArgs::from_json(&json!({ "symbol": "AAPL" })).unwrap();
        let null = StockOptionsArgs::from_json(&json!({ "symbol": "AAPL", "topX": null })).unwrap();

        assert_eq!(absent.top_x, None);
        assert_eq!(null.top_x, Some(serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_symbol_checked_before_top_x() {
        let tool = tool_with(untouched_market());
        let args = StockOptionsArgs {
            symbol: "??".to_string(),
            top_x: Some(json!(-1)),
        };
        assert_eq!(tool.call(&args).await, INVALID_SYMBOL);
    }

    #[tokio::test]
    async fn test_missing_provider() {
        let tool = StockOptionsTool::new(None);

        let err = tool.run(&StockOptionsArgs::new("AAPL", 3)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
        assert_eq!(err.to_string(), PROVIDER_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_instrument() {
        let mut market = MockMarketData::new();
        market.expect_instrument().times(1).returning(|_| Ok(None));
        market.expect_expirations().times(0);
        let tool = tool_with(market);

        let err = tool.run(&StockOptionsArgs::new("ZZZZZ", 3)).await.unwrap_err();

        assert_eq!(err, ChatError::UpstreamEmpty("No data available for ZZZZZ.".to_string()));
    }

    #[tokio::test]
    async fn test_no_expirations() {
        let mut market = MockMarketData::new();
        market.expect_instrument().returning(|s| {
            Ok(Some(crate::market_data::InstrumentInfo {
                symbol: s.to_string(),
                name: None,
                currency: None,
            }))
        });
        market.expect_expirations().returning(|_| Ok(Vec::new()));
        market.expect_call_options().times(0);
        let tool = tool_with(market);

        let out = tool.call(&StockOptionsArgs::new("KO", 3)).await;

        assert_eq!(out, "No options data available for KO.");
    }

    #[tokio::test]
    async fn test_provider_failures_become_text() {
        let mut market = MockMarketData::new();
        market
            .expect_instrument()
            .returning(|_| Err(MarketDataError::Request("HTTP 500 from market data provider".into())));
        let tool = tool_with(market);

        let err = tool.run(&StockOptionsArgs::new("MSFT", 3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            err.to_string(),
            "Error fetching data for MSFT: HTTP 500 from market data provider"
        );

        let mut market = MockMarketData::new();
        market
            .expect_instrument()
            .returning(|_| Err(MarketDataError::Unavailable("connection refused".into())));
        let tool = tool_with(market);

        let err = tool.run(&StockOptionsArgs::new("MSFT", 3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
        assert!(err.to_string().starts_with("Error fetching data for MSFT:"));
    }

    #[tokio::test]
    async fn test_chain_failure_mentions_options() {
        let mut market = MockMarketData::new();
        market.expect_instrument().returning(|s| {
            Ok(Some(crate::market_data::InstrumentInfo {
                symbol: s.to_string(),
                name: None,
                currency: None,
            }))
        });
        market
            .expect_expirations()
            .returning(|_| Ok(vec![expiration(2024, 1, 19)]));
        market
            .expect_call_options()
            .returning(|_, _| Err(MarketDataError::Decode("missing field `strike`".into())));
        let tool = tool_with(market);

        let out = tool.call(&StockOptionsArgs::new("IBM", 3)).await;

        assert!(out.starts_with("Error fetching options for IBM:"));
    }

    #[test]
    fn test_args_decode() {
        let args = StockOptionsArgs::from_json(&json!({ "symbol": "AAPL", "topX": 3 })).unwrap();
        assert_eq!(args, StockOptionsArgs::new("AAPL", 3));

        for bad in [
            json!({ "topX": 3 }),
            json!({ "symbol": 42 }),
            json!({ "symbol": "AAPL", "extra": true }),
            json!(["AAPL", 3]),
            json!("AAPL"),
        ] {
            let err = StockOptionsArgs::from_json(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentDecode, "payload {}", bad);
        }
    }

    #[test]
    fn test_symbol_rules() {
        assert!(is_valid_symbol("AAPL"));
        assert!(is_valid_symbol("googl"));
        assert!(!is_valid_symbol(""));
        assert!(!is_valid_symbol("BRK-B"));
        assert!(!is_valid_symbol("A1"));
    }

    #[test]
    fn test_render_table() {
        let a = OptionQuote {
            strike: 150.0,
            last_price: 5.25,
            volume: Some(120),
        };
        let b = OptionQuote {
            strike: 155.0,
            last_price: 2.1,
            volume: None,
        };

        let table = render_table(&[&a, &b]);

        let expected = "\
| strike | lastPrice | volume |
|-------:|----------:|-------:|
|    150 |      5.25 |    120 |
|    155 |       2.1 |        |";
        assert_eq!(table, expected);
    }

    #[test]
    fn test_render_empty_table() {
        let table = render_table(&[]);
        assert_eq!(table.lines().count(), 2);
    }
}
