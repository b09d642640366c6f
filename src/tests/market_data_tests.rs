use crate::market_data::{Expiration, MarketData, MarketDataError, YahooFinance, parse_option_chain};
use crate::mocks::http_server::{Canned, CannedServer};
use crate::tests::fixtures::expiration;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_BODY: &str = r#"{
        "optionChain": {
            "result": [{
                "underlyingSymbol": "AAPL",
                "expirationDates": [1718928000, 1719532800],
                "strikes": [100.0, 105.0],
                "hasMiniOptions": false,
                "quote": {
                    "symbol": "AAPL",
                    "shortName": "Apple Inc.",
                    "currency": "USD",
                    "regularMarketPrice": 210.5
                },
                "options": [{
                    "expirationDate": 1718928000,
                    "hasMiniOptions": false,
                    "calls": [
                        {"contractSymbol": "AAPL240621C00100000", "strike": 100.0, "lastPrice": 110.2, "volume": 12},
                        {"contractSymbol": "AAPL240621C00105000", "strike": 105.0, "lastPrice": 104.9}
                    ],
                    "puts": []
                }]
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chain() {
        let chain = parse_option_chain(CHAIN_BODY).unwrap().unwrap();

        assert_eq!(chain.underlying_symbol, "AAPL");
        assert_eq!(chain.expiration_dates, vec![1718928000, 1719532800]);
        let quote = chain.quote.as_ref().unwrap();
        assert_eq!(quote.short_name.as_deref(), Some("Apple Inc."));
        let calls = &chain.options[0].calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].strike, 100.0);
        assert_eq!(calls[0].volume, Some(12));
        assert_eq!(calls[1].volume, None);
    }

    #[test]
    fn test_parse_unknown_symbol() {
        let empty = r#"{"optionChain":{"result":[],"error":null}}"#;
        assert!(parse_option_chain(empty).unwrap().is_none());

        let not_found = r#"{"optionChain":{"result":[],"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(parse_option_chain(not_found).unwrap().is_none());
    }

    #[test]
    fn test_parse_provider_error() {
        let body = r#"{"optionChain":{"result":[],"error":{"code":"Bad Request","description":"Invalid Crumb"}}}"#;

        let err = parse_option_chain(body).unwrap_err();

        assert_eq!(err, MarketDataError::Request("Invalid Crumb".to_string()));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_option_chain("Too Many Requests").unwrap_err();
        assert!(matches!(err, MarketDataError::Decode(_)));
    }

    #[test]
    fn test_expiration_dates() {
        let exp = Expiration::from_timestamp(1718928000);
        assert_eq!(exp.to_string(), "2024-06-21");
        assert_eq!(exp, expiration(2024, 6, 21));
        assert!(expiration(2024, 6, 21) < expiration(2024, 6, 28));
    }

    fn yahoo(server: &CannedServer) -> YahooFinance {
        YahooFinance::new(server.base_url.clone(), Duration::from_secs(5))
            .unwrap()
            .with_cookie_url(format!("{}/cookie", server.base_url))
    }

    fn session(crumb: &str) -> Vec<Canned> {
        vec![
            Canned::new(404, "").header("Set-Cookie", "A3=session-token; Path=/"),
            Canned::new(200, crumb),
        ]
    }

    #[tokio::test]
    async fn test_session_handshake_and_chain_reuse() {
        let mut script = session("crumb123");
        script.push(Canned::new(200, CHAIN_BODY));
        let server = CannedServer::start(script).await;
        let yahoo = yahoo(&server);

        let info = yahoo.instrument("AAPL").await.unwrap().unwrap();
        let expirations = yahoo.expirations("AAPL").await.unwrap();

        assert_eq!(info.symbol, "AAPL");
        assert_eq!(info.name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.currency.as_deref(), Some("USD"));
        assert_eq!(expirations, vec![expiration(2024, 6, 21), expiration(2024, 6, 28)]);

        // Cookie, crumb, then a single chain request shared by both lookups
        let requests = server.requests().await;
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("GET /cookie "));
        assert!(requests[1].starts_with("GET /v1/test/getcrumb "));
        assert!(requests[1].to_lowercase().contains("cookie: a3=session-token"));
        assert!(requests[2].starts_with("GET /v7/finance/options/AAPL?crumb=crumb123 "));
    }

    #[tokio::test]
    async fn test_rejected_crumb_is_refreshed_once() {
        let mut script = session("stale");
        script.push(Canned::new(401, r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#));
        script.extend(session("fresh"));
        script.push(Canned::new(200, CHAIN_BODY));
        let server = CannedServer::start(script).await;
        let yahoo = yahoo(&server);

        let calls = yahoo.call_options("AAPL", expiration(2024, 6, 21)).await.unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].strike, 100.0);
        assert_eq!(calls[0].last_price, 110.2);
        assert_eq!(calls[0].volume, Some(12));
        assert_eq!(calls[1].volume, None);

        let requests = server.requests().await;
        assert_eq!(requests.len(), 6);
        assert!(requests[2].contains("crumb=stale"));
        assert!(requests[5].starts_with("GET /v7/finance/options/AAPL?crumb=fresh&date=1718928000 "));
    }

    #[tokio::test]
    async fn test_second_rejection_is_an_error() {
        let mut script = session("a");
        script.push(Canned::new(401, "Unauthorized"));
        script.extend(session("b"));
        script.push(Canned::new(401, "Unauthorized"));
        let server = CannedServer::start(script).await;

        let err = yahoo(&server).expirations("AAPL").await.unwrap_err();

        assert_eq!(
            err,
            MarketDataError::Request("HTTP 401 Unauthorized from market data provider".to_string())
        );
        assert_eq!(server.requests().await.len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_symbol_status() {
        let mut script = session("crumb123");
        script.push(Canned::new(
            404,
            r#"{"optionChain":{"result":[],"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        ));
        let server = CannedServer::start(script).await;
        let yahoo = yahoo(&server);

        assert_eq!(yahoo.instrument("ZZZZ").await.unwrap(), None);
        assert!(yahoo.expirations("ZZZZ").await.unwrap().is_empty());
        assert_eq!(server.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let mut script = session("crumb123");
        script.push(Canned::new(500, "oops"));
        let server = CannedServer::start(script).await;

        let err = yahoo(&server)
            .call_options("AAPL", expiration(2024, 6, 21))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MarketDataError::Request("HTTP 500 Internal Server Error from market data provider".to_string())
        );
        server.requests().await;
    }

    #[tokio::test]
    async fn test_crumb_refused() {
        let server = CannedServer::start(vec![
            Canned::new(404, ""),
            Canned::new(429, "Too Many Requests"),
        ])
        .await;

        let err = yahoo(&server).instrument("AAPL").await.unwrap_err();

        assert_eq!(
            err,
            MarketDataError::Request("could not obtain a session crumb (HTTP 429 Too Many Requests)".to_string())
        );
        assert_eq!(server.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let yahoo = YahooFinance::new(base_url.clone(), Duration::from_secs(5))
            .unwrap()
            .with_cookie_url(base_url);

        let err = yahoo.expirations("AAPL").await.unwrap_err();

        assert!(matches!(err, MarketDataError::Unavailable(_)), "{:?}", err);
    }
}
