use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::data::error::ApiError;
use crate::data::parser::{self, PricePayload, Usage};

/// Scraper-backed markets exposed as bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Gold,
    Coin,
    Crypto,
    Currency,
}

impl Market {
    /// Path below `{base}/scrapers/`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Market::Gold => "tgju/gold",
            Market::Coin => "tgju/coin",
            Market::Crypto => "coinex/crypto",
            Market::Currency => "tgju/currency",
        }
    }
}

/// Profile pushed to the backend on `/start`.
#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub user_id: i64,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_bot: bool,
    pub phone_number: &'a str,
    pub language_code: &'a str,
    pub last_seen: String,
}

/// Thin client for the ArzWatch REST API. Cheap to share behind an `Arc`;
/// the inner `reqwest::Client` pools connections.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/{}/", self.base_url, path);
        tracing::debug!(%url, "POST");
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(body)
            .send()
            .await?;
        Ok(resp)
    }

    async fn expect_ok(resp: reqwest::Response) -> Result<String, ApiError> {
        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }
        Ok(body)
    }

    /// Fetches the latest quotes for `market` on behalf of `user_id`.
    pub async fn fetch_market<T: DeserializeOwned>(
        &self,
        market: Market,
        user_id: i64,
    ) -> Result<PricePayload<T>, ApiError> {
        let path = format!("scrapers/{}", market.endpoint());
        let resp = self.post(&path, &json!({ "user_id": user_id })).await?;
        let body = Self::expect_ok(resp).await?;
        parser::parse_prices(&body)
    }

    pub async fn usage(&self, user_id: i64) -> Result<Usage, ApiError> {
        let resp = self
            .post("telegram/user-info", &json!({ "user_id": user_id }))
            .await?;
        let body = Self::expect_ok(resp).await?;
        parser::parse_usage(&body)
    }

    /// Returns the backend's status code; 201 means the user was created.
    pub async fn register_user(&self, user: &NewUser<'_>) -> Result<StatusCode, ApiError> {
        let resp = self.post("telegram/create-user", user).await?;
        Ok(resp.status())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser::{CryptoItem, PriceItem};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&format!("{}/", server.uri()), "test-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoints() {
        assert_eq!(Market::Gold.endpoint(), "tgju/gold");
        assert_eq!(Market::Coin.endpoint(), "tgju/coin");
        assert_eq!(Market::Crypto.endpoint(), "coinex/crypto");
        assert_eq!(Market::Currency.endpoint(), "tgju/currency");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("سلام دنیا", 4), "سلام…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn fetch_market_posts_user_id_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrapers/tgju/gold/"))
            .and(header("Authorization", "Api-Key test-key"))
            .and(body_json(serde_json::json!({ "user_id": 42 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "title": "18K", "price": "5000000",
                    "changeAmount": "-1000", "changePercentage": "-0.2"
                }],
                "retrieved_at": "2024-10-17T12:00:00+00:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload: PricePayload<PriceItem> =
            client(&server).fetch_market(Market::Gold, 42).await.unwrap();
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].price, 5_000_000);
    }

    #[tokio::test]
    async fn crypto_uses_coinex_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrapers/coinex/crypto/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"name_fa": "اتریوم", "symbol": "ETH", "price_usd": "2600",
                          "price_irr": 1_700_000_000i64, "market_cap": "310B", "change_24h": "1.2%"}],
                "retrieved_at": "2024-10-17T12:00:00Z"
            })))
            .mount(&server)
            .await;

        let payload: PricePayload<CryptoItem> =
            client(&server).fetch_market(Market::Crypto, 1).await.unwrap();
        assert_eq!(payload.items[0].symbol, "ETH");
    }

    #[tokio::test]
    async fn non_200_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrapers/tgju/coin/"))
            .respond_with(ResponseTemplate::new(429).set_body_string("limit reached"))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_market::<PriceItem>(Market::Coin, 1)
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "limit reached");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrapers/tgju/currency/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [], "retrieved_at": "2024-10-17T12:00:00Z"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_market::<PriceItem>(Market::Currency, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Empty));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let api = ApiClient::new("http://127.0.0.1:9", "k", Duration::from_millis(500)).unwrap();
        let err = api.fetch_market::<PriceItem>(Market::Gold, 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
    }

    #[tokio::test]
    async fn usage_reads_user_info() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/telegram/user-info/"))
            .and(body_json(serde_json::json!({ "user_id": 9 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_count": 3, "max_request_count": 20, "created_at": "2024-05-01T08:00:00Z"
            })))
            .mount(&server)
            .await;

        let usage = client(&server).usage(9).await.unwrap();
        assert_eq!(usage.request_count, 3);
        assert_eq!(usage.max_request_count, 20);
    }

    #[tokio::test]
    async fn register_user_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/telegram/create-user/"))
            .and(header("Authorization", "Api-Key test-key"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let user = NewUser {
            user_id: 5,
            username: "u",
            first_name: "f",
            last_name: "",
            is_bot: false,
            phone_number: "",
            language_code: "fa",
            last_seen: "2024-10-17T12:00:00+00:00".into(),
        };
        let status = client(&server).register_user(&user).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }
}
