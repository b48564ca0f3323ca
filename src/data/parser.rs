use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;

use crate::bot::format::parse_timestamp;
use crate::data::error::ApiError;

/// One tgju row (gold, coin or currency). Prices are in rial.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceItem {
    pub title: String,
    #[serde(deserialize_with = "de_int")]
    pub price: i64,
    #[serde(alias = "changeAmount")]
    pub change_amount: Amount,
    #[serde(alias = "changePercentage", deserialize_with = "de_text", default)]
    pub change_percentage: String,
}

/// One coinex row. Only `price_irr` is reformatted; the rest is shown as sent.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoItem {
    pub name_fa: String,
    pub symbol: String,
    #[serde(deserialize_with = "de_text", default)]
    pub price_usd: String,
    #[serde(deserialize_with = "de_int")]
    pub price_irr: i64,
    #[serde(deserialize_with = "de_text", default)]
    pub market_cap: String,
    #[serde(deserialize_with = "de_text", default)]
    pub change_24h: String,
}

/// An integer field that is also displayed. `raw` keeps the backend's own
/// rendering (e.g. `"-1,000"`), `value` drives the trend symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Amount {
    pub value: i64,
    pub raw: String,
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = match NumOrText::deserialize(d)? {
            NumOrText::Int(n) => n.to_string(),
            NumOrText::Float(f) => f.to_string(),
            NumOrText::Text(s) => s,
        };
        let value = parse_int(&raw)
            .ok_or_else(|| de::Error::custom(format!("expected integer, got {raw:?}")))?;
        Ok(Self { value, raw })
    }
}

#[derive(Debug, Clone)]
pub struct PricePayload<T> {
    pub items: Vec<T>,
    pub retrieved_at: DateTime<Utc>,
}

/// Request accounting for one user, as reported by `/telegram/user-info/`.
#[derive(Debug, Clone)]
pub struct Usage {
    pub request_count: i64,
    pub max_request_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawPayload<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    retrieved_at: Option<String>,
}

#[derive(Deserialize)]
struct RawUsage {
    #[serde(deserialize_with = "de_int")]
    request_count: i64,
    #[serde(deserialize_with = "de_int")]
    max_request_count: i64,
    created_at: String,
}

/// Parses a scraper response. An empty list or an unreadable
/// `retrieved_at` rejects the whole payload.
pub fn parse_prices<T: DeserializeOwned>(body: &str) -> Result<PricePayload<T>, ApiError> {
    let raw: RawPayload<T> = serde_json::from_str(body)?;
    if raw.data.is_empty() {
        return Err(ApiError::Empty);
    }
    let stamp = raw.retrieved_at.unwrap_or_default();
    let retrieved_at = parse_timestamp(&stamp).ok_or(ApiError::Timestamp(stamp))?;
    Ok(PricePayload {
        items: raw.data,
        retrieved_at,
    })
}

pub fn parse_usage(body: &str) -> Result<Usage, ApiError> {
    let raw: RawUsage = serde_json::from_str(body)?;
    let created_at = parse_timestamp(&raw.created_at).ok_or(ApiError::Timestamp(raw.created_at))?;
    Ok(Usage {
        request_count: raw.request_count,
        max_request_count: raw.max_request_count,
        created_at,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Integers arrive either as JSON numbers or as strings like `"5,000,000"`.
fn de_int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match NumOrText::deserialize(d)? {
        NumOrText::Int(n) => Ok(n),
        NumOrText::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        NumOrText::Float(f) => Err(de::Error::custom(format!("expected integer, got {f}"))),
        NumOrText::Text(s) => {
            parse_int(&s).ok_or_else(|| de::Error::custom(format!("expected integer, got {s:?}")))
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse().ok()
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match NumOrText::deserialize(d)? {
        NumOrText::Int(n) => n.to_string(),
        NumOrText::Float(f) => f.to_string(),
        NumOrText::Text(s) => s,
    })
}
