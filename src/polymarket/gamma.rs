use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::{de_f64, de_opt_f64, MarketClient};
use crate::error::Result;
use crate::types::{Market, MarketStatus};

/// Market as returned by the Gamma API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "endDateIso")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub liquidity: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub volume: Option<f64>,
    #[serde(default)]
    pub tokens: Vec<GammaToken>,
    /// JSON-encoded string array on most responses, e.g. `"[\"Yes\", \"No\"]"`.
    #[serde(default)]
    pub outcomes: Option<serde_json::Value>,
    #[serde(default)]
    pub outcome_prices: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GammaToken {
    #[serde(default, alias = "tokenId")]
    pub token_id: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,
}

impl GammaMarket {
    /// Local market record. Status comes from the `closed` flag only.
    pub fn to_market(&self) -> Market {
        Market {
            id: self.id.clone(),
            question: self.question.clone(),
            description: self.description.clone().filter(|d| !d.is_empty()),
            category: self.category.clone().filter(|c| !c.is_empty()),
            ends_at: self.end_date.as_deref().and_then(parse_end_date),
            status: MarketStatus::from_closed_flag(self.closed),
        }
    }

    /// `(yes, no)` prices. Missing outcomes price at 0.
    pub fn outcome_prices(&self) -> (f64, f64) {
        let pairs = self.outcome_pairs();
        let find = |label: &str| {
            pairs
                .iter()
                .find(|(o, _)| o.eq_ignore_ascii_case(label))
                .map(|(_, p)| *p)
                .unwrap_or(0.0)
        };
        (find("Yes"), find("No"))
    }

    fn outcome_pairs(&self) -> Vec<(String, f64)> {
        if !self.tokens.is_empty() {
            return self.tokens.iter().map(|t| (t.outcome.clone(), t.price)).collect();
        }
        let outcomes = string_list(self.outcomes.as_ref());
        let prices = string_list(self.outcome_prices.as_ref());
        outcomes
            .into_iter()
            .zip(prices)
            .map(|(o, p)| (o, p.trim().parse().unwrap_or(0.0)))
            .collect()
    }
}

/// Accepts a JSON array or a string holding a JSON array; values may be strings or numbers.
fn string_list(v: Option<&serde_json::Value>) -> Vec<String> {
    let parsed;
    let arr = match v {
        Some(serde_json::Value::Array(a)) => a,
        Some(serde_json::Value::String(s)) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(serde_json::Value::Array(a)) => {
                parsed = a;
                &parsed
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    arr.iter()
        .map(|x| match x {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl MarketClient {
    /// `GET {gamma}/markets/{id}`
    pub async fn get_market(&self, id: &str) -> Result<GammaMarket> {
        let url = format!("{}/markets/{}", self.gamma_url(), id);
        self.get_json(&url, &[]).await
    }

    /// `GET {gamma}/markets?limit=N`
    pub async fn list_markets(&self, limit: usize) -> Result<Vec<GammaMarket>> {
        let url = format!("{}/markets", self.gamma_url());
        self.get_json(&url, &[("limit", limit.to_string())]).await
    }
}
