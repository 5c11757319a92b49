//! Trading-thesis generation through the Anthropic Messages API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CLAUDE_API_URL;
use crate::error::{AppError, Result};
use crate::types::{Market, Trade, Trader};

pub const MODEL: &str = "claude-sonnet-4-20250514";
pub const MAX_TOKENS: u32 = 4096;
const API_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "/v1/messages";

/// Trades beyond this many are summarised by a truncation notice.
pub const MAX_PROMPT_TRADES: usize = 50;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub thesis: String,
    /// Model that actually answered, as reported by the API.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub stop_reason: String,
    pub created_at: DateTime<Utc>,
}

/// A finished analysis. `TokenLimit` means the thesis was cut off at
/// `MAX_TOKENS`: the partial text is still usable, but callers have to decide
/// what to tell the user.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Complete(AnalysisResult),
    TokenLimit(AnalysisResult),
}

impl AnalysisOutcome {
    pub fn result(&self) -> &AnalysisResult {
        match self {
            AnalysisOutcome::Complete(r) | AnalysisOutcome::TokenLimit(r) => r,
        }
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisOutcome::Complete(r) | AnalysisOutcome::TokenLimit(r) => r,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, AnalysisOutcome::TokenLimit(_))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl ClaudeClient {
    /// Fails with [`AppError::NoApiKey`] when `api_key` is blank.
    /// An empty `endpoint` means the public API.
    pub fn new(api_key: &str, endpoint: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::NoApiKey);
        }
        let endpoint = if endpoint.trim().is_empty() { CLAUDE_API_URL } else { endpoint };
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_key: api_key.trim().to_string(),
            url: messages_url(endpoint),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the prompt for `trader` and ask the model for a thesis.
    ///
    /// A missing trader is rejected before any request is made. There is no
    /// retry; wrap the future in a timeout to bound it.
    pub async fn analyze_trader(
        &self,
        trader: Option<&Trader>,
        trades: &[Trade],
        markets: &HashMap<String, Market>,
    ) -> Result<AnalysisOutcome> {
        let trader = match trader {
            Some(t) if !t.address.trim().is_empty() => t,
            _ => return Err(AppError::InvalidTrader),
        };
        let prompt = build_thesis_prompt(trader, trades, markets);
        debug!(address = %trader.address, prompt_len = prompt.len(), "Requesting thesis");
        self.complete(&prompt).await
    }

    async fn complete(&self, prompt: &str) -> Result<AnalysisOutcome> {
        let request = Request {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![Message { role: "user", content: prompt }],
        };

        let resp = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) if !env.error.message.is_empty() => AppError::Api {
                    message: env.error.message,
                    status: status.as_u16(),
                },
                _ => AppError::HttpStatus { status: status.as_u16() },
            });
        }

        let response: Response = resp.json().await?;
        parse_response(response)
    }
}

fn parse_response(response: Response) -> Result<AnalysisOutcome> {
    let thesis: String = response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text)
        .collect();
    if thesis.trim().is_empty() {
        return Err(AppError::EmptyResponse);
    }

    let stop_reason = response.stop_reason.unwrap_or_default();
    let result = AnalysisResult {
        thesis,
        model: if response.model.is_empty() { MODEL.to_string() } else { response.model },
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        stop_reason,
        created_at: Utc::now(),
    };
    info!(
        model = %result.model,
        input_tokens = result.input_tokens,
        output_tokens = result.output_tokens,
        stop_reason = %result.stop_reason,
        "Thesis generated"
    );

    if result.stop_reason == "max_tokens" {
        Ok(AnalysisOutcome::TokenLimit(result))
    } else {
        Ok(AnalysisOutcome::Complete(result))
    }
}

/// Accept either a full messages URL or a base URL.
pub fn messages_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with(MESSAGES_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{MESSAGES_PATH}")
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Render the analysis prompt. Trades are used in the order given, capped at
/// [`MAX_PROMPT_TRADES`]; unknown markets render as "Unknown Market".
pub fn build_thesis_prompt(trader: &Trader, trades: &[Trade], markets: &HashMap<String, Market>) -> String {
    let mut p = String::with_capacity(4096);

    p.push_str(
        "You are an expert crypto trading analyst specializing in prediction markets. \
         Analyze the following trader's activity on Polymarket and generate a detailed trading thesis.\n\n",
    );

    p.push_str("## Trader Profile\n\n");
    p.push_str(&format!("- **Address:** {}\n", trader.address));
    if let Some(name) = trader.username.as_deref().filter(|n| !n.is_empty()) {
        p.push_str(&format!("- **Username:** {name}\n"));
    }
    p.push_str(&format!("- **Win Rate:** {:.2}%\n", trader.win_rate * 100.0));
    p.push_str(&format!("- **Profit/Loss:** ${:.2}\n", trader.profit_loss));
    p.push_str(&format!("- **ROI:** {:.2}%\n", trader.roi * 100.0));
    p.push_str(&format!("- **Total Volume:** ${:.2}\n", trader.volume));
    p.push_str(&format!("- **Last Scanned:** {}\n\n", trader.last_scanned.format(TIME_FORMAT)));

    p.push_str("## Recent Trading Activity\n\n");
    if trades.is_empty() {
        p.push_str("No trades available for analysis.\n\n");
    } else {
        for (i, t) in trades.iter().take(MAX_PROMPT_TRADES).enumerate() {
            let question = markets
                .get(&t.market_id)
                .map(|m| m.question.as_str())
                .unwrap_or("Unknown Market");
            p.push_str(&format!("### Trade {}\n", i + 1));
            p.push_str(&format!("- **Market:** {question}\n"));
            p.push_str(&format!("- **Type:** {}\n", t.trade_type));
            p.push_str(&format!("- **Side:** {}\n", t.side));
            p.push_str(&format!("- **Price:** ${:.4}\n", t.price));
            p.push_str(&format!("- **Size:** {:.4}\n", t.size));
            p.push_str(&format!("- **Time:** {}\n\n", t.timestamp.format(TIME_FORMAT)));
        }
        if trades.len() > MAX_PROMPT_TRADES {
            p.push_str(&format!(
                "_(Showing {} of {} total trades)_\n\n",
                MAX_PROMPT_TRADES,
                trades.len()
            ));
        }
    }

    p.push_str("## Analysis Request\n\n");
    p.push_str("Based on the trader profile and trading history above, please provide:\n\n");
    p.push_str(
        "1. **Trading Strategy Summary**: What is this trader's apparent strategy? \
         Are they a trend follower, contrarian, arbitrageur, or something else?\n",
    );
    p.push_str(
        "2. **Market Focus**: What types of markets do they prefer? \
         Are there patterns in the categories or topics they trade?\n",
    );
    p.push_str(
        "3. **Risk Profile**: How would you characterize their risk tolerance? \
         Do they make large concentrated bets or spread their exposure?\n",
    );
    p.push_str(
        "4. **Timing Analysis**: Are there patterns in when they enter or exit positions? \
         Do they trade early, late, or around specific events?\n",
    );
    p.push_str("5. **Strengths**: What does this trader appear to do well?\n");
    p.push_str("6. **Weaknesses/Risks**: What potential weaknesses or risks do you see in their approach?\n");
    p.push_str(
        "7. **Overall Thesis**: Summarize your assessment in a few sentences. \
         Would following this trader's activity be informative, and why?\n\n",
    );
    p.push_str("Please format your response in clear markdown sections.\n");
    p
}
