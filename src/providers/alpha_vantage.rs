//! Adapter for the Alpha Vantage `FX_DAILY` endpoint, gated by the call
//! budget tracker.

use crate::budget::BudgetTracker;
use crate::error::RateError;
use crate::rates::{Currency, DailyRate};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct FxDailyResponse {
    #[serde(rename = "Time Series FX (Daily)")]
    series: Option<HashMap<String, FxDailyBar>>,
    /// Present when the provider is rate-limiting the account.
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FxDailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
}

pub struct AlphaVantageClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    budget: Arc<BudgetTracker>,
}

impl AlphaVantageClient {
    pub fn new(base_url: &str, api_key: &str, budget: Arc<BudgetTracker>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            budget,
        }
    }

    /// Fetches the full daily history for one pair.
    ///
    /// Raises [`RateError::BudgetExceeded`] without touching the network when
    /// the daily ceiling is spent; otherwise sleeps out any pending
    /// inter-call interval, performs the request and records it against the
    /// budget whatever the outcome.
    #[instrument(name = "FxDailyFetch", skip(self), fields(from = %from, to = %to))]
    pub async fn fetch_series(
        &self,
        from: Currency,
        to: Currency,
    ) -> Result<Vec<DailyRate>, RateError> {
        if self.budget.remaining().await == 0 {
            return Err(RateError::BudgetExceeded);
        }

        let wait_ms = self.budget.ms_until_next_allowed().await;
        if wait_ms > 0 {
            debug!(wait_ms, "Throttling before provider call");
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        let url = format!(
            "{}/query?function=FX_DAILY&from_symbol={from}&to_symbol={to}&outputsize=full&apikey={}",
            self.base_url, self.api_key
        );
        let result = self.client.get(&url).send().await;
        self.budget.record_call().await;

        let response =
            result.map_err(|e| RateError::Provider(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(RateError::Provider(format!(
                "HTTP {} from rate provider",
                response.status()
            )));
        }

        let body: FxDailyResponse = response
            .json()
            .await
            .map_err(|e| RateError::Provider(format!("malformed provider payload: {e}")))?;

        // The provider signals trouble inside a 200 body, so the payload
        // fields decide, not the status line.
        if let Some(note) = body.note {
            return Err(RateError::Provider(format!("rate limit notice: {note}")));
        }
        if let Some(message) = body.error_message {
            return Err(RateError::Provider(message));
        }
        let series = body
            .series
            .ok_or_else(|| RateError::Provider("daily series missing from payload".to_string()))?;

        let mut rates = series
            .into_iter()
            .map(|(date, bar)| parse_bar(&date, &bar))
            .collect::<Result<Vec<_>, _>>()?;
        rates.sort_by_key(|r| r.date);

        debug!(records = rates.len(), "Parsed daily series");
        Ok(rates)
    }
}

fn parse_bar(date: &str, bar: &FxDailyBar) -> Result<DailyRate, RateError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| RateError::Provider(format!("bad series date {date}: {e}")))?;
    Ok(DailyRate {
        date,
        open: parse_price(&bar.open)?,
        high: parse_price(&bar.high)?,
        low: parse_price(&bar.low)?,
        close: parse_price(&bar.close)?,
    })
}

fn parse_price(value: &str) -> Result<f64, RateError> {
    value
        .parse()
        .map_err(|e| RateError::Provider(format!("bad price value {value:?}: {e}")))
}
