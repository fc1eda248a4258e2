//! Adapter for the shared backend rate store (`/rates` and `/status`).
//!
//! Reads degrade to an empty series on any failure so the resolver can fall
//! through to the next tier uniformly; only the explicit `status` query
//! surfaces backend errors.

use crate::error::RateError;
use crate::rates::{Currency, CurrencyPair, DailyRate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Upsert batch size, sized to the backend's request payload limit.
const SAVE_CHUNK_SIZE: usize = 500;

/// One rate row as the backend stores it, keyed `(from, to, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateRecord {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl ExchangeRateRecord {
    fn from_rate(pair: &CurrencyPair, rate: &DailyRate) -> Self {
        Self {
            from_currency: pair.from,
            to_currency: pair.to,
            date: rate.date,
            open: rate.open,
            high: rate.high,
            low: rate.low,
            close: rate.close,
        }
    }

    fn into_rate(self) -> DailyRate {
        DailyRate {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    success: bool,
    #[serde(default)]
    data: Vec<ExchangeRateRecord>,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    rates: &'a [ExchangeRateRecord],
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    success: bool,
}

/// Per-pair coverage summary from `/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct PairCoverage {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub count: u64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    success: bool,
    #[serde(default)]
    data: Vec<PairCoverage>,
}

pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Reads the stored series for a pair, optionally bounded by a date
    /// range. Returns an empty vec on any failure.
    #[instrument(name = "BackendFetch", skip(self), fields(from = %from, to = %to))]
    pub async fn fetch_series(
        &self,
        from: Currency,
        to: Currency,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Vec<DailyRate> {
        let mut query = vec![
            ("from".to_string(), from.to_string()),
            ("to".to_string(), to.to_string()),
        ];
        if let Some((start, end)) = range {
            query.push(("start_date".to_string(), start.to_string()));
            query.push(("end_date".to_string(), end.to_string()));
        }

        match self.get_rates(&query).await {
            Ok(mut rates) => {
                rates.sort_by_key(|r| r.date);
                debug!(records = rates.len(), "Backend returned series");
                rates
            }
            Err(e) => {
                debug!(error = %e, "Backend read failed, treating as miss");
                Vec::new()
            }
        }
    }

    async fn get_rates(&self, query: &[(String, String)]) -> Result<Vec<DailyRate>, RateError> {
        let url = format!("{}/rates", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| RateError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Backend(format!("HTTP {}", response.status())));
        }

        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| RateError::Backend(format!("malformed response: {e}")))?;
        if !body.success {
            return Err(RateError::Backend("backend reported failure".to_string()));
        }

        Ok(body
            .data
            .into_iter()
            .map(ExchangeRateRecord::into_rate)
            .collect())
    }

    /// Upserts a series in fixed-size chunks. Returns false if any chunk was
    /// rejected; remaining chunks are still attempted.
    #[instrument(name = "BackendSave", skip(self, rates), fields(pair = %pair, records = rates.len()))]
    pub async fn save_series(&self, pair: &CurrencyPair, rates: &[DailyRate]) -> bool {
        let records: Vec<ExchangeRateRecord> = rates
            .iter()
            .map(|r| ExchangeRateRecord::from_rate(pair, r))
            .collect();

        let url = format!("{}/rates", self.base_url);
        let mut all_ok = true;
        for chunk in records.chunks(SAVE_CHUNK_SIZE) {
            let result = self
                .client
                .post(&url)
                .json(&SaveRequest { rates: chunk })
                .send()
                .await;
            let ok = match result {
                Ok(response) if response.status().is_success() => response
                    .json::<SaveResponse>()
                    .await
                    .map(|r| r.success)
                    .unwrap_or(false),
                Ok(response) => {
                    warn!(status = %response.status(), "Backend rejected rate upsert");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Backend upsert request failed");
                    false
                }
            };
            all_ok &= ok;
        }
        all_ok
    }

    /// Lightweight reachability probe.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/status", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Per-pair row counts and date ranges.
    pub async fn status(&self) -> Result<Vec<PairCoverage>, RateError> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Backend(format!("HTTP {}", response.status())));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| RateError::Backend(format!("malformed status response: {e}")))?;
        if !body.success {
            return Err(RateError::Backend("backend reported failure".to_string()));
        }
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_ROWS: &str = r#"{
        "success": true,
        "count": 2,
        "data": [
            {
                "from_currency": "EUR", "to_currency": "USD",
                "date": "2024-01-03",
                "open": 1.092, "high": 1.097, "low": 1.089, "close": 1.095
            },
            {
                "from_currency": "EUR", "to_currency": "USD",
                "date": "2024-01-02",
                "open": 1.104, "high": 1.105, "low": 1.093, "close": 1.094
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_fetch_series_sorts_ascending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_ROWS))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        let rates = client.fetch_series(Currency::EUR, Currency::USD, None).await;

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].date.to_string(), "2024-01-02");
        assert_eq!(rates[1].date.to_string(), "2024-01-03");
    }

    #[tokio::test]
    async fn test_fetch_series_passes_date_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("start_date", "2024-01-01"))
            .and(query_param("end_date", "2024-04-10"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_ROWS))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        let range = Some((
            "2024-01-01".parse().unwrap(),
            "2024-04-10".parse().unwrap(),
        ));
        let rates = client
            .fetch_series(Currency::EUR, Currency::USD, range)
            .await;
        assert_eq!(rates.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_series_degrades_to_empty_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        assert!(
            client
                .fetch_series(Currency::EUR, Currency::USD, None)
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_fetch_series_degrades_to_empty_when_unreachable() {
        // Nothing is listening on this port.
        let client = BackendClient::new("http://127.0.0.1:9");
        assert!(
            client
                .fetch_series(Currency::EUR, Currency::USD, None)
                .await
                .is_empty()
        );
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn test_save_series_upserts_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rates"))
            .and(body_partial_json(serde_json::json!({
                "rates": [{
                    "from_currency": "EUR",
                    "to_currency": "USD",
                    "date": "2024-01-02",
                    "open": 1.104, "high": 1.105, "low": 1.093, "close": 1.094
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"success": true, "count": 1}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        let rates = vec![DailyRate {
            date: "2024-01-02".parse().unwrap(),
            open: 1.104,
            high: 1.105,
            low: 1.093,
            close: 1.094,
        }];

        assert!(client.save_series(&pair, &rates).await);
    }

    #[tokio::test]
    async fn test_save_series_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        let rates = vec![DailyRate {
            date: "2024-01-02".parse().unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
        }];

        assert!(!client.save_series(&pair, &rates).await);
    }

    #[tokio::test]
    async fn test_status_parses_coverage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "success": true,
                    "data": [{
                        "from_currency": "EUR", "to_currency": "USD",
                        "count": 120,
                        "earliest": "2024-01-01", "latest": "2024-04-10"
                    }]
                }"#,
            ))
            .mount(&server)
            .await;

        let client = BackendClient::new(&server.uri());
        assert!(client.is_available().await);

        let coverage = client.status().await.unwrap();
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].count, 120);
        assert_eq!(coverage[0].from_currency, Currency::EUR);
    }
}
