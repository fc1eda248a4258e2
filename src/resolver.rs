//! Resolution of arbitrary currency pairs against the three data tiers.
//!
//! Only pivot-relative pairs (`X/base`) are ever fetched or stored directly.
//! Everything else is derived: the opposite direction by inversion, a pair of
//! two non-pivot currencies by crossing the two pivot-relative legs.

use crate::error::RateError;
use crate::providers::alpha_vantage::AlphaVantageClient;
use crate::providers::backend::BackendClient;
use crate::rates::{Currency, CurrencyPair, DailyRate, cross_series, invert_series};
use crate::store::RateStore;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct RateResolver {
    store: Arc<dyn RateStore>,
    provider: AlphaVantageClient,
    backend: Option<BackendClient>,
    base: Currency,
}

impl RateResolver {
    pub fn new(
        store: Arc<dyn RateStore>,
        provider: AlphaVantageClient,
        backend: Option<BackendClient>,
        base: Currency,
    ) -> Self {
        Self {
            store,
            provider,
            backend,
            base,
        }
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    pub fn store(&self) -> &Arc<dyn RateStore> {
        &self.store
    }

    pub fn backend(&self) -> Option<&BackendClient> {
        self.backend.as_ref()
    }

    /// Produces the daily series for `(from, to)`.
    ///
    /// `force_refresh` bypasses cache and backend for the underlying
    /// pivot-relative fetches and goes to the rate provider, provided the
    /// call budget allows it.
    #[instrument(name = "ResolvePair", skip(self), fields(from = %from, to = %to, force = force_refresh))]
    pub async fn resolve_pair(
        &self,
        from: Currency,
        to: Currency,
        force_refresh: bool,
    ) -> Result<Vec<DailyRate>, RateError> {
        self.resolve(from, to, force_refresh).await
    }

    fn resolve(
        &self,
        from: Currency,
        to: Currency,
        force: bool,
    ) -> BoxFuture<'_, Result<Vec<DailyRate>, RateError>> {
        Box::pin(async move {
            if from == to {
                return Ok(Vec::new());
            }

            if from == self.base {
                // base/X is the mirror of X/base.
                let direct = self.resolve(to, self.base, force).await?;
                return Ok(invert_series(&direct));
            }

            if to != self.base {
                let (from_leg, to_leg) = tokio::join!(
                    self.resolve(from, self.base, force),
                    self.resolve(to, self.base, force)
                );
                let (from_leg, to_leg) = (from_leg?, to_leg?);
                if from_leg.is_empty() || to_leg.is_empty() {
                    debug!(%from, %to, "A pivot leg came back empty, yielding empty cross series");
                    return Ok(Vec::new());
                }
                return Ok(cross_series(&from_leg, &to_leg));
            }

            self.resolve_against_base(from, force).await
        })
    }

    /// The only path that touches the data tiers: cache, then backend, then
    /// the rate provider.
    async fn resolve_against_base(
        &self,
        from: Currency,
        force: bool,
    ) -> Result<Vec<DailyRate>, RateError> {
        let pair = CurrencyPair::new(from, self.base);

        if !force {
            if let Some(series) = self.store.get(&pair).await {
                if !series.rates.is_empty() {
                    return Ok(series.rates);
                }
            }
        }

        if let Some(backend) = &self.backend {
            let rows = backend.fetch_series(from, self.base, None).await;
            if !rows.is_empty() && !force {
                debug!(%pair, records = rows.len(), "Adopting backend series into local cache");
                self.store.put(&pair, rows.clone()).await;
                return Ok(rows);
            }
        }

        match self.provider.fetch_series(from, self.base).await {
            Ok(rates) => {
                self.store.put(&pair, rates.clone()).await;
                if let Some(backend) = &self.backend {
                    if !backend.save_series(&pair, &rates).await {
                        warn!(%pair, "Failed to persist fetched series to backend store");
                    }
                }
                Ok(rates)
            }
            // An exhausted budget propagates so the caller can tell the user
            // to come back tomorrow; only provider failures downgrade to
            // stale data.
            Err(err @ RateError::BudgetExceeded) => Err(err),
            Err(err) => {
                if let Some(stale) = self.store.get(&pair).await {
                    if !stale.rates.is_empty() {
                        warn!(%pair, error = %err, "Provider fetch failed, serving stale cached series");
                        return Ok(stale.rates);
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetTracker, CallBudgetState, SAFE_DAILY_CEILING};
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fx_daily_body(days: &[(&str, f64, f64, f64, f64)]) -> String {
        let entries: Vec<String> = days
            .iter()
            .map(|(date, o, h, l, c)| {
                format!(
                    r#""{date}": {{"1. open": "{o}", "2. high": "{h}", "3. low": "{l}", "4. close": "{c}"}}"#
                )
            })
            .collect();
        format!(
            r#"{{"Time Series FX (Daily)": {{{}}}}}"#,
            entries.join(",")
        )
    }

    async fn mount_provider_pair(server: &MockServer, from: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "FX_DAILY"))
            .and(query_param("from_symbol", from))
            .and(query_param("to_symbol", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        resolver: RateResolver,
        _provider_server: MockServer,
        _backend_server: Option<MockServer>,
    }

    async fn fixture(backend: Option<MockServer>) -> Fixture {
        let provider_server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let budget = Arc::new(BudgetTracker::new(store.clone() as Arc<dyn RateStore>));
        let provider = AlphaVantageClient::new(&provider_server.uri(), "testkey", budget);
        let backend_client = backend.as_ref().map(|s| BackendClient::new(&s.uri()));
        let resolver = RateResolver::new(
            store.clone() as Arc<dyn RateStore>,
            provider,
            backend_client,
            Currency::USD,
        );
        Fixture {
            store,
            resolver,
            _provider_server: provider_server,
            _backend_server: backend,
        }
    }

    fn seed(dates: &[&str]) -> Vec<DailyRate> {
        dates
            .iter()
            .enumerate()
            .map(|(i, d)| DailyRate {
                date: d.parse().unwrap(),
                open: 1.0 + i as f64,
                high: 2.0 + i as f64,
                low: 0.5 + i as f64,
                close: 1.5 + i as f64,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_identical_currencies_resolve_to_empty() {
        let f = fixture(None).await;
        let rates = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::EUR, false)
            .await
            .unwrap();
        assert!(rates.is_empty());
    }

    #[tokio::test]
    async fn test_cached_base_pair_is_served_without_fetching() {
        let f = fixture(None).await;
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        f.store.put(&pair, seed(&["2024-01-02"])).await;

        // No provider mock is mounted, so any fetch attempt would error.
        let rates = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();
        assert_eq!(rates, seed(&["2024-01-02"]));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_with_single_fetch() {
        let f = fixture(None).await;
        mount_provider_pair(
            &f._provider_server,
            "EUR",
            fx_daily_body(&[("2024-01-02", 1.10, 1.11, 1.09, 1.105)]),
        )
        .await;

        let first = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();
        let second = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();

        assert_eq!(first, second);
        // Only the first resolution reached the provider.
        assert_eq!(
            f.store.budget_state().await.unwrap().calls_used_today,
            1
        );
    }

    #[tokio::test]
    async fn test_base_from_pair_is_inverted_pivot_series() {
        let f = fixture(None).await;
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        f.store.put(&pair, seed(&["2024-01-02", "2024-01-03"])).await;

        let direct = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();
        let inverted = f
            .resolver
            .resolve_pair(Currency::USD, Currency::EUR, false)
            .await
            .unwrap();

        assert_eq!(inverted.len(), direct.len());
        for (inv, d) in inverted.iter().zip(&direct) {
            assert_eq!(inv.date, d.date);
            assert_eq!(inv.open, 1.0 / d.open);
            assert_eq!(inv.high, 1.0 / d.low);
            assert_eq!(inv.low, 1.0 / d.high);
            assert_eq!(inv.close, 1.0 / d.close);
        }
    }

    #[tokio::test]
    async fn test_cross_pair_joins_on_shared_dates_only() {
        let f = fixture(None).await;
        f.store
            .put(
                &CurrencyPair::new(Currency::EUR, Currency::USD),
                seed(&["2024-01-01", "2024-01-02", "2024-01-03"]),
            )
            .await;
        f.store
            .put(
                &CurrencyPair::new(Currency::JPY, Currency::USD),
                seed(&["2024-01-02", "2024-01-03", "2024-01-04"]),
            )
            .await;

        let cross = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::JPY, false)
            .await
            .unwrap();

        let dates: Vec<String> = cross.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03"]);
    }

    #[tokio::test]
    async fn test_cross_pair_with_empty_leg_is_empty() {
        let f = fixture(None).await;
        f.store
            .put(
                &CurrencyPair::new(Currency::EUR, Currency::USD),
                seed(&["2024-01-02"]),
            )
            .await;
        // JPY leg present but empty.
        f.store
            .put(&CurrencyPair::new(Currency::JPY, Currency::USD), Vec::new())
            .await;
        mount_provider_pair(
            &f._provider_server,
            "JPY",
            fx_daily_body(&[]),
        )
        .await;

        let cross = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::JPY, false)
            .await
            .unwrap();
        assert!(cross.is_empty());
    }

    #[tokio::test]
    async fn test_backend_rows_are_adopted_into_cache() {
        let backend = MockServer::start().await;
        let rows: Vec<String> = (1..=100)
            .map(|i| {
                format!(
                    r#"{{"from_currency": "EUR", "to_currency": "USD",
                        "date": "{}",
                        "open": 1.1, "high": 1.12, "low": 1.08, "close": 1.11}}"#,
                    chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                        .unwrap()
                        .checked_add_days(chrono::Days::new(i - 1))
                        .unwrap()
                )
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"success": true, "count": 100, "data": [{}]}}"#,
                rows.join(",")
            )))
            .mount(&backend)
            .await;

        let f = fixture(Some(backend)).await;
        let rates = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();

        assert_eq!(rates.len(), 100);
        assert!(
            f.store
                .has_data(&CurrencyPair::new(Currency::EUR, Currency::USD))
                .await
        );
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_stale_cache() {
        let f = fixture(None).await;
        let pair = CurrencyPair::new(Currency::GBP, Currency::USD);
        let stale: Vec<DailyRate> = (0..50)
            .map(|i| DailyRate {
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i))
                    .unwrap(),
                open: 1.25,
                high: 1.26,
                low: 1.24,
                close: 1.255,
            })
            .collect();
        f.store.put(&pair, stale.clone()).await;

        mount_provider_pair(
            &f._provider_server,
            "GBP",
            r#"{"Error Message": "Invalid API call."}"#.to_string(),
        )
        .await;

        // Forced, so the cache tier is bypassed and the provider errors.
        let rates = f
            .resolver
            .resolve_pair(Currency::GBP, Currency::USD, true)
            .await
            .unwrap();
        assert_eq!(rates.len(), 50);
        assert_eq!(rates, stale);
    }

    #[tokio::test]
    async fn test_provider_failure_without_cache_propagates() {
        let f = fixture(None).await;
        mount_provider_pair(
            &f._provider_server,
            "CHF",
            r#"{"Error Message": "Invalid API call."}"#.to_string(),
        )
        .await;

        let err = f
            .resolver
            .resolve_pair(Currency::CHF, Currency::USD, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::Provider(_)));
    }

    #[tokio::test]
    async fn test_forced_refresh_with_exhausted_budget_raises() {
        let f = fixture(None).await;
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        f.store.put(&pair, seed(&["2024-01-02"])).await;
        f.store
            .set_budget_state(&CallBudgetState {
                date: Utc::now().date_naive(),
                calls_used_today: SAFE_DAILY_CEILING,
                last_call: None,
            })
            .await;

        // Even with a cached copy available, an exhausted budget surfaces
        // rather than silently serving the cache.
        let err = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, true)
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::BudgetExceeded));

        // An unforced resolve still serves the cache without spending calls.
        let rates = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, false)
            .await
            .unwrap();
        assert_eq!(rates, seed(&["2024-01-02"]));
    }

    #[tokio::test]
    async fn test_forced_refresh_invokes_provider_despite_cache() {
        let f = fixture(None).await;
        let pair = CurrencyPair::new(Currency::EUR, Currency::USD);
        f.store.put(&pair, seed(&["2020-06-01"])).await;
        mount_provider_pair(
            &f._provider_server,
            "EUR",
            fx_daily_body(&[("2024-01-02", 1.10, 1.11, 1.09, 1.105)]),
        )
        .await;

        let rates = f
            .resolver
            .resolve_pair(Currency::EUR, Currency::USD, true)
            .await
            .unwrap();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].date.to_string(), "2024-01-02");
        assert_eq!(f.store.budget_state().await.unwrap().calls_used_today, 1);
        // The cache now holds the refreshed series.
        assert_eq!(f.store.get(&pair).await.unwrap().rates, rates);
    }
}
