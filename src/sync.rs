//! Bulk population of the local cache for all supported pairs.
//!
//! Two modes over the same pivot-relative step: a blocking full refresh that
//! forces every pair through the rate provider, and a detached background
//! sync that only consults the backend store and therefore never spends call
//! budget.

use crate::rates::Currency;
use crate::resolver::RateResolver;
use chrono::Utc;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a blocking batch refresh.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// True when the batch marker showed today's refresh already ran.
    pub already_current: bool,
    pub refreshed: usize,
    pub records: usize,
    pub failed: Vec<(Currency, String)>,
}

/// Outcome of a background sync pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: usize,
}

pub struct SyncOrchestrator {
    resolver: Arc<RateResolver>,
}

impl SyncOrchestrator {
    pub fn new(resolver: Arc<RateResolver>) -> Self {
        Self { resolver }
    }

    fn pivot_relative_currencies(&self) -> Vec<Currency> {
        let base = self.resolver.base();
        Currency::iter().filter(|c| *c != base).collect()
    }

    /// Forces every supported pair through the rate provider, reporting
    /// `(current, total, currency)` after each. Per-item failures are
    /// collected, not fatal; the batch marker is set only on a clean run.
    pub async fn refresh_all<F>(&self, mut progress: F) -> RefreshReport
    where
        F: FnMut(usize, usize, Currency),
    {
        let today = Utc::now().date_naive();
        let store = self.resolver.store();
        if store.batch_marker().await == Some(today) {
            debug!("Batch refresh already completed today");
            return RefreshReport {
                already_current: true,
                ..RefreshReport::default()
            };
        }

        let currencies = self.pivot_relative_currencies();
        let total = currencies.len();
        let mut report = RefreshReport::default();

        for (i, currency) in currencies.into_iter().enumerate() {
            match self
                .resolver
                .resolve_pair(currency, self.resolver.base(), true)
                .await
            {
                Ok(rates) => {
                    report.refreshed += 1;
                    report.records += rates.len();
                }
                Err(e) => {
                    warn!(%currency, error = %e, "Batch refresh item failed");
                    report.failed.push((currency, e.to_string()));
                }
            }
            progress(i + 1, total, currency);
        }

        if report.failed.is_empty() {
            store.set_batch_marker(today).await;
            info!(
                refreshed = report.refreshed,
                records = report.records,
                "Batch refresh complete"
            );
        } else {
            warn!(
                failed = report.failed.len(),
                "Batch refresh finished with failures, marker not set"
            );
        }
        report
    }

    /// Warms the local cache from the backend store on a detached task.
    ///
    /// Pairs already cache-resident are skipped and the rate provider is
    /// never consulted. The initiating caller is not expected to await the
    /// returned handle; failures surface only through the completion
    /// callback and log diagnostics.
    pub fn spawn_background_sync<F>(&self, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(SyncReport) + Send + 'static,
    {
        let resolver = Arc::clone(&self.resolver);
        let currencies = self.pivot_relative_currencies();
        tokio::spawn(async move {
            let report = Self::sync_from_backend(&resolver, &currencies).await;
            info!(
                synced = report.synced,
                skipped = report.skipped,
                failed = report.failed,
                records = report.records,
                "Background sync complete"
            );
            on_complete(report);
        })
    }

    async fn sync_from_backend(resolver: &RateResolver, currencies: &[Currency]) -> SyncReport {
        let base = resolver.base();
        let store = resolver.store();
        let mut report = SyncReport::default();

        let Some(backend) = resolver.backend() else {
            debug!("No backend store configured, background sync is a no-op");
            return report;
        };

        for &currency in currencies {
            let pair = crate::rates::CurrencyPair::new(currency, base);
            if store.has_data(&pair).await {
                report.skipped += 1;
                continue;
            }

            let rows = backend.fetch_series(currency, base, None).await;
            if rows.is_empty() {
                debug!(%pair, "Backend had no rows for pair during background sync");
                report.failed += 1;
                continue;
            }

            report.records += rows.len();
            store.put(&pair, rows).await;
            report.synced += 1;
        }
        report
    }
}
