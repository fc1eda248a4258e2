use crate::budget::CallBudgetState;
use crate::rates::{CachedSeries, CurrencyPair, DailyRate};
use crate::store::RateStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Inner {
    series: HashMap<String, CachedSeries>,
    batch_marker: Option<NaiveDate>,
    budget: Option<CallBudgetState>,
}

/// In-memory rate store. Drop-in replacement for the durable store in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn get(&self, pair: &CurrencyPair) -> Option<CachedSeries> {
        let inner = self.inner.lock().await;
        let value = inner.series.get(&pair.key()).cloned();
        if value.is_some() {
            debug!(%pair, "Cache HIT");
        } else {
            debug!(%pair, "Cache MISS");
        }
        value
    }

    async fn put(&self, pair: &CurrencyPair, rates: Vec<DailyRate>) {
        let mut inner = self.inner.lock().await;
        debug!(%pair, records = rates.len(), "Cache PUT");
        inner
            .series
            .insert(pair.key(), CachedSeries::new(*pair, rates));
    }

    async fn has_data(&self, pair: &CurrencyPair) -> bool {
        let inner = self.inner.lock().await;
        inner
            .series
            .get(&pair.key())
            .is_some_and(|s| !s.rates.is_empty())
    }

    async fn list_all(&self) -> Vec<CachedSeries> {
        let inner = self.inner.lock().await;
        inner.series.values().cloned().collect()
    }

    async fn batch_marker(&self) -> Option<NaiveDate> {
        self.inner.lock().await.batch_marker
    }

    async fn set_batch_marker(&self, date: NaiveDate) {
        self.inner.lock().await.batch_marker = Some(date);
    }

    async fn budget_state(&self) -> Option<CallBudgetState> {
        self.inner.lock().await.budget.clone()
    }

    async fn set_budget_state(&self, state: &CallBudgetState) {
        self.inner.lock().await.budget = Some(state.clone());
    }

    async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.series.clear();
        inner.batch_marker = None;
        inner.budget = None;
        debug!("Cache CLEAR");
    }
}
