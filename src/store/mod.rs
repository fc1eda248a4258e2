pub mod disk;
pub mod memory;

use crate::budget::CallBudgetState;
use crate::rates::{CachedSeries, CurrencyPair, DailyRate};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Durable local storage for rate series and process-wide sync metadata.
///
/// Series writes are whole-record replacements keyed by the directional pair.
/// All operations fail open: a storage error degrades to "absent" rather than
/// propagating, so callers treat failures as cache misses.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get(&self, pair: &CurrencyPair) -> Option<CachedSeries>;

    /// Replaces the stored series for `pair` in full.
    async fn put(&self, pair: &CurrencyPair, rates: Vec<DailyRate>);

    async fn has_data(&self, pair: &CurrencyPair) -> bool;

    async fn list_all(&self) -> Vec<CachedSeries>;

    /// Calendar date of the last fully successful batch refresh, if any.
    async fn batch_marker(&self) -> Option<NaiveDate>;

    async fn set_batch_marker(&self, date: NaiveDate);

    async fn budget_state(&self) -> Option<CallBudgetState>;

    async fn set_budget_state(&self, state: &CallBudgetState);

    async fn clear(&self);
}
