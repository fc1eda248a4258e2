//! Client-local bookkeeping of calls against the rate provider's quota.
//!
//! This is a soft guard: it cannot stop other clients sharing the same API
//! key from spending the real server-side quota.

use crate::store::RateStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The provider's advertised daily request limit.
pub const PROVIDER_DAILY_LIMIT: u32 = 25;

/// One call below the provider limit, so a concurrent client racing us on the
/// last slot does not push the account over.
pub const SAFE_DAILY_CEILING: u32 = PROVIDER_DAILY_LIMIT - 1;

/// Spacing derived from the provider's 5-calls-per-minute limit.
pub const MIN_CALL_SPACING_MS: i64 = 12_000;

/// Persisted call counter. Rolls to zero whenever the stored date is not
/// today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallBudgetState {
    pub date: NaiveDate,
    pub calls_used_today: u32,
    pub last_call: Option<DateTime<Utc>>,
}

impl CallBudgetState {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            calls_used_today: 0,
            last_call: None,
        }
    }
}

/// Tracks the daily call budget, durable through the [`RateStore`] so the
/// counter survives restarts.
pub struct BudgetTracker {
    store: Arc<dyn RateStore>,
}

impl BudgetTracker {
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }

    async fn current_state(&self) -> CallBudgetState {
        let today = Utc::now().date_naive();
        match self.store.budget_state().await {
            Some(state) if state.date == today => state,
            Some(stale) => {
                debug!(stale_date = %stale.date, "Rolling call budget over to a new day");
                CallBudgetState::fresh(today)
            }
            None => CallBudgetState::fresh(today),
        }
    }

    fn spacing_remaining_ms(state: &CallBudgetState) -> u64 {
        match state.last_call {
            Some(last) => {
                let elapsed = (Utc::now() - last).num_milliseconds();
                MIN_CALL_SPACING_MS.saturating_sub(elapsed).max(0) as u64
            }
            None => 0,
        }
    }

    /// True iff the daily count is below the ceiling and the inter-call
    /// interval has elapsed.
    pub async fn can_call_now(&self) -> bool {
        let state = self.current_state().await;
        state.calls_used_today < SAFE_DAILY_CEILING && Self::spacing_remaining_ms(&state) == 0
    }

    /// Calls left under the safe ceiling today.
    pub async fn remaining(&self) -> u32 {
        let state = self.current_state().await;
        SAFE_DAILY_CEILING.saturating_sub(state.calls_used_today)
    }

    /// Milliseconds until the inter-call interval permits another request.
    pub async fn ms_until_next_allowed(&self) -> u64 {
        let state = self.current_state().await;
        Self::spacing_remaining_ms(&state)
    }

    /// Counts one call and stamps the time, whatever its outcome was.
    pub async fn record_call(&self) {
        let mut state = self.current_state().await;
        state.calls_used_today += 1;
        state.last_call = Some(Utc::now());
        debug!(
            used = state.calls_used_today,
            ceiling = SAFE_DAILY_CEILING,
            "Recorded provider call"
        );
        self.store.set_budget_state(&state).await;
    }
}
