use crate::budget::CallBudgetState;
use crate::rates::{CachedSeries, CurrencyPair, DailyRate};
use crate::store::RateStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::debug;

const BATCH_MARKER_KEY: &str = "batch_marker";
const CALL_BUDGET_KEY: &str = "call_budget";

/// Durable rate store backed by a fjall keyspace. Series live in a `rates`
/// partition keyed `"FROM/TO"`; the batch marker and call budget live in a
/// `meta` partition.
pub struct FjallStore {
    _keyspace: Keyspace,
    rates: PartitionHandle,
    meta: PartitionHandle,
}

impl FjallStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = fjall::Config::new(path).open()?;
        let rates = keyspace.open_partition("rates", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;
        Ok(Self {
            _keyspace: keyspace,
            rates,
            meta,
        })
    }

    fn read_meta<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.meta.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(key, error = %e, "Discarding undecodable meta entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(key, error = %e, "Meta read failed");
                None
            }
        }
    }

    fn write_meta<T: serde::Serialize>(&self, key: &str, value: &T) {
        let res: Result<()> = (|| {
            self.meta.insert(key, serde_json::to_vec(value)?)?;
            Ok(())
        })();
        if let Err(e) = res {
            debug!(key, error = %e, "Meta write failed");
        }
    }

    fn clear_partition(partition: &PartitionHandle) {
        let keys: Vec<_> = partition
            .iter()
            .filter_map(|kv| kv.ok().map(|(k, _)| k))
            .collect();
        for key in keys {
            if let Err(e) = partition.remove(key) {
                debug!(error = %e, "Failed to remove entry while clearing store");
            }
        }
    }
}

#[async_trait]
impl RateStore for FjallStore {
    async fn get(&self, pair: &CurrencyPair) -> Option<CachedSeries> {
        match self.rates.get(pair.key()) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(series) => {
                    debug!(%pair, "Cache HIT");
                    Some(series)
                }
                Err(e) => {
                    debug!(%pair, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                debug!(%pair, "Cache MISS");
                None
            }
            Err(e) => {
                debug!(%pair, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn put(&self, pair: &CurrencyPair, rates: Vec<DailyRate>) {
        let series = CachedSeries::new(*pair, rates);
        let res: Result<()> = (|| {
            self.rates.insert(pair.key(), serde_json::to_vec(&series)?)?;
            Ok(())
        })();
        match res {
            Ok(()) => debug!(%pair, records = series.rates.len(), "Cache PUT"),
            Err(e) => debug!(%pair, error = %e, "Cache write failed"),
        }
    }

    async fn has_data(&self, pair: &CurrencyPair) -> bool {
        self.get(pair).await.is_some_and(|s| !s.rates.is_empty())
    }

    async fn list_all(&self) -> Vec<CachedSeries> {
        self.rates
            .iter()
            .filter_map(|kv| kv.ok())
            .filter_map(|(_, bytes)| serde_json::from_slice(&bytes).ok())
            .collect()
    }

    async fn batch_marker(&self) -> Option<NaiveDate> {
        self.read_meta(BATCH_MARKER_KEY)
    }

    async fn set_batch_marker(&self, date: NaiveDate) {
        self.write_meta(BATCH_MARKER_KEY, &date);
    }

    async fn budget_state(&self) -> Option<CallBudgetState> {
        self.read_meta(CALL_BUDGET_KEY)
    }

    async fn set_budget_state(&self, state: &CallBudgetState) {
        self.write_meta(CALL_BUDGET_KEY, state);
    }

    async fn clear(&self) {
        Self::clear_partition(&self.rates);
        Self::clear_partition(&self.meta);
        debug!("Cache CLEAR");
    }
}
