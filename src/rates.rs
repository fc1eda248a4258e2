//! Core rate types shared across the cache, adapters and resolver.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

/// Supported currencies. The first variant doubles as the default pivot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    AUD,
    CAD,
    CHF,
    CNY,
    INR,
}

/// A directional currency pair. `EUR/USD` and `USD/EUR` are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: Currency,
    pub to: Currency,
}

impl CurrencyPair {
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    /// Canonical storage key, e.g. `"EUR/USD"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.from, self.to)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// One trading day's OHLC rate for a currency pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRate {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl DailyRate {
    /// The rate for the opposite pair direction. High and low swap because
    /// inversion reverses ordering.
    pub fn invert(&self) -> DailyRate {
        DailyRate {
            date: self.date,
            open: 1.0 / self.open,
            high: 1.0 / self.low,
            low: 1.0 / self.high,
            close: 1.0 / self.close,
        }
    }
}

/// A full series for one pair as held by the local cache. Replaced wholesale
/// on every refresh, never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSeries {
    pub pair: CurrencyPair,
    pub rates: Vec<DailyRate>,
    pub last_updated: DateTime<Utc>,
}

impl CachedSeries {
    pub fn new(pair: CurrencyPair, rates: Vec<DailyRate>) -> Self {
        Self {
            pair,
            rates,
            last_updated: Utc::now(),
        }
    }
}

/// Invert a whole series, preserving date order.
pub fn invert_series(rates: &[DailyRate]) -> Vec<DailyRate> {
    rates.iter().map(DailyRate::invert).collect()
}

/// Cross-rate series for two pivot-relative legs, inner-joined on date.
/// Only dates present in both legs survive. The high is the maximum
/// plausible ratio (`high / low`), the low the minimum (`low / high`).
pub fn cross_series(from_leg: &[DailyRate], to_leg: &[DailyRate]) -> Vec<DailyRate> {
    let by_date: HashMap<NaiveDate, &DailyRate> =
        to_leg.iter().map(|r| (r.date, r)).collect();

    from_leg
        .iter()
        .filter_map(|f| {
            by_date.get(&f.date).map(|t| DailyRate {
                date: f.date,
                open: f.open / t.open,
                high: f.high / t.low,
                low: f.low / t.high,
                close: f.close / t.close,
            })
        })
        .collect()
}
