use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::platform::Platform;
use crate::config::CollectionKind;
use crate::persistence::Record;

/// Synthesized market snapshot for one platform over one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub platform: Platform,
    #[serde(with = "sortable_timestamp")]
    pub captured_at: DateTime<Utc>,
    pub window_secs: u64,
    pub volatility: f64,
    pub liquidity_usd: f64,
    /// Free-form regime label (e.g. "trending", "mean_reverting")
    pub regime: Option<String>,
}

/// Realized performance sample for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub platform: Platform,
    #[serde(with = "sortable_timestamp")]
    pub recorded_at: DateTime<Utc>,
    pub pnl_usd: f64,
    pub return_pct: f64,
    pub drawdown_pct: f64,
    pub sharpe: Option<f64>,
}

/// Capital split across platforms, as fractions of total capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(with = "sortable_timestamp")]
    pub decided_at: DateTime<Utc>,
    pub weights: BTreeMap<Platform, f64>,
    pub reason: String,
}

impl Allocation {
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Operational event mirrored into the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    #[serde(with = "sortable_timestamp")]
    pub logged_at: DateTime<Utc>,
    pub level: String,
    pub component: String,
    pub message: String,
}

impl SystemLogEntry {
    pub fn new(level: &str, component: &str, message: &str) -> Self {
        Self {
            logged_at: Utc::now(),
            level: level.to_lowercase(),
            component: component.to_string(),
            message: message.to_string(),
        }
    }
}

/// RFC 3339 with a fixed nanosecond fraction, so stored strings sort in time order.
mod sortable_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

impl Record for MarketState {
    const KIND: CollectionKind = CollectionKind::MarketStates;
}

impl Record for PerformanceMetric {
    const KIND: CollectionKind = CollectionKind::PerformanceMetrics;
}

impl Record for Allocation {
    const KIND: CollectionKind = CollectionKind::Allocations;
}

impl Record for SystemLogEntry {
    const KIND: CollectionKind = CollectionKind::SystemLogs;
}
