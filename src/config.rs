use crate::models::platform::Platform;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, info, warn, Level};

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_PROJECT_ID: &str = "trading-ecosystem-optimizer";
pub const DEFAULT_CREDENTIALS_PATH: &str = "./config/firebase-creds.json";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// 5m, 15m, 1h, 2h, 6h
pub const DEFAULT_WINDOWS_SECS: [u64; 5] = [300, 900, 3600, 7200, 21600];

/// Logical collections the optimizer persists to.
///
/// Call sites address collections only through this enum; the physical name
/// comes from [`CollectionMap`], so renaming a collection never touches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionKind {
    MarketStates,
    PerformanceMetrics,
    Allocations,
    SystemLogs,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::MarketStates,
        CollectionKind::PerformanceMetrics,
        CollectionKind::Allocations,
        CollectionKind::SystemLogs,
    ];

    pub fn logical_name(&self) -> &'static str {
        match self {
            CollectionKind::MarketStates => "market_states",
            CollectionKind::PerformanceMetrics => "performance_metrics",
            CollectionKind::Allocations => "allocations",
            CollectionKind::SystemLogs => "system_logs",
        }
    }

    fn default_physical_name(&self) -> &'static str {
        match self {
            CollectionKind::MarketStates => "market_synthesis_states",
            CollectionKind::PerformanceMetrics => "historical_performance",
            CollectionKind::Allocations => "resource_allocations",
            CollectionKind::SystemLogs => "ecosystem_logs",
        }
    }
}

/// Logical → physical collection names. Always holds all four kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMap {
    market_states: String,
    performance_metrics: String,
    allocations: String,
    system_logs: String,
}

impl Default for CollectionMap {
    fn default() -> Self {
        Self {
            market_states: CollectionKind::MarketStates.default_physical_name().into(),
            performance_metrics: CollectionKind::PerformanceMetrics.default_physical_name().into(),
            allocations: CollectionKind::Allocations.default_physical_name().into(),
            system_logs: CollectionKind::SystemLogs.default_physical_name().into(),
        }
    }
}

impl CollectionMap {
    pub fn resolve(&self, kind: CollectionKind) -> &str {
        match kind {
            CollectionKind::MarketStates => &self.market_states,
            CollectionKind::PerformanceMetrics => &self.performance_metrics,
            CollectionKind::Allocations => &self.allocations,
            CollectionKind::SystemLogs => &self.system_logs,
        }
    }

    /// Point a logical collection at a different physical collection.
    pub fn rename(&mut self, kind: CollectionKind, physical: impl Into<String>) -> anyhow::Result<()> {
        let physical = physical.into();
        anyhow::ensure!(
            !physical.trim().is_empty(),
            "Collection name for {} must not be empty",
            kind.logical_name()
        );
        anyhow::ensure!(
            !physical.contains('/'),
            "Collection name for {} must not contain '/': {physical}",
            kind.logical_name()
        );
        let slot = match kind {
            CollectionKind::MarketStates => &mut self.market_states,
            CollectionKind::PerformanceMetrics => &mut self.performance_metrics,
            CollectionKind::Allocations => &mut self.allocations,
            CollectionKind::SystemLogs => &mut self.system_logs,
        };
        *slot = physical;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CollectionKind, &str)> {
        CollectionKind::ALL.into_iter().map(move |k| (k, self.resolve(k)))
    }
}

/// Parameters needed to address and authenticate to the remote document store.
#[derive(Debug, Clone)]
pub struct StoreConnectionConfig {
    pub project_id: String,
    pub credentials_path: PathBuf,
    pub collections: CollectionMap,
    /// Firestore REST root used with service account credentials
    pub endpoint: String,
    /// `host:port` of a Firestore emulator. When set, no credentials are used.
    pub emulator_host: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for StoreConnectionConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.into(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            collections: CollectionMap::default(),
            endpoint: DEFAULT_FIRESTORE_ENDPOINT.into(),
            emulator_host: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Ascending, positive analysis windows in seconds. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDurations(Box<[u64]>);

impl WindowDurations {
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl TryFrom<Vec<u64>> for WindowDurations {
    type Error = anyhow::Error;

    fn try_from(windows: Vec<u64>) -> Result<Self, Self::Error> {
        anyhow::ensure!(!windows.is_empty(), "At least one analysis window is required");
        anyhow::ensure!(
            windows.iter().all(|&w| w > 0),
            "Analysis windows must be positive: {windows:?}"
        );
        anyhow::ensure!(
            windows.windows(2).all(|pair| pair[0] < pair[1]),
            "Analysis windows must be strictly ascending: {windows:?}"
        );
        Ok(Self(windows.into_boxed_slice()))
    }
}

impl Default for WindowDurations {
    fn default() -> Self {
        Self(Box::new(DEFAULT_WINDOWS_SECS))
    }
}

/// Market signal synthesis parameters.
///
/// Fields are only reachable through [`SignalWindowConfig::new`], so every
/// instance satisfies its range constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalWindowConfig {
    windows: WindowDurations,
    volatility_lookback: u32,
    correlation_threshold: f64,
    min_liquidity_usd: f64,
    pca_components: u32,
    cluster_count: u32,
}

impl SignalWindowConfig {
    pub fn new(
        windows: WindowDurations,
        volatility_lookback: u32,
        correlation_threshold: f64,
        min_liquidity_usd: f64,
        pca_components: u32,
        cluster_count: u32,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(volatility_lookback > 0, "volatility_lookback must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&correlation_threshold),
            "correlation_threshold must be in [0, 1], got {correlation_threshold}"
        );
        anyhow::ensure!(
            min_liquidity_usd >= 0.0 && min_liquidity_usd.is_finite(),
            "min_liquidity_usd must be a non-negative amount, got {min_liquidity_usd}"
        );
        anyhow::ensure!(pca_components > 0, "pca_components must be positive");
        anyhow::ensure!(cluster_count >= 1, "cluster_count must be at least 1");
        Ok(Self {
            windows,
            volatility_lookback,
            correlation_threshold,
            min_liquidity_usd,
            pca_components,
            cluster_count,
        })
    }

    pub fn windows(&self) -> &WindowDurations {
        &self.windows
    }

    pub fn volatility_lookback(&self) -> u32 {
        self.volatility_lookback
    }

    pub fn correlation_threshold(&self) -> f64 {
        self.correlation_threshold
    }

    pub fn min_liquidity_usd(&self) -> f64 {
        self.min_liquidity_usd
    }

    pub fn pca_components(&self) -> u32 {
        self.pca_components
    }

    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }
}

impl Default for SignalWindowConfig {
    fn default() -> Self {
        Self {
            windows: WindowDurations::default(),
            volatility_lookback: 100,
            correlation_threshold: 0.7,
            min_liquidity_usd: 10_000.0,
            pca_components: 5,
            cluster_count: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub max_allocation_per_platform: f64, // Max fraction of capital on one venue (e.g. 0.25)
    pub max_drawdown: f64,                // Max peak-to-trough loss (e.g. 0.15)
    pub var_confidence: f64,              // VaR confidence level (e.g. 0.95)
    pub max_correlation_exposure: f64,    // Max exposure to correlated venues (e.g. 0.60)
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_allocation_per_platform: 0.25,
            max_drawdown: 0.15,
            var_confidence: 0.95,
            max_correlation_exposure: 0.6,
        }
    }
}

/// Process-wide configuration aggregate.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: String,
    pub debug_mode: bool,
    pub store: StoreConnectionConfig,
    pub signal: SignalWindowConfig,
    pub risk: RiskLimits,
    pub enabled_platforms: BTreeSet<Platform>,
    pub metrics_update_interval_secs: u64,
    pub reallocation_check_interval_secs: u64,
    pub log_level: Level,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl RuntimeSettings {
    /// Build settings from the process environment.
    ///
    /// Env vars:
    ///   ENVIRONMENT — deployment name (default: development; debug iff exactly "development")
    ///   FIREBASE_PROJECT_ID — store project (default: trading-ecosystem-optimizer)
    ///   FIREBASE_CREDENTIALS_PATH — service account JSON (default: ./config/firebase-creds.json)
    ///   FIRESTORE_ENDPOINT — REST root (default: https://firestore.googleapis.com)
    ///   FIRESTORE_EMULATOR_HOST — host:port of a local emulator (optional)
    ///   FIREBASE_CONNECT_TIMEOUT_SECS — connection attempt bound (default: 10)
    ///   ENABLED_PLATFORMS — comma-separated venues (default: binance,coinbase,kraken)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.into());
        let debug_mode = is_debug_environment(&environment);

        let mut store = StoreConnectionConfig::default();
        if let Some(project) = lookup("FIREBASE_PROJECT_ID") {
            store.project_id = project;
        }
        if let Some(path) = lookup("FIREBASE_CREDENTIALS_PATH") {
            store.credentials_path = PathBuf::from(path);
        }
        if let Some(endpoint) = lookup("FIRESTORE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                store.endpoint = endpoint.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(host) = lookup("FIRESTORE_EMULATOR_HOST") {
            if !host.trim().is_empty() {
                store.emulator_host = Some(host.trim().to_string());
            }
        }
        if let Some(secs) = lookup("FIREBASE_CONNECT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) if s > 0 => store.connect_timeout = Duration::from_secs(s),
                _ => warn!(
                    "Ignoring FIREBASE_CONNECT_TIMEOUT_SECS={secs}, using {DEFAULT_CONNECT_TIMEOUT_SECS}s"
                ),
            }
        }

        let enabled_platforms = match lookup("ENABLED_PLATFORMS") {
            Some(list) if !list.trim().is_empty() => parse_platforms(&list),
            _ => default_platforms(),
        };

        Self {
            environment: environment.clone(),
            debug_mode,
            store,
            signal: SignalWindowConfig::default(),
            risk: RiskLimits::default(),
            enabled_platforms,
            metrics_update_interval_secs: 60,
            reallocation_check_interval_secs: 300,
            log_level: log_level_for(&environment),
        }
    }

    /// Check the risk limits and platform count.
    ///
    /// Never fails outward: the outcome is the returned flag plus a log record.
    /// A missing credentials file is reported but does not fail validation.
    pub fn validate(&self) -> bool {
        match self.check_invariants() {
            Ok(()) => {
                self.report_credentials();
                true
            }
            Err(e) => {
                error!("Configuration validation failed: {e}");
                false
            }
        }
    }

    fn check_invariants(&self) -> anyhow::Result<()> {
        let risk = &self.risk;
        anyhow::ensure!(
            risk.max_allocation_per_platform > 0.0 && risk.max_allocation_per_platform <= 1.0,
            "max_allocation_per_platform must be in (0, 1], got {}",
            risk.max_allocation_per_platform
        );
        anyhow::ensure!(
            risk.max_drawdown > 0.0 && risk.max_drawdown < 1.0,
            "max_drawdown must be in (0, 1), got {}",
            risk.max_drawdown
        );
        anyhow::ensure!(
            risk.var_confidence >= 0.5 && risk.var_confidence < 1.0,
            "var_confidence must be in [0.5, 1), got {}",
            risk.var_confidence
        );
        anyhow::ensure!(
            self.enabled_platforms.len() >= 2,
            "Need at least 2 platforms for optimization, got {}",
            self.enabled_platforms.len()
        );
        Ok(())
    }

    fn report_credentials(&self) {
        let path = &self.store.credentials_path;
        if credentials_present(path) {
            info!("Firebase credentials found at {}", path.display());
        } else {
            warn!("Firebase credentials not found at {}", path.display());
        }
    }
}

/// Debug mode is on only for the exact name "development".
pub fn is_debug_environment(environment: &str) -> bool {
    environment == DEFAULT_ENVIRONMENT
}

pub fn log_level_for(environment: &str) -> Level {
    if is_debug_environment(environment) {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Deployment name from `ENVIRONMENT`, without building the full settings.
///
/// Lets the binary install logging before settings construction logs anything.
pub fn environment_from_env() -> String {
    std::env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.into())
}

fn credentials_present(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

fn default_platforms() -> BTreeSet<Platform> {
    [Platform::Binance, Platform::Coinbase, Platform::Kraken]
        .into_iter()
        .collect()
}

fn parse_platforms(list: &str) -> BTreeSet<Platform> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| match name.parse::<Platform>() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Skipping ENABLED_PLATFORMS entry: {e}");
                None
            }
        })
        .collect()
}

static SETTINGS: OnceLock<RuntimeSettings> = OnceLock::new();

/// The process-wide settings, read from the environment on first access.
///
/// Only the binary's composition root should call this; library code takes
/// `&RuntimeSettings` explicitly.
pub fn settings() -> &'static RuntimeSettings {
    SETTINGS.get_or_init(RuntimeSettings::from_env)
}
