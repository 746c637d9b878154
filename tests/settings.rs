//! Runtime settings construction and validation.

use ecosystem_optimizer::config::{CollectionKind, RuntimeSettings};
use ecosystem_optimizer::models::platform::Platform;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::Level;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings_from(vars: &[(&str, &str)]) -> RuntimeSettings {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RuntimeSettings::from_lookup(|key| env.get(key).cloned())
}

fn defaults() -> RuntimeSettings {
    settings_from(&[])
}

/// In-memory sink for a test-local tracing subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_defaults_without_environment() {
    let s = defaults();
    assert_eq!(s.environment, "development");
    assert!(s.debug_mode);
    assert_eq!(s.log_level, Level::DEBUG);
    assert_eq!(s.enabled_platforms.len(), 3);
    for p in [Platform::Binance, Platform::Coinbase, Platform::Kraken] {
        assert!(s.enabled_platforms.contains(&p));
    }
    assert_eq!(s.metrics_update_interval_secs, 60);
    assert_eq!(s.reallocation_check_interval_secs, 300);

    assert_eq!(s.store.project_id, "trading-ecosystem-optimizer");
    assert_eq!(s.store.credentials_path, PathBuf::from("./config/firebase-creds.json"));
    assert!(s.store.emulator_host.is_none());

    assert_eq!(s.signal.windows().as_slice(), &[300, 900, 3600, 7200, 21600]);
    assert_eq!(s.risk.max_allocation_per_platform, 0.25);
    assert_eq!(s.risk.max_drawdown, 0.15);
    assert_eq!(s.risk.var_confidence, 0.95);
    assert_eq!(s.risk.max_correlation_exposure, 0.6);
}

#[test]
fn test_non_development_environment_is_info() {
    let s = settings_from(&[("ENVIRONMENT", "production")]);
    assert_eq!(s.environment, "production");
    assert!(!s.debug_mode);
    assert_eq!(s.log_level, Level::INFO);
}

#[test]
fn test_debug_flag_is_case_sensitive() {
    let s = settings_from(&[("ENVIRONMENT", "Development")]);
    assert!(!s.debug_mode);
    assert_eq!(s.log_level, Level::INFO);
}

#[test]
fn test_store_overrides() {
    let s = settings_from(&[
        ("FIREBASE_PROJECT_ID", "optimizer-staging"),
        ("FIREBASE_CREDENTIALS_PATH", "/etc/optimizer/creds.json"),
        ("FIRESTORE_EMULATOR_HOST", "localhost:8080"),
        ("FIREBASE_CONNECT_TIMEOUT_SECS", "3"),
    ]);
    assert_eq!(s.store.project_id, "optimizer-staging");
    assert_eq!(s.store.credentials_path, PathBuf::from("/etc/optimizer/creds.json"));
    assert_eq!(s.store.emulator_host.as_deref(), Some("localhost:8080"));
    assert_eq!(s.store.connect_timeout.as_secs(), 3);
    assert_eq!(
        s.store.collections.resolve(CollectionKind::SystemLogs),
        "ecosystem_logs"
    );
}

#[test]
fn test_enabled_platforms_override() {
    let s = settings_from(&[("ENABLED_PLATFORMS", "deribit,ftx")]);
    assert_eq!(s.enabled_platforms.len(), 2);
    assert!(s.enabled_platforms.contains(&Platform::Deribit));
    assert!(s.enabled_platforms.contains(&Platform::Ftx));
    assert!(s.validate());

    let s = settings_from(&[("ENABLED_PLATFORMS", "kraken")]);
    assert!(!s.validate());
}

#[test]
fn test_rejected_overrides_are_logged_by_name() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let s = tracing::subscriber::with_default(subscriber, || {
        settings_from(&[
            ("ENABLED_PLATFORMS", "binance,bitmex"),
            ("FIREBASE_CONNECT_TIMEOUT_SECS", "soon"),
        ])
    });

    assert_eq!(s.enabled_platforms.len(), 1);
    let text = logs.text();
    assert!(text.contains("bitmex"), "skipped platform not named: {text}");
    assert!(text.contains("FIREBASE_CONNECT_TIMEOUT_SECS=soon"), "bad timeout not named: {text}");
}

#[test]
fn test_endpoint_override() {
    let s = defaults();
    assert_eq!(s.store.endpoint, "https://firestore.googleapis.com");

    let s = settings_from(&[("FIRESTORE_ENDPOINT", "https://firestore.example.internal/")]);
    assert_eq!(s.store.endpoint, "https://firestore.example.internal");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_defaults_validate() {
    assert!(defaults().validate());
}

#[test]
fn test_max_allocation_bounds() {
    let mut s = defaults();
    s.risk.max_allocation_per_platform = 0.0;
    assert!(!s.validate(), "zero allocation is outside (0, 1]");

    s.risk.max_allocation_per_platform = 1.5;
    assert!(!s.validate());

    s.risk.max_allocation_per_platform = 1.0;
    assert!(s.validate(), "upper bound is inclusive");
}

#[test]
fn test_max_drawdown_bounds() {
    let mut s = defaults();
    s.risk.max_drawdown = 1.0;
    assert!(!s.validate(), "upper bound is exclusive");

    s.risk.max_drawdown = 0.0;
    assert!(!s.validate(), "lower bound is exclusive");

    s.risk.max_drawdown = 0.99;
    assert!(s.validate());
}

#[test]
fn test_var_confidence_half_open() {
    let mut s = defaults();
    s.risk.var_confidence = 0.5;
    assert!(s.validate());

    s.risk.var_confidence = 0.49999;
    assert!(!s.validate());

    s.risk.var_confidence = 1.0;
    assert!(!s.validate());
}

#[test]
fn test_platform_count_boundary() {
    let mut s = defaults();
    s.enabled_platforms = [Platform::Binance].into_iter().collect();
    assert!(!s.validate());

    s.enabled_platforms = [Platform::Binance, Platform::Kraken].into_iter().collect();
    assert!(s.validate());

    s.enabled_platforms.clear();
    assert!(!s.validate());
}

#[test]
fn test_correlation_exposure_not_part_of_validation() {
    let mut s = defaults();
    s.risk.max_correlation_exposure = 5.0;
    assert!(s.validate());
}

#[test]
fn test_malformed_numbers_fail_without_panicking() {
    let mut s = defaults();
    s.risk.max_allocation_per_platform = f64::NAN;
    assert!(!s.validate());

    let mut s = defaults();
    s.risk.max_drawdown = f64::INFINITY;
    assert!(!s.validate());

    let mut s = defaults();
    s.risk.var_confidence = f64::NAN;
    assert!(!s.validate());
}

#[test]
fn test_missing_credentials_do_not_fail_validation() {
    let s = settings_from(&[("FIREBASE_CREDENTIALS_PATH", "/definitely/not/here.json")]);
    assert!(s.validate());
}

#[test]
fn test_present_credentials_validate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.json");
    std::fs::write(&path, "{}").unwrap();

    let s = settings_from(&[("FIREBASE_CREDENTIALS_PATH", path.to_str().unwrap())]);
    assert!(s.validate());
}

#[test]
fn test_validate_is_read_only() {
    let s = defaults();
    let before = format!("{s:?}");
    s.validate();
    assert_eq!(before, format!("{s:?}"));
}
