use ecosystem_optimizer::config;
use ecosystem_optimizer::persistence::shared_gateway;
use ecosystem_optimizer::telemetry::logging;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before the settings are first read
    dotenv::dotenv().ok();

    // Tracing before settings, so override warnings raised while building them are printed
    logging::init(config::log_level_for(&config::environment_from_env()));
    let settings = config::settings();

    info!("================================================");
    info!("  Trading Ecosystem Optimizer v{}", env!("CARGO_PKG_VERSION"));
    info!("  environment={} debug={}", settings.environment, settings.debug_mode);
    info!("================================================");

    if !settings.validate() {
        error!("Refusing to start with invalid configuration");
        anyhow::bail!("configuration validation failed");
    }

    info!("--- Platforms ---");
    for platform in &settings.enabled_platforms {
        info!("  {platform}");
    }

    info!("--- Risk limits ---");
    info!("  Max per platform:  {}%", settings.risk.max_allocation_per_platform * 100.0);
    info!("  Max drawdown:      {}%", settings.risk.max_drawdown * 100.0);
    info!("  VaR confidence:    {}", settings.risk.var_confidence);
    info!("  Max corr exposure: {}", settings.risk.max_correlation_exposure);

    info!("--- Signal synthesis ---");
    info!("  Windows (s):       {:?}", settings.signal.windows().as_slice());
    info!("  Vol lookback:      {}", settings.signal.volatility_lookback());
    info!(
        "  Metrics every {}s, reallocation check every {}s",
        settings.metrics_update_interval_secs,
        settings.reallocation_check_interval_secs
    );

    info!("--- Persistence ---");
    for (kind, physical) in settings.store.collections.iter() {
        info!("  {:<20} -> {physical}", kind.logical_name());
    }

    let gateway = shared_gateway(&settings.store);
    if gateway.initialize().await {
        info!("Store connected (project {})", gateway.config().project_id);
        gateway
            .log_event(Level::INFO, "startup", "optimizer started")
            .await;
    } else {
        warn!("Store unavailable, continuing without persistence");
    }

    info!("Startup complete. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    gateway
        .log_event(Level::INFO, "shutdown", "optimizer stopped")
        .await;
    Ok(())
}
