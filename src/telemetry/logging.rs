use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Call before the settings are built so their construction warnings are kept.
/// `RUST_LOG` wins over `default_level`.
/// `LOG_FORMAT=json` switches to line-delimited JSON output.
pub fn init(default_level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    // try_init: tests and embedding binaries may already have a subscriber
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already installed: {e}");
    }
}
