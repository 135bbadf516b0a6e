// Logging setup
//
// Filter comes from RUST_LOG, else LOG_LEVEL applied to the orderflow
// crates, else "orderflow=info".

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "orderflow=info";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = std::env::var("LOG_LEVEL")
            .map(|level| format!("orderflow={level}"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
