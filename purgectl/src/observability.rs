use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::{LoggingConfig, MetricsConfig};

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd recorder: {0}")]
    Build(String),
    #[error("could not install metrics recorder: {0}")]
    Install(String),
}

/// Installs the global tracing subscriber. Log output goes to stderr so it
/// never mixes with command output. When a Sentry DSN is configured, errors
/// are also reported to Sentry as long as the returned guard is alive.
pub fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match &config.sentry_dsn {
        Some(dsn) => {
            let guard = sentry::init((
                dsn.as_str(),
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ));
            registry.with(sentry::integrations::tracing::layer()).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(config.prefix.as_str()))
        .map_err(|e| MetricsError::Build(e.to_string()))?;

    metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))
}
