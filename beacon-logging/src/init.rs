use anyhow::{Context, Result};
use beacon_config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Build the env filter for a configuration: the configured level plus any
/// extra directives, with `RUST_LOG` as the fallback when they do not parse.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = config.level.to_string();
    for directive in &config.directives {
        directives.push(',');
        directives.push_str(directive.trim());
    }

    EnvFilter::try_new(&directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .with_context(|| format!("Invalid log filter: {}", directives))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;

    let format_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_line_number(config.include_location)
            .boxed(),
    };

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
