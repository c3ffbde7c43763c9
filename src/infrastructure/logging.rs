use crate::domain::settings::LogSettings;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file appender's worker alive; drop it and buffered log lines
/// are lost.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

pub fn init(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    // RUST_LOG wins over the configured level
    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = if settings.file_logging_enabled {
        let appender =
            tracing_appender::rolling::daily(&settings.log_dir, &settings.file_name_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("logging initialized");

    Ok(LoggingGuard { _guard: guard })
}
