use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Console logging, plus daily-rotated JSON files when `log_dir` is given.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = fmt::layer().with_target(false).compact();

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                RollingFileAppender::new(Rotation::DAILY, dir, "network-device-dashboard.log");
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .json(),
            )
        }
        None => None,
    };

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        // Someone (usually a test harness) already installed a subscriber.
        if e.to_string().contains("already been set") {
            return Ok(());
        }
        return Err(e.into());
    }

    if let Some(dir) = log_dir {
        tracing::info!("Logging to {}", dir.display());
    }
    Ok(())
}
