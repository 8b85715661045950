//! Subscriber setup for hosts that run the scraper as a library.
//!
//! Console output always goes to stdout. With a log directory, events are
//! also written to `scraper.log` there through a non-blocking appender;
//! keep the returned guard alive for as long as logs should be flushed.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::Result;

pub const LOG_FILE_NAME: &str = "scraper.log";

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Installing twice is not an error; the first
/// subscriber stays in place.
pub fn init_logging(default_filter: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_filter)
            .add_directive(quiet("hyper_util=warn"))
            .add_directive(quiet("rustls=warn"))
            .add_directive(quiet("html5ever=warn"))
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = non_blocking(rolling::never(dir, LOG_FILE_NAME));
            let layer = fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::Layer::new().with_writer(std::io::stdout).with_target(false);

    if Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }

    Ok(guard)
}

fn quiet(directive: &str) -> tracing_subscriber::filter::Directive {
    directive
        .parse()
        .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::WARN.into())
}
