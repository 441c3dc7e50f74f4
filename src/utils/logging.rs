use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks between `debug` and
/// `warn` for this crate. With `log_file`, events are appended there without
/// ANSI colours instead of going to stderr.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let registry = tracing_subscriber::registry().with(filter);

    // A second init (tests, embedding) is not an error.
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(Arc::new(file)),
                )
                .try_init();
        }
        None => {
            let _ = registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init();
        }
    }

    Ok(())
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "station_store=debug,info"
    } else {
        "station_store=warn"
    }
}
