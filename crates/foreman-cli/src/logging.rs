use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::stderr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const DEFAULT_FILTER: &str = "foreman=info";

/// Installs the global subscriber. Logs go to stderr unless `log_file` is given,
/// keeping stdout free for command output.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a subscriber is already set
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true),
            )
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_writer(stderr).with_target(false))
            .try_init()?;
    }

    Ok(())
}
