//! Tracing setup.
//!
//! Every command logs to stdout and to `<root>/logs/<component>_<YYYYMMDD>.log`.
//! [`init`] installs the subscriber once at startup and hands back a
//! [`LogHandle`]; [`LogHandle::shutdown`] closes the run.

use crate::error::Result;
use crate::utils::date_stamp;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Subscriber, info};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// Lifecycle handle for the installed subscriber.
pub struct LogHandle {
    component: String,
    path: PathBuf,
    file: Arc<File>,
    started: Instant,
}

impl LogHandle {
    /// Path of the log file for this run.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log the run duration and flush the log file.
    pub fn shutdown(self) {
        let elapsed = self.started.elapsed();
        info!(
            component = %self.component,
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        );
        let _ = (&*self.file).flush();
    }
}

/// Path of the log file for `component` today.
pub fn log_file_path(logs_dir: &Path, component: &str) -> PathBuf {
    logs_dir.join(format!("{}_{}.log", component, date_stamp()))
}

/// Plain-text layer appending to `file`. `&File` is `Write`, so the shared
/// handle needs no lock of its own.
fn file_layer<S>(file: Arc<File>) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tfmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_timer(tfmt::time::UtcTime::rfc_3339())
        .with_writer(file)
}

/// Install the global subscriber: stdout plus an appending per-day log file.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(logs_dir: &Path, component: &str) -> Result<LogHandle> {
    fs::create_dir_all(logs_dir)?;
    let path = log_file_path(logs_dir, component);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let file = Arc::new(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tfmt::time::UtcTime::rfc_3339());

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer(file.clone()))
        .init();

    info!(path = %path.display(), component, "Logging initialized");
    Ok(LogHandle {
        component: component.to_string(),
        path,
        file,
        started: Instant::now(),
    })
}
