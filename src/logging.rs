use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Config load and initial-save failures
pub const ERROR_LOG: &str = "error.txt";

/// Faults caught at the outermost boundary, including panics
pub const UNHANDLED_LOG: &str = "unhandled.txt";

/// Worker resolution and spawn trace
pub const LAUNCHER_LOG: &str = "launcher.log";

/// Setup logging with a daily rotating file appender.
///
/// # Arguments
/// * `log_dir` - Directory for log files (the install's `Logs` directory)
/// * `log_prefix` - Prefix for log files (e.g., "kktix-launcher")
/// * `debug_mode` - If true, use debug level; otherwise use info level.
///   `RUST_LOG` overrides either.
/// * `console_output` - If true, also log to the console
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_dir: &Utf8Path,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Optional layers are no-ops when None
    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(guard)
}

/// Console-only logging, used when the log directory is not writable.
pub fn setup_console_logging(debug_mode: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized: console only, debug={}", debug_mode);
    Ok(())
}

fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug_mode { "debug" } else { "info" }))
}

/// Append one timestamped line to `<log_dir>/<file_name>`.
///
/// Best-effort: any failure is swallowed and `None` returned. Embedded
/// newlines are folded so each event stays on one line.
pub fn append_diagnostic(log_dir: &Utf8Path, file_name: &str, message: &str) -> Option<Utf8PathBuf> {
    let path = log_dir.join(file_name);
    let line = format!(
        "[{}] {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message.trim_end().replace("\r\n", " | ").replace('\n', " | ")
    );

    let written = fs::create_dir_all(log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?
            .write_all(line.as_bytes())
    });

    match written {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::debug!("Could not write diagnostic to {}: {}", path, e);
            None
        }
    }
}

/// Record panics in [`UNHANDLED_LOG`] and show a short notice instead of the raw fault.
pub fn install_panic_hook(log_dir: Utf8PathBuf) {
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Unhandled panic: {}", info);
        let logged = append_diagnostic(&log_dir, UNHANDLED_LOG, &format!("panic: {}", info));
        match logged {
            Some(path) => eprintln!("An unexpected error occurred. Details were written to {}", path),
            None => eprintln!("An unexpected error occurred."),
        }
    }));
}
