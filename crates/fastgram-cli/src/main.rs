//! FastGram CLI - sign in to FastGram and call its API from a terminal.
//!
//! The session (access and refresh tokens) is kept between runs in the
//! storage backend chosen in the config, and expired access tokens are
//! refreshed transparently.

mod actions;
mod commands;
mod settings;

use std::io;
use std::path::Path;

use anyhow::Result;
use fastgram_core::{Config, SessionEvent, SessionManager};
use settings::Settings;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` wins over `-v`. When a log directory is available a daily
/// rolling file receives the same events as stderr; the returned guard must
/// live until exit so buffered lines get flushed.
fn init_tracing(verbosity: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fastgram.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let matches = commands::new().get_matches();
    let verbosity = matches.get_count("verbosity");

    let (stored, config_error) = match Config::load_file() {
        Ok(config) => (Some(config), None),
        Err(e) => (None, Some(e)),
    };
    let mut config = stored.clone().unwrap_or_default();

    let log_dir = config.data_dir().ok().map(|dir| dir.join("logs"));
    let _log_guard = init_tracing(verbosity, log_dir.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api_base_url = url.clone();
    }
    config.sanitize();
    let mut settings = Settings::new(stored);
    info!(version = env!("CARGO_PKG_VERSION"), "FastGram CLI starting");

    let session = SessionManager::init(&config)?;
    let mut events = session.subscribe();

    let result = actions::dispatch(&matches, &session, &config, &mut settings).await;

    // A refresh that failed mid-command ends the session; say so once
    let mut login_required = false;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::LoginRequired {
            login_required = true;
        }
    }
    if login_required {
        eprintln!("Your session has expired. Run `fastgram login` to sign in again.");
    }

    result
}
