/*!
 * Logging Module
 * Centralized logging configuration and utilities
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::LogConfig;

/// Initialize the logging system.
///
/// The returned guards flush the background writers when dropped and must be
/// held for the lifetime of the process.
pub fn init(config: &LogConfig) -> Vec<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(&config.dir) {
        eprintln!("cannot create log directory {}: {}", config.dir.display(), e);
    }

    let (file_writer, file_guard) = non_blocking(rolling::daily(&config.dir, "app.log"));
    let (console_writer, console_guard) = non_blocking(io::stdout());
    let mut guards = vec![file_guard, console_guard];

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.production {
        let (error_writer, error_guard) = non_blocking(rolling::daily(&config.dir, "error.log"));
        guards.push(error_guard);

        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber.with(file_layer).with(console_layer).init();
    }

    tracing::info!(
        production = config.production,
        level = %config.level,
        dir = %config.dir.display(),
        "Logging initialized"
    );
    guards
}
