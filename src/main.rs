//! pweave CLI entry point
//!
//! Parses arguments, sets up logging on stderr, runs the command, and turns
//! failures into a user-friendly message with an exit code of 1.
//!
//! Commands:
//! - `import` / `export` - Move prompt libraries in and out of the database
//! - `resolve` / `preview` / `bulk` - Produce final prompt text
//! - `attach` - Append a validated component to a compound prompt
//! - `deps` / `check` - Inspect the reference graph

use anyhow::Result;
use clap::Parser;
use promptweave::cli;
use promptweave::core::user_friendly_error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    init_logging(cli.build_config().log_level.as_deref());

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}

/// Log to stderr so resolved text on stdout stays pipeable.
///
/// An explicit level from `--verbose`/`--quiet` is added on top of `RUST_LOG`;
/// without one, `RUST_LOG` decides and falls back to `info`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => {
            let level = match level.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "error" => Level::ERROR,
                "warn" => Level::WARN,
                _ => Level::INFO,
            };
            EnvFilter::from_default_env().add_directive(level.into())
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
