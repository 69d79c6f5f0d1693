//! Warmtab daemon entry point.
//!
//! The browser launches this binary as the extension's native messaging
//! host. Stdout carries the messaging channel, so all logging goes to
//! stderr or a file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use warmtab_core::config::{Config, Directories};

/// Warmtab daemon - keeps pre-rendered chat tabs ready for the extension
#[derive(Parser, Debug)]
#[command(name = "warmtab-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to `config.json` in the platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of warm tabs to keep (overrides `pool.maxSize`)
    #[arg(long, value_name = "N")]
    pool_size: Option<usize>,

    /// Print the effective config as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Write the effective config to the config file and exit
    #[arg(long, conflicts_with = "print_config")]
    write_config: bool,

    /// Arguments the browser appends when launching the host (caller origin)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    launcher_args: Vec<String>,
}

/// Set up logging to stderr, plus a timestamped file in debug builds.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warmtab={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("warmtab-daemon-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        #[cfg(unix)]
        {
            let symlink_path = temp_dir.join("warmtab-daemon.log");
            let _ = std::fs::remove_file(&symlink_path);
            let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);
        }

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true),
            )
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .with(filter)
            .init();
    }
}

fn config_path(args: &Args) -> PathBuf {
    match &args.config {
        Some(path) => path.clone(),
        None => Directories::new().config_file,
    }
}

fn load_config(args: &Args, path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(size) = args.pool_size {
        config.pool.max_size = size;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let path = config_path(&args);
    let config = load_config(&args, &path)?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if args.write_config {
        config
            .save(&path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    setup_logging();

    info!("Starting warmtab daemon...");
    if let Some(origin) = args.launcher_args.first() {
        info!("Launched for {origin}");
    }

    warmtab_daemon::run(config).await?;

    info!("Warmtab daemon stopped");
    Ok(())
}
