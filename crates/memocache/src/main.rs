//! memocache CLI
//!
//! Thin wrapper over `memocache-core`: replays cache scripts and prints the
//! effective configuration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use memocache_core::config::{Config, LogFormat};
use memocache_core::error::format_error_with_remediation;
use memocache_core::logging::{LogError, init_logging};
use memocache_core::lru_cache::LruCache;
use memocache_core::sweep::spawn_sweeper;
use tracing::{Instrument, debug};

mod replay;

#[derive(Parser, Debug)]
#[command(name = "memocache", version)]
#[command(about = "Bounded LRU cache with an optional idle-time sweep.", long_about = None)]
struct Cli {
    /// Config file (default: ./memocache.toml when present).
    #[arg(long, global = true, env = "MEMOCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format override (pretty or json).
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a put/get/sleep/sweep script against a fresh cache.
    Replay {
        /// Script file; `-` reads stdin.
        script: PathBuf,
        /// Override cache.capacity.
        #[arg(long)]
        capacity: Option<usize>,
        /// Override cache.idle_ttl_ms (0 disables the sweep).
        #[arg(long)]
        idle_ttl_ms: Option<u64>,
        /// Override cache.sweep_interval_ms.
        #[arg(long)]
        sweep_interval_ms: Option<u64>,
        /// Emit a JSON report instead of plain lines.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<memocache_core::Error>() {
                Some(core) => eprintln!("{}", format_error_with_remediation(core)),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())
        .map_err(memocache_core::Error::from)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    match init_logging(&config.logging) {
        Ok(()) | Err(LogError::AlreadyInitialized) => {}
        Err(err) => return Err(err.into()),
    }

    match cli.cmd {
        Command::Config => {
            print!("{}", config.to_toml_string().map_err(memocache_core::Error::from)?);
            Ok(())
        }
        Command::Replay {
            script,
            capacity,
            idle_ttl_ms,
            sweep_interval_ms,
            json,
        } => {
            if let Some(capacity) = capacity {
                config.cache.capacity = capacity;
            }
            if let Some(ttl) = idle_ttl_ms {
                config.cache.idle_ttl_ms = ttl;
            }
            if let Some(interval) = sweep_interval_ms {
                config.cache.sweep_interval_ms = interval;
            }
            replay_command(&config, &script, json).await
        }
    }
}

async fn replay_command(config: &Config, script: &Path, json: bool) -> Result<()> {
    let source = if script.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).map_err(memocache_core::Error::Io)?
    } else {
        std::fs::read_to_string(script).map_err(memocache_core::Error::Io)?
    };
    let steps = replay::parse_script(&source)?;

    let cache = Arc::new(LruCache::with_config(&config.cache)?);
    let sweeper = spawn_sweeper(&cache)?;

    let span = memocache_core::cache_span!(
        "replay",
        capacity = config.cache.capacity,
        idle_ttl_ms = config.cache.idle_ttl_ms,
        steps = steps.len()
    );
    let report = replay::run_steps(&cache, &steps).instrument(span).await;
    debug!(stats = ?report.stats, "replay finished");

    if let Some(handle) = sweeper {
        handle.signal_shutdown();
        handle.join().await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_plain());
    }
    Ok(())
}
