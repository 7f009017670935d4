mod app;
mod cli;
mod commands;
mod error;
mod output;
mod server;
mod shutdown;
mod store;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kasa_config::Config;

use crate::app::AppContext;
use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;
use crate::store::SqliteStore;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_format);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "kasa", &mut std::io::stdout());
            Ok(())
        }

        // Everything else works on the device store
        cmd => {
            let cfg = load_config(&cli.global)?;
            let ctx = Arc::new(build_context(&cfg)?);

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cfg, ctx, &cli.global).await
        }
    }
}

/// Config file (from `--config` or the platform path) + env, with CLI overrides.
fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match &global.config {
        Some(path) => kasa_config::load_config_from(path)?,
        None => kasa_config::load_config()?,
    };
    if let Some(ms) = global.connect_timeout {
        if ms == 0 {
            return Err(CliError::Validation {
                field: "connect-timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }
        cfg.discovery.connect_timeout_ms = ms;
    }
    if let Some(path) = &global.store {
        cfg.store.path = Some(path.clone());
    }
    Ok(cfg)
}

fn build_context(cfg: &Config) -> Result<AppContext, CliError> {
    let store = SqliteStore::open(cfg.store_path())?;
    tracing::debug!(
        store = %store.path().display(),
        connect_timeout = ?Duration::from_millis(cfg.discovery.connect_timeout_ms),
        "context ready"
    );
    Ok(AppContext::new(cfg.registry_config(), Arc::new(store)))
}
