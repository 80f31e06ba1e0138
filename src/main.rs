use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, Level};
use tracing_subscriber::EnvFilter;

use gator::commands::{self, Command};
use gator::config;
use gator::context::{AppContext, DB_URL_ENV};

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Command-line RSS aggregator")]
struct Args {
    /// Config file to use instead of ~/.gatorconfig.json
    #[arg(long, global = true, value_name = "FILE", env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .with_env_var("GATOR_LOG")
                .from_env_lossy(),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    set_up_logging();

    match start(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => config::default_path().context("Could not locate the config file")?,
    };
    let db_override = std::env::var(DB_URL_ENV).ok();

    let mut ctx = AppContext::open(config_path, db_override)
        .await
        .context("Failed to initialize gator")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = commands::run(&mut ctx, args.command, cancel, &mut std::io::stdout()).await;
    ctx.close().await;
    result.map_err(Into::into)
}
