use anyhow::{Context, Result};
use clap::Parser;
use dynamics_extractor::api::ReqwestTransport;
use dynamics_extractor::cli::Cli;
use dynamics_extractor::commands;
use dynamics_extractor::config::{Action, Config};
use dynamics_extractor::error::{EXIT_UNEXPECTED_ERROR, ExtractorError, exit_code_for};
use log::{LevelFilter, debug, error, info};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_loaded = load_env_file(cli.env_file.as_deref());
    let config = Config::load(&cli.config_path());
    let debug = cli.debug || config.as_ref().is_ok_and(Config::debug);

    if let Err(e) = init_logging(debug, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(EXIT_UNEXPECTED_ERROR as u8);
    }

    let result = match (env_loaded, config) {
        (Err(e), _) | (_, Err(e)) => Err(e.into()),
        (Ok(()), Ok(config)) => run(&cli, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let action = match cli.command {
        Some(command) => Action::from(command),
        None => config.action()?,
    };
    info!("Starting dynamics-extractor ({:?})", action);
    debug!("Data directory: {}", cli.data_dir.display());

    let transport = Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);
    commands::dispatch(action, config, &cli.data_dir, transport).await
}

/// Load an explicit `.env` file, or `./.env` when present
fn load_env_file(path: Option<&Path>) -> Result<(), ExtractorError> {
    match path {
        Some(path) => dotenvy::from_path(path).map(|_| ()).map_err(|e| {
            ExtractorError::config(format!("Failed to load .env file '{}': {}", path.display(), e))
        }),
        None => {
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    if let Some(path) = log_file {
        // Truncate on each run
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Logger already initialized")?;
    Ok(())
}
