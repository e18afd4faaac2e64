use crate::config::Action;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "dynamics-extractor")]
#[command(about = "Extract Microsoft Dynamics 365 entities into CSV tables")]
#[command(version)]
pub struct Cli {
    /// Data directory holding config.json and receiving out/tables
    #[arg(long, env = "KBC_DATADIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// Configuration file (defaults to <data-dir>/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// .env file with DYNAMICS_* credentials
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Download the configured endpoint into a CSV table (default)
    Run,
    /// Print available endpoints as JSON
    ListEndpoints,
    /// Print columns of the configured endpoint as JSON
    ListColumns,
    /// Check that the credentials can reach the organization
    TestConnection,
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Run => Action::Run,
            Commands::ListEndpoints => Action::ListEndpoints,
            Commands::ListColumns => Action::ListColumns,
            Commands::TestConnection => Action::TestConnection,
        }
    }
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => path.clone(),
            None => crate::config::Config::default_path(Path::new(&self.data_dir)),
        }
    }
}
