use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod describe;
pub mod run;
pub mod schema;
pub mod secrets;

use describe::DescribeArgs;
use run::RunArgs;
use schema::SchemaArgs;
use secrets::SecretArgs;

use greentic_airtable::{config::ConfigManager, secret::SecretsManager};

#[derive(Parser, Debug)]
#[command(
    name = "greentic-airtable",
    about = "Airtable nodes for Greentic flows",
    version = "0.1.0"
)]
pub struct Cli {
    /// Directory holding config, secrets, logs and schemas
    #[arg(long, global = true, env = "GREENTIC_ROOT", default_value = "./greentic")]
    pub root: PathBuf,

    /// Log level filter (e.g. error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry endpoint (e.g. http://localhost:4317)
    #[arg(long, global = true)]
    pub otel_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one node invocation file
    Run(RunArgs),

    /// Print node descriptors
    Describe(DescribeArgs),

    /// Emit JSON‐Schema for node files
    Schema(SchemaArgs),

    /// Handle secrets
    Secrets(SecretArgs),
}

#[derive(Clone, Debug)]
pub struct CliContext {
    pub root: PathBuf,
    pub config_manager: ConfigManager,
    pub secrets_manager: SecretsManager,
}

impl CliContext {
    pub fn new(root: PathBuf, config_manager: ConfigManager, secrets_manager: SecretsManager) -> Self {
        Self {
            root,
            config_manager,
            secrets_manager,
        }
    }
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run::execute(args, context).await,
        Commands::Describe(args) => describe::execute(args, context).await,
        Commands::Schema(args) => schema::execute(args, context).await,
        Commands::Secrets(args) => secrets::execute(args, context).await,
    }
}
