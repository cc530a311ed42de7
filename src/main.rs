mod cli;

use clap::Parser;
use tracing::{error, info};

use cli::{Cli, CliContext};
use greentic_airtable::{
    config::{ConfigManager, EnvConfigManager},
    logger::init_tracing,
    secret::{EnvSecretsManager, SecretsManager},
};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = init_tracing(&cli.root, &cli.log_level, cli.otel_endpoint.as_deref())?;
    info!(root = %cli.root.display(), "greentic-airtable starting");

    let config_manager = ConfigManager(EnvConfigManager::new(cli.root.join("config").join(".env")));
    let secrets_manager = SecretsManager(EnvSecretsManager::new(Some(cli.root.join("secrets"))));
    let context = CliContext::new(cli.root.clone(), config_manager, secrets_manager);

    let result = cli::execute(&context, cli.command).await;
    if let Err(err) = &result {
        error!("{:#}", err);
    }

    telemetry.shutdown();
    result
}
