use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Args;
use tracing::info;

use super::CliContext;
use greentic_airtable::connection::HttpConnector;
use greentic_airtable::flow::runner::{NodeInvocation, Runner};
use greentic_airtable::flow::session::InMemorySessionStore;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Node invocation file (.json, .yaml or .yml)
    pub file: PathBuf,

    /// Session id, overrides the one in the file
    #[arg(long)]
    pub session: Option<String>,
}

pub async fn execute(args: RunArgs, context: &CliContext) -> anyhow::Result<()> {
    let mut invocation = NodeInvocation::load(&args.file)?;
    if args.session.is_some() {
        invocation.session_id = args.session;
    }

    let connector = HttpConnector::from_config(&context.config_manager).await;
    let sessions = InMemorySessionStore::new(context.config_manager.session_ttl().await);
    info!(file = %args.file.display(), api_url = connector.api_url(), "running node invocation");

    let runner = Runner::new(sessions, context.secrets_manager.clone(), Arc::new(connector));
    let report = runner
        .run(&invocation)
        .await
        .with_context(|| format!("{} could not run", args.file.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
