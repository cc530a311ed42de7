use clap::{Args, Subcommand};

use super::CliContext;

#[derive(Args, Debug)]
pub struct SecretArgs {
    #[command(subcommand)]
    pub command: SecretCommands,
}

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    Add { key: String, secret: String },
    Update { key: String, secret: String },
    Delete { key: String },
    /// Print the stored secret names, never their values
    List,
}

pub async fn execute(args: SecretArgs, context: &CliContext) -> anyhow::Result<()> {
    let secrets = &context.secrets_manager;
    match args.command {
        SecretCommands::Add { key, secret } => match secrets.add_secret(&key, &secret).await {
            Ok(_) => println!("✅ Secret added."),
            Err(e) => eprintln!("❌ Secret could not be added: {}", e),
        },
        SecretCommands::Update { key, secret } => match secrets.update_secret(&key, &secret).await {
            Ok(_) => println!("✅ Secret updated."),
            Err(e) => eprintln!("❌ Secret could not be updated: {}", e),
        },
        SecretCommands::Delete { key } => match secrets.delete_secret(&key).await {
            Ok(_) => println!("✅ Secret deleted."),
            Err(e) => eprintln!("❌ Secret could not be deleted: {}", e),
        },
        SecretCommands::List => {
            let mut keys = secrets.keys();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
    }
    Ok(())
}
