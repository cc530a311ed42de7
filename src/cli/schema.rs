use std::path::PathBuf;

use clap::Args;

use super::CliContext;
use greentic_airtable::schema::write_schema;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Output directory, `<root>/schemas` by default
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn execute(args: SchemaArgs, context: &CliContext) -> anyhow::Result<()> {
    let out_dir = args.out.unwrap_or_else(|| context.root.join("schemas"));
    let written = write_schema(&out_dir)?;
    println!("{} schemas written to {}", written.len(), out_dir.display());
    Ok(())
}
