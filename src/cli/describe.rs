use anyhow::bail;
use clap::Args;

use super::CliContext;
use greentic_airtable::extension::Extension;

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Only print this node type and its children
    #[arg(long)]
    pub node: Option<String>,
}

pub async fn execute(args: DescribeArgs, _context: &CliContext) -> anyhow::Result<()> {
    let extension = Extension::global();
    let json = match args.node {
        None => serde_json::to_string_pretty(extension)?,
        Some(node_type) => {
            let Some(node) = extension.node(&node_type) else {
                bail!("unknown node type `{}`", node_type);
            };
            serde_json::to_string_pretty(&serde_json::json!({
                "node": node,
                "childNodes": extension.children_of(&node_type),
            }))?
        }
    };
    println!("{}", json);
    Ok(())
}
