use std::{fs, path::Path};

use anyhow::{Context, Result};
use schemars::{Schema, schema_for};

use crate::flow::runner::NodeInvocation;
use crate::nodes::{
    AirtableNode, GetAllNode, GetOneOrFailNode, InsertRecordNode, UpsertBySearchNode, UpsertRecordNode, get_all,
    get_one_or_fail, insert_record, upsert_by_search, upsert_record,
};

/// File name and schema of every document the CLI reads.
pub fn schemas() -> Vec<(String, Schema)> {
    vec![
        ("invocation.schema.json".to_string(), schema_for!(NodeInvocation)),
        ("node.schema.json".to_string(), schema_for!(AirtableNode)),
        (node_file(get_all::NODE_TYPE), schema_for!(GetAllNode)),
        (node_file(get_one_or_fail::NODE_TYPE), schema_for!(GetOneOrFailNode)),
        (node_file(insert_record::NODE_TYPE), schema_for!(InsertRecordNode)),
        (node_file(upsert_record::NODE_TYPE), schema_for!(UpsertRecordNode)),
        (node_file(upsert_by_search::NODE_TYPE), schema_for!(UpsertBySearchNode)),
    ]
}

fn node_file(node_type: &str) -> String {
    format!("node-{}.schema.json", node_type)
}

/// Writes every schema into `out_dir` and returns the file names.
pub fn write_schema(out_dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(out_dir).with_context(|| format!("could not create {}", out_dir.display()))?;

    let mut written = vec![];
    for (name, schema) in schemas() {
        let json = serde_json::to_string_pretty(&schema)?;
        let path = out_dir.join(&name);
        fs::write(&path, json).with_context(|| format!("could not write {}", path.display()))?;
        written.push(name);
    }
    Ok(written)
}
