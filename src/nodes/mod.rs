use std::time::Instant;

use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    descriptor::NodeDescriptor,
    logger::{NodeMetrics, REPORT_TARGET},
    node::{Branch, NodeContext, NodeError, NodeOut, NodeType},
    payload::ResultPayload,
    store::StoreTarget,
};

pub mod get_all;
pub mod get_one_or_fail;
pub mod insert_record;
pub mod upsert_by_search;
pub mod upsert_record;

#[cfg(test)]
pub(crate) mod testing;

pub use get_all::GetAllNode;
pub use get_one_or_fail::GetOneOrFailNode;
pub use insert_record::InsertRecordNode;
pub use upsert_by_search::UpsertBySearchNode;
pub use upsert_record::UpsertRecordNode;

/// The payload a node produced and, for branching nodes, the branch it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub payload: ResultPayload,
    pub branch: Option<Branch>,
}

impl Outcome {
    /// Result of a node without children.
    pub fn linear(payload: ResultPayload) -> Self {
        Self { payload, branch: None }
    }

    pub fn branch(payload: ResultPayload, branch: Branch) -> Self {
        Self {
            payload,
            branch: Some(branch),
        }
    }

    pub fn label(&self) -> &'static str {
        match self.branch {
            Some(branch) => branch.as_str(),
            None if self.payload.is_failure() => "error",
            None => "success",
        }
    }
}

/// Stores the outcome, picks the next node and reports it.
pub(crate) fn finish(
    context: &mut NodeContext,
    node_type: &str,
    target: &StoreTarget,
    outcome: Outcome,
    started: Instant,
) -> NodeOut {
    let failed = outcome.payload.is_failure();
    let label = outcome.label();
    let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

    if failed {
        warn!(node = node_type, outcome = label, "Airtable call failed");
    }
    NodeMetrics::global().record(node_type, label, failed, latency_ms);
    info!(
        target: REPORT_TARGET,
        node = node_type,
        session = context.session_id(),
        outcome = label,
        latency_ms,
        "node finished"
    );

    context.complete(target, &outcome.payload, outcome.branch)
}

/// Every Airtable node, tagged by its `type` in flow files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum AirtableNode {
    #[serde(rename = "airtable-getall")]
    GetAll(GetAllNode),
    #[serde(rename = "airtable-getoneorfail")]
    GetOneOrFail(GetOneOrFailNode),
    #[serde(rename = "airtable-insert-record")]
    InsertRecord(InsertRecordNode),
    #[serde(rename = "airtable-upsert-record")]
    UpsertRecord(UpsertRecordNode),
    #[serde(rename = "airtable-upsert-by-search")]
    UpsertBySearch(UpsertBySearchNode),
}

impl AirtableNode {
    pub fn descriptor(&self) -> NodeDescriptor {
        match self {
            AirtableNode::GetAll(_) => get_all::descriptor(),
            AirtableNode::GetOneOrFail(_) => get_one_or_fail::descriptor(),
            AirtableNode::InsertRecord(_) => insert_record::descriptor(),
            AirtableNode::UpsertRecord(_) => upsert_record::descriptor(),
            AirtableNode::UpsertBySearch(_) => upsert_by_search::descriptor(),
        }
    }

    fn inner(&self) -> &dyn NodeType {
        match self {
            AirtableNode::GetAll(inner) => inner,
            AirtableNode::GetOneOrFail(inner) => inner,
            AirtableNode::InsertRecord(inner) => inner,
            AirtableNode::UpsertRecord(inner) => inner,
            AirtableNode::UpsertBySearch(inner) => inner,
        }
    }
}

#[async_trait]
impl NodeType for AirtableNode {
    fn type_name(&self) -> String {
        self.inner().type_name()
    }

    async fn process(&self, context: &mut NodeContext) -> Result<NodeOut, NodeError> {
        self.inner().process(context).await
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }

    fn schema(&self) -> Schema {
        schema_for!(AirtableNode)
    }
}

/// Every node descriptor, in registration order.
pub fn descriptors() -> Vec<NodeDescriptor> {
    vec![
        get_all::descriptor(),
        get_one_or_fail::descriptor(),
        insert_record::descriptor(),
        upsert_record::descriptor(),
        upsert_by_search::descriptor(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nodes_parse_by_type_tag() {
        let node: AirtableNode = serde_json::from_value(json!({
            "type": "airtable-getoneorfail",
            "connection": {"accessToken": "pat"},
            "baseId": "appXXX",
            "tableName": "Customers",
            "searchField": "Email",
            "searchValue": "a@b.com",
            "storeLocation": "input",
            "inputKey": "customer"
        }))
        .unwrap();

        assert_eq!(node.type_name(), "airtable-getoneorfail");
        match &node {
            AirtableNode::GetOneOrFail(inner) => {
                assert_eq!(inner.search_field, "Email");
                assert_eq!(inner.storage.target("airtableRecord").key, "customer");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn yaml_node_file_parses() {
        let yaml = r#"
type: airtable-upsert-by-search
connection:
  secret: AIRTABLE_TOKEN
baseId: appXXX
tableName: Customers
searchField: Email
searchValue: a@b.com
fields:
  Email: a@b.com
"#;
        let node: AirtableNode = serde_yaml_bw::from_str(yaml).unwrap();
        match node {
            AirtableNode::UpsertBySearch(inner) => assert!(inner.create_if_not_found),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let parsed = serde_json::from_value::<AirtableNode>(json!({"type": "airtable-delete"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn descriptor_types_match_node_tags() {
        for descriptor in descriptors() {
            descriptor.validate().unwrap();
            assert!(descriptor.node_type.starts_with("airtable-"));
        }
        let types: Vec<String> = descriptors().into_iter().map(|d| d.node_type).collect();
        assert_eq!(
            types,
            vec![
                "airtable-getall",
                "airtable-getoneorfail",
                "airtable-insert-record",
                "airtable-upsert-record",
                "airtable-upsert-by-search"
            ]
        );
    }

    #[test]
    fn outcome_labels() {
        let failure = ResultPayload::read_failure(&airtable_client::AirtableError::Transport("x".into()));
        assert_eq!(Outcome::linear(failure).label(), "error");
        assert_eq!(
            Outcome::branch(ResultPayload::not_found("a", "b"), Branch::NotFound).label(),
            "notFound"
        );
    }
}
