use std::time::Instant;

use airtable_client::AirtableApi;
use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    connection::ConnectionConfig,
    descriptor::{
        ChildNodeDescriptor, FieldDescriptor, FieldType, FormEntry, NodeDescriptor, base_id_field,
        connection_field, storage_fields, storage_section, table_name_field,
    },
    node::{Branch, NodeContext, NodeError, NodeOut, NodeType},
    nodes::{Outcome, finish},
    payload::ResultPayload,
    store::StorageOptions,
};

pub const NODE_TYPE: &str = "airtable-upsert-record";
pub const DEFAULT_KEY: &str = "airtableUpsertResult";
pub const BRANCHES: [Branch; 3] = [Branch::Success, Branch::NotFound, Branch::Error];

/// Updates a record addressed by id. A 404 is its own branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "airtable-upsert-record", rename_all = "camelCase")]
pub struct UpsertRecordNode {
    pub connection: ConnectionConfig,
    pub base_id: String,
    pub table_name: String,
    pub record_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub storage: StorageOptions,
}

impl UpsertRecordNode {
    pub fn new(
        connection: ConnectionConfig,
        base_id: &str,
        table_name: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            connection,
            base_id: base_id.to_string(),
            table_name: table_name.to_string(),
            record_id: record_id.to_string(),
            fields,
            storage: StorageOptions::default(),
        }
    }

    pub async fn execute(&self, api: &dyn AirtableApi) -> Outcome {
        match api
            .update_record(&self.base_id, &self.table_name, &self.record_id, &self.fields)
            .await
        {
            Ok(record) => Outcome::branch(ResultPayload::Saved { record }, Branch::Success),
            Err(err) if err.is_not_found() => {
                debug!(record_id = %self.record_id, "record does not exist");
                Outcome::branch(ResultPayload::record_missing(&self.record_id), Branch::NotFound)
            }
            Err(err) => Outcome::branch(ResultPayload::write_failure(&err), Branch::Error),
        }
    }
}

#[async_trait]
impl NodeType for UpsertRecordNode {
    fn type_name(&self) -> String {
        NODE_TYPE.to_string()
    }

    fn schema(&self) -> Schema {
        schema_for!(UpsertRecordNode)
    }

    #[tracing::instrument(name = "airtable_upsert_record_process", skip(self, context), fields(table = %self.table_name, record = %self.record_id))]
    async fn process(&self, context: &mut NodeContext) -> Result<NodeOut, NodeError> {
        let started = Instant::now();
        let api = context.airtable(&self.connection).await?;
        let outcome = self.execute(api.as_ref()).await;
        Ok(finish(context, NODE_TYPE, &self.storage.target(DEFAULT_KEY), outcome, started))
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }
}

pub fn descriptor() -> NodeDescriptor {
    let mut fields = vec![
        connection_field(),
        base_id_field(),
        table_name_field("The name of the table"),
        FieldDescriptor::text("recordId", "Record ID")
            .description("The ID of the record to update")
            .required(),
        FieldDescriptor::new("fields", FieldType::Json, "Fields")
            .description("JSON object with the fields to set")
            .required()
            .default_value(Value::Object(Map::new())),
    ];
    fields.extend(storage_fields(DEFAULT_KEY));

    NodeDescriptor::new(NODE_TYPE, "Upsert Record")
        .fields(fields)
        .sections(vec![storage_section()])
        .form(vec![
            FormEntry::field("connection"),
            FormEntry::field("baseId"),
            FormEntry::field("tableName"),
            FormEntry::field("recordId"),
            FormEntry::field("fields"),
            FormEntry::section("storageOption"),
        ])
        .children(&BRANCHES)
}

pub fn child_descriptors() -> Vec<ChildNodeDescriptor> {
    BRANCHES
        .iter()
        .map(|branch| ChildNodeDescriptor::new(*branch, NODE_TYPE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChildConfig, Routing};
    use crate::nodes::testing::{ScriptedApi, context_with, record};
    use airtable_client::AirtableError;
    use serde_json::json;

    fn node() -> UpsertRecordNode {
        UpsertRecordNode::new(
            ConnectionConfig::token("pat"),
            "appXXX",
            "Customers",
            "rec123",
            json!({"Status": "Active"}).as_object().cloned().unwrap(),
        )
    }

    fn children() -> Vec<ChildConfig> {
        BRANCHES
            .iter()
            .map(|b| ChildConfig::new(format!("child-{}", b), *b))
            .collect()
    }

    #[tokio::test]
    async fn update_routes_to_success() {
        let api = ScriptedApi::new()
            .update(Ok(record("rec123", json!({"Status": "Active"}))))
            .shared();
        let mut ctx = context_with(api.clone(), &children());

        let out = node().process(&mut ctx).await.unwrap();

        assert_eq!(out.routing(), &Routing::ToNode("child-success".into()));
        assert_eq!(out.payload()["success"], json!(true));
        assert_eq!(out.payload()["record"]["id"], json!("rec123"));
        assert_eq!(api.update_calls()[0].2, "rec123");
        assert!(api.create_calls().is_empty());
    }

    #[tokio::test]
    async fn missing_record_routes_to_not_found() {
        let api = ScriptedApi::new()
            .update(Err(AirtableError::from_response(404, r#"{"error":"NOT_FOUND"}"#)))
            .shared();
        let mut ctx = context_with(api, &children());

        let out = node().process(&mut ctx).await.unwrap();

        assert_eq!(out.branch(), Some(Branch::NotFound));
        assert_eq!(ctx.next_node(), Some("child-notFound"));
        assert_eq!(
            ctx.get_context(DEFAULT_KEY).unwrap(),
            json!({
                "success": false,
                "notFound": true,
                "message": "Record not found: rec123",
                "recordId": "rec123"
            })
        );
    }

    #[tokio::test]
    async fn other_failures_route_to_error() {
        let api = ScriptedApi::new()
            .update(Err(AirtableError::from_response(500, "")))
            .shared();
        let mut ctx = context_with(api, &children());

        let out = node().process(&mut ctx).await.unwrap();

        assert_eq!(out.branch(), Some(Branch::Error));
        assert_eq!(
            out.payload(),
            &json!({
                "success": false,
                "error": true,
                "message": "Request failed with status code 500",
                "status": 500
            })
        );
    }

    #[test]
    fn descriptor_declares_three_children() {
        let descriptor = descriptor();
        descriptor.validate().unwrap();
        assert_eq!(descriptor.child_branches(), &BRANCHES);
        assert!(!descriptor.child_branches().contains(&Branch::MultipleFound));
    }
}
