use std::time::Instant;

use airtable_client::AirtableApi;
use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    connection::ConnectionConfig,
    descriptor::{
        FieldDescriptor, FieldType, FormEntry, NodeDescriptor, base_id_field, connection_field, storage_fields,
        storage_section, table_name_field,
    },
    node::{NodeContext, NodeError, NodeOut, NodeType},
    nodes::{Outcome, finish},
    payload::ResultPayload,
    store::StorageOptions,
};

pub const NODE_TYPE: &str = "airtable-insert-record";
pub const DEFAULT_KEY: &str = "airtableInsertResult";

/// Creates one record from `recordFields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "airtable-insert-record", rename_all = "camelCase")]
pub struct InsertRecordNode {
    pub connection: ConnectionConfig,
    pub base_id: String,
    pub table_name: String,
    #[serde(default)]
    pub record_fields: Map<String, Value>,
    #[serde(flatten)]
    pub storage: StorageOptions,
}

impl InsertRecordNode {
    pub fn new(connection: ConnectionConfig, base_id: &str, table_name: &str, record_fields: Map<String, Value>) -> Self {
        Self {
            connection,
            base_id: base_id.to_string(),
            table_name: table_name.to_string(),
            record_fields,
            storage: StorageOptions::default(),
        }
    }

    pub async fn execute(&self, api: &dyn AirtableApi) -> Outcome {
        let payload = match api.create_record(&self.base_id, &self.table_name, &self.record_fields).await {
            Ok(record) => ResultPayload::Inserted { record },
            Err(err) => ResultPayload::write_failure(&err),
        };
        Outcome::linear(payload)
    }
}

#[async_trait]
impl NodeType for InsertRecordNode {
    fn type_name(&self) -> String {
        NODE_TYPE.to_string()
    }

    fn schema(&self) -> Schema {
        schema_for!(InsertRecordNode)
    }

    #[tracing::instrument(name = "airtable_insert_process", skip(self, context), fields(table = %self.table_name))]
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
        table_name_field("The name of the table to insert into"),
        FieldDescriptor::new("recordFields", FieldType::Json, "Record Fields")
            .description("JSON object with field names and values")
            .required()
            .default_value(Value::Object(Map::new())),
    ];
    fields.extend(storage_fields(DEFAULT_KEY));

    NodeDescriptor::new(NODE_TYPE, "Insert Record")
        .fields(fields)
        .sections(vec![storage_section()])
        .form(vec![
            FormEntry::field("connection"),
            FormEntry::field("baseId"),
            FormEntry::field("tableName"),
            FormEntry::field("recordFields"),
            FormEntry::section("storageOption"),
        ])
}
