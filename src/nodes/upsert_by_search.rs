use std::time::Instant;

use airtable_client::{AirtableApi, AirtableError, Record};
use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    connection::ConnectionConfig,
    descriptor::{
        ChildNodeDescriptor, FieldDescriptor, FieldType, FormEntry, NodeDescriptor, base_id_field,
        connection_field, storage_fields, storage_section, table_name_field,
    },
    node::{Branch, NodeContext, NodeError, NodeOut, NodeType},
    nodes::{Outcome, finish},
    payload::{ResultPayload, WriteFailure, multiple_found_message},
    resolver::{Classification, Filter, QuerySpec, resolve},
    store::StorageOptions,
};

pub const NODE_TYPE: &str = "airtable-upsert-by-search";
pub const DEFAULT_KEY: &str = "airtableUpsertResult";
pub const BRANCHES: [Branch; 3] = [Branch::Success, Branch::NotFound, Branch::Error];

/// Finds a record by `searchField = searchValue`, then updates it or, when
/// allowed, creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "airtable-upsert-by-search", rename_all = "camelCase")]
pub struct UpsertBySearchNode {
    pub connection: ConnectionConfig,
    pub base_id: String,
    pub table_name: String,
    pub search_field: String,
    pub search_value: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default = "default_create")]
    pub create_if_not_found: bool,
    #[serde(flatten)]
    pub storage: StorageOptions,
}

fn default_create() -> bool {
    true
}

impl UpsertBySearchNode {
    pub fn new(
        connection: ConnectionConfig,
        base_id: &str,
        table_name: &str,
        search_field: &str,
        search_value: &str,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            connection,
            base_id: base_id.to_string(),
            table_name: table_name.to_string(),
            search_field: search_field.to_string(),
            search_value: search_value.to_string(),
            fields,
            create_if_not_found: true,
            storage: StorageOptions::default(),
        }
    }

    pub fn query(&self) -> QuerySpec {
        QuerySpec::new(&self.base_id, &self.table_name)
            .filter(Filter::equals(&self.search_field, &self.search_value))
    }

    fn failure(&self, err: &AirtableError) -> Outcome {
        Outcome::branch(ResultPayload::write_failure(err), Branch::Error)
    }

    async fn create(&self, api: &dyn AirtableApi) -> Outcome {
        match api.create_record(&self.base_id, &self.table_name, &self.fields).await {
            Ok(record) => {
                info!(record = %record.id, "record created");
                Outcome::branch(ResultPayload::Created { record }, Branch::Success)
            }
            Err(err) => self.failure(&err),
        }
    }

    async fn update(&self, api: &dyn AirtableApi, existing: Record) -> Outcome {
        match api
            .update_record(&self.base_id, &self.table_name, &existing.id, &self.fields)
            .await
        {
            Ok(record) => {
                info!(record = %record.id, "record updated");
                Outcome::branch(ResultPayload::Updated { record }, Branch::Success)
            }
            Err(err) => self.failure(&err),
        }
    }

    pub async fn execute(&self, api: &dyn AirtableApi) -> Outcome {
        let (field, value) = (self.search_field.as_str(), self.search_value.as_str());
        match resolve(api, &self.query()).await {
            Classification::Single(existing) => self.update(api, existing).await,
            Classification::NotFound if self.create_if_not_found => self.create(api).await,
            Classification::NotFound => {
                debug!("no match and creation disabled");
                Outcome::branch(ResultPayload::search_missing(field, value), Branch::NotFound)
            }
            Classification::Multiple { count, .. } => {
                let failure = WriteFailure {
                    message: multiple_found_message(count, field, value),
                    ..Default::default()
                }
                .with_count(count)
                .with_search(field, value);
                Outcome::branch(ResultPayload::WriteFailure(failure), Branch::Error)
            }
            Classification::TransportError(err) => self.failure(&err),
        }
    }
}

#[async_trait]
impl NodeType for UpsertBySearchNode {
    fn type_name(&self) -> String {
        NODE_TYPE.to_string()
    }

    fn schema(&self) -> Schema {
        schema_for!(UpsertBySearchNode)
    }

    #[tracing::instrument(name = "airtable_upsert_by_search_process", skip(self, context), fields(table = %self.table_name, field = %self.search_field))]
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
        FieldDescriptor::text("searchField", "Search Field")
            .description("Field used to find an existing record")
            .required(),
        FieldDescriptor::text("searchValue", "Search Value")
            .description("Value the search field must equal")
            .required(),
        FieldDescriptor::new("fields", FieldType::Json, "Fields")
            .description("JSON object with the fields to create or update")
            .required()
            .default_value(Value::Object(Map::new())),
        FieldDescriptor::new("createIfNotFound", FieldType::Toggle, "Create If Not Found")
            .description("Create a new record when no match exists")
            .default_value(Value::Bool(true)),
    ];
    fields.extend(storage_fields(DEFAULT_KEY));

    NodeDescriptor::new(NODE_TYPE, "Upsert by Search")
        .fields(fields)
        .sections(vec![storage_section()])
        .form(vec![
            FormEntry::field("connection"),
            FormEntry::field("baseId"),
            FormEntry::field("tableName"),
            FormEntry::field("searchField"),
            FormEntry::field("searchValue"),
            FormEntry::field("fields"),
            FormEntry::field("createIfNotFound"),
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
