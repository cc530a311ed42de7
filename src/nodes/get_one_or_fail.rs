use std::time::Instant;

use airtable_client::AirtableApi;
use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};

use crate::{
    connection::ConnectionConfig,
    descriptor::{
        ChildNodeDescriptor, FieldDescriptor, FormEntry, NodeDescriptor, Section, base_id_field,
        connection_field, projection_field, storage_fields, storage_section, table_name_field,
    },
    node::{Branch, NodeContext, NodeError, NodeOut, NodeType},
    nodes::{Outcome, finish},
    payload::ResultPayload,
    resolver::{Classification, Filter, QuerySpec, resolve},
    store::StorageOptions,
};

pub const NODE_TYPE: &str = "airtable-getoneorfail";
pub const DEFAULT_KEY: &str = "airtableRecord";
pub const BRANCHES: [Branch; 4] = [Branch::Success, Branch::NotFound, Branch::MultipleFound, Branch::Error];

/// Looks up exactly one record by `searchField = searchValue` and branches on
/// how many matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "airtable-getoneorfail", rename_all = "camelCase")]
pub struct GetOneOrFailNode {
    pub connection: ConnectionConfig,
    pub base_id: String,
    pub table_name: String,
    pub search_field: String,
    pub search_value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub storage: StorageOptions,
}

impl GetOneOrFailNode {
    pub fn new(
        connection: ConnectionConfig,
        base_id: &str,
        table_name: &str,
        search_field: &str,
        search_value: &str,
    ) -> Self {
        Self {
            connection,
            base_id: base_id.to_string(),
            table_name: table_name.to_string(),
            search_field: search_field.to_string(),
            search_value: search_value.to_string(),
            fields: vec![],
            storage: StorageOptions::default(),
        }
    }

    pub fn query(&self) -> QuerySpec {
        QuerySpec::new(&self.base_id, &self.table_name)
            .filter(Filter::equals(&self.search_field, &self.search_value))
            .fields(self.fields.clone())
    }

    pub async fn execute(&self, api: &dyn AirtableApi) -> Outcome {
        let (field, value) = (self.search_field.as_str(), self.search_value.as_str());
        match resolve(api, &self.query()).await {
            Classification::Single(record) => Outcome::branch(ResultPayload::Found { record }, Branch::Success),
            Classification::NotFound => Outcome::branch(ResultPayload::not_found(field, value), Branch::NotFound),
            Classification::Multiple { records, .. } => Outcome::branch(
                ResultPayload::multiple_found(records, field, value),
                Branch::MultipleFound,
            ),
            Classification::TransportError(err) => {
                Outcome::branch(ResultPayload::read_failure(&err), Branch::Error)
            }
        }
    }
}

#[async_trait]
impl NodeType for GetOneOrFailNode {
    fn type_name(&self) -> String {
        NODE_TYPE.to_string()
    }

    fn schema(&self) -> Schema {
        schema_for!(GetOneOrFailNode)
    }

    #[tracing::instrument(name = "airtable_getoneorfail_process", skip(self, context), fields(table = %self.table_name, field = %self.search_field))]
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
        table_name_field("The name of the table to search"),
        FieldDescriptor::text("searchField", "Search Field")
            .description("The field name to search by")
            .required(),
        FieldDescriptor::text("searchValue", "Search Value")
            .description("The value to search for")
            .required(),
        projection_field(),
    ];
    fields.extend(storage_fields(DEFAULT_KEY));

    NodeDescriptor::new(NODE_TYPE, "Get One or Fail")
        .fields(fields)
        .sections(vec![
            Section::collapsed("queryOptions", "Query Options", &["fields"]),
            storage_section(),
        ])
        .form(vec![
            FormEntry::field("connection"),
            FormEntry::field("baseId"),
            FormEntry::field("tableName"),
            FormEntry::field("searchField"),
            FormEntry::field("searchValue"),
            FormEntry::section("queryOptions"),
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
