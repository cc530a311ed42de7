use std::time::Instant;

use airtable_client::{AirtableApi, Sort, SortDirection};
use async_trait::async_trait;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    connection::ConnectionConfig,
    descriptor::{
        FieldDescriptor, FieldType, FormEntry, NodeDescriptor, Section, SelectOption, base_id_field,
        connection_field, projection_field, storage_fields, storage_section, table_name_field,
    },
    node::{NodeContext, NodeError, NodeOut, NodeType},
    nodes::{Outcome, finish},
    payload::ResultPayload,
    resolver::{Filter, MAX_RECORDS_LIMIT, QuerySpec},
    store::StorageOptions,
};

pub const NODE_TYPE: &str = "airtable-getall";
pub const DEFAULT_KEY: &str = "airtableRecords";

/// Lists one page of records, optionally filtered, projected and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "airtable-getall", rename_all = "camelCase")]
pub struct GetAllNode {
    pub connection: ConnectionConfig,
    pub base_id: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter_by_formula: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default = "GetAllNode::default_max_records")]
    pub max_records: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sort_field: String,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(flatten)]
    pub storage: StorageOptions,
}

impl GetAllNode {
    fn default_max_records() -> u32 {
        MAX_RECORDS_LIMIT
    }

    pub fn new(connection: ConnectionConfig, base_id: &str, table_name: &str) -> Self {
        Self {
            connection,
            base_id: base_id.to_string(),
            table_name: table_name.to_string(),
            filter_by_formula: String::new(),
            fields: vec![],
            max_records: MAX_RECORDS_LIMIT,
            sort_field: String::new(),
            sort_direction: SortDirection::Asc,
            storage: StorageOptions::default(),
        }
    }

    pub fn query(&self) -> QuerySpec {
        let mut spec = QuerySpec::new(&self.base_id, &self.table_name)
            .fields(self.fields.clone())
            .max_records(self.max_records);

        if !self.filter_by_formula.trim().is_empty() {
            spec = spec.filter(Filter::Formula(self.filter_by_formula.clone()));
        }

        if !self.sort_field.trim().is_empty() {
            spec = spec.sort(Some(Sort {
                field: self.sort_field.clone(),
                direction: self.sort_direction,
            }));
        }

        spec
    }

    pub async fn execute(&self, api: &dyn AirtableApi) -> Outcome {
        let query = self.query().to_list_query();
        let payload = match api.list_records(&self.base_id, &self.table_name, &query).await {
            Ok(page) => ResultPayload::record_list(page),
            Err(err) => ResultPayload::read_failure(&err),
        };
        Outcome::linear(payload)
    }
}

#[async_trait]
impl NodeType for GetAllNode {
    fn type_name(&self) -> String {
        NODE_TYPE.to_string()
    }

    fn schema(&self) -> Schema {
        schema_for!(GetAllNode)
    }

    #[tracing::instrument(name = "airtable_getall_process", skip(self, context), fields(table = %self.table_name))]
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
        table_name_field("The name of the table to query"),
        FieldDescriptor::text("filterByFormula", "Filter Formula")
            .description("Airtable formula to filter records (optional)")
            .default_value(Value::from("")),
        projection_field(),
        FieldDescriptor::new("maxRecords", FieldType::Number, "Max Records")
            .description("Maximum number of records to return")
            .default_value(Value::from(MAX_RECORDS_LIMIT))
            .range(1, MAX_RECORDS_LIMIT),
        FieldDescriptor::text("sortField", "Sort Field")
            .description("Field name to sort by (optional)")
            .default_value(Value::from("")),
        FieldDescriptor::new("sortDirection", FieldType::Select, "Sort Direction")
            .default_value(Value::from("asc"))
            .options(vec![
                SelectOption::new("Ascending", "asc"),
                SelectOption::new("Descending", "desc"),
            ]),
    ];
    fields.extend(storage_fields(DEFAULT_KEY));

    NodeDescriptor::new(NODE_TYPE, "Get All Records")
        .fields(fields)
        .sections(vec![
            Section::collapsed(
                "queryOptions",
                "Query Options",
                &["filterByFormula", "fields", "maxRecords", "sortField", "sortDirection"],
            ),
            storage_section(),
        ])
        .form(vec![
            FormEntry::field("connection"),
            FormEntry::field("baseId"),
            FormEntry::field("tableName"),
            FormEntry::section("queryOptions"),
            FormEntry::section("storageOption"),
        ])
}
