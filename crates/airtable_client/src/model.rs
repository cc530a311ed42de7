use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One Airtable row as returned by the REST API.
///
/// `created_time` is kept as the exact string Airtable sent so a record can be
/// written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, created_time: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            created_time: created_time.into(),
            fields,
        }
    }
}

/// A single page of a list call. `offset` is only present when Airtable has
/// more rows than it returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Query string options of `GET /v0/{base}/{table}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter_by_formula: Option<String>,
    pub fields: Vec<String>,
    pub max_records: Option<u32>,
    pub sort: Option<Sort>,
}

impl ListQuery {
    /// Flatten into the query pairs Airtable expects. Empty formulas are not sent.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(max) = self.max_records {
            params.push(("maxRecords".to_string(), max.to_string()));
        }

        if let Some(formula) = self.filter_by_formula.as_ref().filter(|f| !f.is_empty()) {
            params.push(("filterByFormula".to_string(), formula.clone()));
        }

        for field in &self.fields {
            params.push(("fields[]".to_string(), field.clone()));
        }

        if let Some(sort) = &self.sort {
            params.push(("sort[0][field]".to_string(), sort.field.clone()));
            params.push(("sort[0][direction]".to_string(), sort.direction.as_str().to_string()));
        }

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_keeps_created_time_verbatim() {
        let raw = json!({
            "id": "rec1",
            "createdTime": "2024-05-01T10:00:00.000Z",
            "fields": {"Name": "Ada"}
        });
        let record: Record = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.created_time, "2024-05-01T10:00:00.000Z");
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn record_without_fields_deserializes() {
        let record: Record =
            serde_json::from_value(json!({"id": "rec2", "createdTime": "t"})).unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn empty_query_has_no_params() {
        assert!(ListQuery::default().to_params().is_empty());
    }

    #[test]
    fn full_query_params_in_order() {
        let query = ListQuery {
            filter_by_formula: Some("{Status} = \"Open\"".into()),
            fields: vec!["Name".into(), "Email".into()],
            max_records: Some(10),
            sort: Some(Sort {
                field: "Name".into(),
                direction: SortDirection::Desc,
            }),
        };

        let params = query.to_params();
        assert_eq!(
            params,
            vec![
                ("maxRecords".to_string(), "10".to_string()),
                ("filterByFormula".to_string(), "{Status} = \"Open\"".to_string()),
                ("fields[]".to_string(), "Name".to_string()),
                ("fields[]".to_string(), "Email".to_string()),
                ("sort[0][field]".to_string(), "Name".to_string()),
                ("sort[0][direction]".to_string(), "desc".to_string()),
            ]
        );
    }

    #[test]
    fn blank_formula_is_skipped() {
        let query = ListQuery {
            filter_by_formula: Some(String::new()),
            ..Default::default()
        };
        assert!(query.to_params().is_empty());
    }
}
