use airtable_client::{AirtableError, Record, RecordPage};
use serde_json::{Map, Value, json};

/// Everything a node can write to its store slot. Each variant renders to the
/// exact JSON object downstream flows read.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// get-all success
    RecordList {
        records: Vec<Record>,
        offset: Option<String>,
    },
    /// get-one-or-fail, exactly one match
    Found { record: Record },
    /// get-one-or-fail, no match
    NotFound { message: String },
    /// get-one-or-fail, ambiguous match
    MultipleFound {
        count: usize,
        message: String,
        records: Vec<Record>,
    },
    /// get-all and get-one-or-fail failures
    ReadFailure { message: String, status: Option<u16> },
    Inserted { record: Record },
    /// record-id upsert success
    Saved { record: Record },
    Created { record: Record },
    Updated { record: Record },
    /// record-id upsert answered 404
    RecordMissing { message: String, record_id: String },
    /// search upsert with creation disabled
    SearchMissing {
        message: String,
        search_field: String,
        search_value: String,
    },
    WriteFailure(WriteFailure),
}

/// `{success:false, error:true, ...}` with the optional context a writing node
/// has at hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteFailure {
    pub message: String,
    pub count: Option<usize>,
    pub search_field: Option<String>,
    pub search_value: Option<String>,
    pub status: Option<u16>,
    pub error_type: Option<String>,
}

impl WriteFailure {
    pub fn from_error(err: &AirtableError) -> Self {
        Self {
            message: err.message(),
            status: err.status(),
            error_type: err.error_type().map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, field: &str, value: &str) -> Self {
        self.search_field = Some(field.to_string());
        self.search_value = Some(value.to_string());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

pub fn not_found_message(field: &str, value: &str) -> String {
    format!("No record found with {} = \"{}\"", field, value)
}

pub fn multiple_found_message(count: usize, field: &str, value: &str) -> String {
    format!("Multiple records found ({}) with {} = \"{}\"", count, field, value)
}

pub fn record_missing_message(record_id: &str) -> String {
    format!("Record not found: {}", record_id)
}

impl ResultPayload {
    pub fn record_list(page: RecordPage) -> Self {
        ResultPayload::RecordList {
            records: page.records,
            offset: page.offset,
        }
    }

    pub fn not_found(field: &str, value: &str) -> Self {
        ResultPayload::NotFound {
            message: not_found_message(field, value),
        }
    }

    pub fn multiple_found(records: Vec<Record>, field: &str, value: &str) -> Self {
        let count = records.len();
        ResultPayload::MultipleFound {
            count,
            message: multiple_found_message(count, field, value),
            records,
        }
    }

    pub fn read_failure(err: &AirtableError) -> Self {
        ResultPayload::ReadFailure {
            message: err.message(),
            status: err.status(),
        }
    }

    pub fn record_missing(record_id: &str) -> Self {
        ResultPayload::RecordMissing {
            message: record_missing_message(record_id),
            record_id: record_id.to_string(),
        }
    }

    pub fn search_missing(field: &str, value: &str) -> Self {
        ResultPayload::SearchMissing {
            message: not_found_message(field, value),
            search_field: field.to_string(),
            search_value: value.to_string(),
        }
    }

    pub fn write_failure(err: &AirtableError) -> Self {
        ResultPayload::WriteFailure(WriteFailure::from_error(err))
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResultPayload::ReadFailure { .. } | ResultPayload::WriteFailure(_)
        )
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResultPayload::RecordList { records, offset } => json!({
                "records": records,
                "offset": offset,
                "total": records.len(),
            }),
            ResultPayload::Found { record } => json!({
                "found": true,
                "multiple": false,
                "record": record,
            }),
            ResultPayload::NotFound { message } => json!({
                "found": false,
                "message": message,
            }),
            ResultPayload::MultipleFound {
                count,
                message,
                records,
            } => json!({
                "found": true,
                "multiple": true,
                "count": count,
                "message": message,
                "records": records,
            }),
            ResultPayload::ReadFailure { message, status } => {
                let mut out = Map::new();
                out.insert("error".into(), json!(true));
                out.insert("message".into(), json!(message));
                insert_opt(&mut out, "status", status.map(|s| json!(s)));
                Value::Object(out)
            }
            ResultPayload::Inserted { record } => json!({
                "success": true,
                "record": record,
                "id": record.id,
                "createdTime": record.created_time,
            }),
            ResultPayload::Saved { record } => json!({
                "success": true,
                "record": record,
            }),
            ResultPayload::Created { record } => json!({
                "success": true,
                "created": true,
                "record": record,
            }),
            ResultPayload::Updated { record } => json!({
                "success": true,
                "updated": true,
                "record": record,
            }),
            ResultPayload::RecordMissing { message, record_id } => json!({
                "success": false,
                "notFound": true,
                "message": message,
                "recordId": record_id,
            }),
            ResultPayload::SearchMissing {
                message,
                search_field,
                search_value,
            } => json!({
                "success": false,
                "notFound": true,
                "message": message,
                "searchField": search_field,
                "searchValue": search_value,
            }),
            ResultPayload::WriteFailure(failure) => {
                let mut out = Map::new();
                out.insert("success".into(), json!(false));
                out.insert("error".into(), json!(true));
                out.insert("message".into(), json!(failure.message));
                insert_opt(&mut out, "count", failure.count.map(|c| json!(c)));
                insert_opt(&mut out, "searchField", failure.search_field.as_ref().map(|f| json!(f)));
                insert_opt(&mut out, "searchValue", failure.search_value.as_ref().map(|v| json!(v)));
                insert_opt(&mut out, "status", failure.status.map(|s| json!(s)));
                insert_opt(&mut out, "type", failure.error_type.as_ref().map(|t| json!(t)));
                Value::Object(out)
            }
        }
    }
}

fn insert_opt(out: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        out.insert(key.to_string(), value);
    }
}
