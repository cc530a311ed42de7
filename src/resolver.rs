use airtable_client::{AirtableApi, AirtableError, ListQuery, Record, Sort};
use tracing::{debug, warn};

/// Airtable refuses `maxRecords` above this for a single page.
pub const MAX_RECORDS_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// A raw Airtable formula, sent as is.
    Formula(String),
    /// `{field} = "value"`
    Equals { field: String, value: String },
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_formula(&self) -> String {
        match self {
            Filter::Formula(formula) => formula.clone(),
            Filter::Equals { field, value } => equality_formula(field, value),
        }
    }
}

/// Renders an exact-match formula. The value is inserted verbatim: a `"`
/// inside it ends the string literal early.
pub fn equality_formula(field: &str, value: &str) -> String {
    format!("{{{}}} = \"{}\"", field, value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub base_id: String,
    pub table_name: String,
    pub filter: Option<Filter>,
    pub fields: Vec<String>,
    pub max_records: Option<u32>,
    pub sort: Option<Sort>,
}

impl QuerySpec {
    pub fn new(base_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            table_name: table_name.into(),
            filter: None,
            fields: vec![],
            max_records: None,
            sort: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Caps the page size, clamped to `1..=100`.
    pub fn max_records(mut self, max: u32) -> Self {
        self.max_records = Some(max.clamp(1, MAX_RECORDS_LIMIT));
        self
    }

    pub fn sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn to_list_query(&self) -> ListQuery {
        ListQuery {
            filter_by_formula: self.filter.as_ref().map(Filter::to_formula),
            fields: self
                .fields
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            max_records: self.max_records,
            sort: self.sort.clone(),
        }
    }
}

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    NotFound,
    Single(Record),
    Multiple { records: Vec<Record>, count: usize },
    TransportError(AirtableError),
}

impl Classification {
    pub fn from_records(mut records: Vec<Record>) -> Self {
        match records.len() {
            0 => Classification::NotFound,
            1 => match records.pop() {
                Some(record) => Classification::Single(record),
                None => Classification::NotFound,
            },
            count => Classification::Multiple { records, count },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::NotFound => "not_found",
            Classification::Single(_) => "single",
            Classification::Multiple { .. } => "multiple",
            Classification::TransportError(_) => "transport_error",
        }
    }
}

/// Runs one list call and classifies by result count. Only the first page is
/// ever looked at.
#[tracing::instrument(name = "airtable_resolve", skip(api, spec), fields(base = %spec.base_id, table = %spec.table_name))]
pub async fn resolve(api: &dyn AirtableApi, spec: &QuerySpec) -> Classification {
    let query = spec.to_list_query();
    match api.list_records(&spec.base_id, &spec.table_name, &query).await {
        Ok(page) => {
            if page.offset.is_some() {
                debug!("more records available; not following offset");
            }
            let classification = Classification::from_records(page.records);
            debug!(outcome = classification.label(), "lookup classified");
            classification
        }
        Err(err) => {
            warn!(error = %err, status = ?err.status(), "lookup failed");
            Classification::TransportError(err)
        }
    }
}
