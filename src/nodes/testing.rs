use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use airtable_client::{AirtableApi, AirtableError, ListQuery, Record, RecordPage};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::connection::{AirtableConnection, Connector};
use crate::flow::state::InMemoryState;
use crate::node::{ChildConfig, ChildTable, NodeContext};
use crate::secret::{EmptySecretsManager, SecretsManager};

type Queue<T> = Mutex<VecDeque<Result<T, AirtableError>>>;

/// In-memory `AirtableApi` that replays scripted answers in order and records
/// every call it receives.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    lists: Queue<RecordPage>,
    creates: Queue<Record>,
    updates: Queue<Record>,
    list_calls: Mutex<Vec<(String, String, ListQuery)>>,
    create_calls: Mutex<Vec<(String, String, Map<String, Value>)>>,
    update_calls: Mutex<Vec<(String, String, String, Map<String, Value>)>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(self, answer: Result<RecordPage, AirtableError>) -> Self {
        self.lists.lock().unwrap().push_back(answer);
        self
    }

    pub fn create(self, answer: Result<Record, AirtableError>) -> Self {
        self.creates.lock().unwrap().push_back(answer);
        self
    }

    pub fn update(self, answer: Result<Record, AirtableError>) -> Self {
        self.updates.lock().unwrap().push_back(answer);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn list_calls(&self) -> Vec<(String, String, ListQuery)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<(String, String, Map<String, Value>)> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn update_calls(&self) -> Vec<(String, String, String, Map<String, Value>)> {
        self.update_calls.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.create_calls().len() + self.update_calls().len()
    }
}

fn next<T>(queue: &Queue<T>, what: &str) -> Result<T, AirtableError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(AirtableError::Transport(format!("unscripted {} call", what))))
}

#[async_trait]
impl AirtableApi for ScriptedApi {
    async fn list_records(
        &self,
        base_id: &str,
        table_name: &str,
        query: &ListQuery,
    ) -> Result<RecordPage, AirtableError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((base_id.to_string(), table_name.to_string(), query.clone()));
        next(&self.lists, "list")
    }

    async fn create_record(
        &self,
        base_id: &str,
        table_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError> {
        self.create_calls
            .lock()
            .unwrap()
            .push((base_id.to_string(), table_name.to_string(), fields.clone()));
        next(&self.creates, "create")
    }

    async fn update_record(
        &self,
        base_id: &str,
        table_name: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError> {
        self.update_calls.lock().unwrap().push((
            base_id.to_string(),
            table_name.to_string(),
            record_id.to_string(),
            fields.clone(),
        ));
        next(&self.updates, "update")
    }
}

/// Hands out the same scripted API regardless of the token.
#[derive(Debug)]
pub struct StaticConnector(Arc<ScriptedApi>);

impl StaticConnector {
    pub fn new(api: Arc<ScriptedApi>) -> Self {
        Self(api)
    }
}

impl Connector for StaticConnector {
    fn connect(&self, _connection: &AirtableConnection) -> Arc<dyn AirtableApi> {
        self.0.clone()
    }
}

pub fn context_with(api: Arc<ScriptedApi>, children: &[ChildConfig]) -> NodeContext {
    NodeContext::new(
        "test-session",
        InMemoryState::new(),
        SecretsManager(EmptySecretsManager::new()),
        Arc::new(StaticConnector::new(api)),
        ChildTable::from_children(children),
    )
}

pub fn record(id: &str, fields: Value) -> Record {
    Record::new(
        id,
        "2024-01-01T00:00:00.000Z",
        fields.as_object().cloned().unwrap_or_default(),
    )
}

pub fn page(records: Vec<Record>) -> RecordPage {
    RecordPage { records, offset: None }
}
