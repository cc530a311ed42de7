use std::{collections::HashMap, fmt, sync::Arc};

use airtable_client::AirtableApi;
use async_trait::async_trait;
use dashmap::DashMap;
use schemars::{JsonSchema, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    connection::{ConnectionConfig, Connector},
    flow::state::{SessionState, StateValue},
    payload::ResultPayload,
    secret::SecretsManager,
    store::{Durability, StoreLocation, StoreTarget},
};

#[async_trait]
pub trait NodeType: Send + Sync + fmt::Debug {
    fn type_name(&self) -> String;
    async fn process(&self, context: &mut NodeContext) -> Result<NodeOut, NodeError>;
    fn clone_box(&self) -> Box<dyn NodeType>;
    /// Return this concrete type's config schema.
    fn schema(&self) -> Schema;
}

/// The declared `type` of a child continuation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Branch {
    Success,
    NotFound,
    MultipleFound,
    Error,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Success => "success",
            Branch::NotFound => "notFound",
            Branch::MultipleFound => "multipleFound",
            Branch::Error => "error",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child node attached to a branching node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChildConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub branch: Branch,
}

impl ChildConfig {
    pub fn new(id: impl Into<String>, branch: Branch) -> Self {
        Self { id: id.into(), branch }
    }
}

/// Branch -> child id. When several children share a branch the first wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildTable(HashMap<Branch, String>);

impl ChildTable {
    pub fn from_children(children: &[ChildConfig]) -> Self {
        let mut table = HashMap::new();
        for child in children {
            table.entry(child.branch).or_insert_with(|| child.id.clone());
        }
        ChildTable(table)
    }

    pub fn get(&self, branch: Branch) -> Option<&str> {
        self.0.get(&branch).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Routing {
    /// No child selected, the host continues with the regular successor.
    FollowGraph,
    ToNode(String),
}

/// What a node did: the branch it took, where execution goes next and the
/// payload written to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOut {
    branch: Option<Branch>,
    routing: Routing,
    target: StoreTarget,
    payload: Value,
}

impl NodeOut {
    pub fn new(branch: Option<Branch>, routing: Routing, target: StoreTarget, payload: Value) -> Self {
        Self {
            branch,
            routing,
            target,
            payload,
        }
    }

    pub fn branch(&self) -> Option<Branch> {
        self.branch
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("Node not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Host surface a node sees during one invocation.
pub struct NodeContext {
    session_id: String,
    input: DashMap<String, Value>,
    session: SessionState,
    secrets: SecretsManager,
    connector: Arc<dyn Connector>,
    children: ChildTable,
    next_node: Option<String>,
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("session_id", &self.session_id)
            .field("input_keys", &self.input.iter().map(|e| e.key().clone()).collect::<Vec<_>>())
            .field("children", &self.children)
            .field("next_node", &self.next_node)
            .finish()
    }
}

impl NodeContext {
    pub fn new(
        session_id: impl Into<String>,
        session: SessionState,
        secrets: SecretsManager,
        connector: Arc<dyn Connector>,
        children: ChildTable,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            input: DashMap::new(),
            session,
            secrets,
            connector,
            children,
            next_node: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn add_to_input(&self, key: &str, value: Value) {
        self.input.insert(key.to_string(), value);
    }

    pub fn get_input(&self, key: &str) -> Option<Value> {
        self.input.get(key).map(|v| v.clone())
    }

    pub fn input(&self) -> serde_json::Map<String, Value> {
        self.input
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn add_to_context(&self, key: &str, value: Value, _durability: Durability) {
        self.session.set(key.to_string(), StateValue::from(value));
    }

    pub fn get_context(&self, key: &str) -> Option<Value> {
        self.session.get(key).map(|v| v.to_json())
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn write(&self, target: &StoreTarget, value: Value) {
        match target.location {
            StoreLocation::Input => self.add_to_input(&target.key, value),
            StoreLocation::Context => self.add_to_context(&target.key, value, Durability::Simple),
        }
    }

    pub fn child(&self, branch: Branch) -> Option<&str> {
        self.children.get(branch)
    }

    pub fn set_next_node(&mut self, node_id: impl Into<String>) {
        self.next_node = Some(node_id.into());
    }

    pub fn next_node(&self) -> Option<&str> {
        self.next_node.as_deref()
    }

    pub async fn reveal_secret(&self, key: &str) -> Option<String> {
        self.secrets.get_secret(key).await.ok().flatten()
    }

    /// Resolves the node's connection and hands back a ready Airtable handle.
    pub async fn airtable(&self, connection: &ConnectionConfig) -> Result<Arc<dyn AirtableApi>, NodeError> {
        let resolved = connection.resolve(&self.secrets).await?;
        Ok(self.connector.connect(&resolved))
    }

    /// Writes the payload and, for branching nodes, moves on to the child
    /// registered for `branch`. A missing child just falls through.
    pub fn complete(&mut self, target: &StoreTarget, payload: &ResultPayload, branch: Option<Branch>) -> NodeOut {
        let value = payload.to_value();
        self.write(target, value.clone());
        debug!(location = target.location.as_str(), key = %target.key, "result stored");

        let routing = match branch.and_then(|b| self.child(b).map(str::to_string)) {
            Some(child) => {
                self.set_next_node(child.clone());
                Routing::ToNode(child)
            }
            None => Routing::FollowGraph,
        };

        if let Some(branch) = branch {
            info!(%branch, next = ?self.next_node, "branch selected");
        }

        NodeOut::new(branch, routing, target.clone(), value)
    }
}
