use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    connection::Connector,
    flow::session::SessionStore,
    node::{Branch, ChildConfig, ChildTable, NodeContext, NodeError, NodeType},
    nodes::AirtableNode,
    secret::SecretsManager,
    store::StoreTarget,
};

/// One node run as described in a `.json`, `.yaml` or `.yml` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeInvocation {
    /// Reuses an existing session context when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub node: AirtableNode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildConfig>,
    /// Seeds the input store before the node runs.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub input: Map<String, Value>,
}

impl NodeInvocation {
    pub fn new(node: AirtableNode) -> Self {
        Self {
            session_id: None,
            node,
            children: vec![],
            input: Map::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|os| os.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("JSON parse error in {}", path.display())),
            "yaml" | "yml" => serde_yaml_bw::from_str(&contents)
                .with_context(|| format!("YAML parse error in {}", path.display())),
            other => bail!("unsupported extension \"{}\" (expected .json, .yaml or .yml)", other),
        }
    }
}

/// What one node invocation did, including the stores it left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub session_id: String,
    pub node_type: String,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub branch: Option<Branch>,
    pub next_node: Option<String>,
    pub target: StoreTarget,
    pub payload: Value,
    pub input: Map<String, Value>,
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Runner {
    sessions: SessionStore,
    secrets: SecretsManager,
    connector: Arc<dyn Connector>,
}

impl Runner {
    pub fn new(sessions: SessionStore, secrets: SecretsManager, connector: Arc<dyn Connector>) -> Self {
        Self {
            sessions,
            secrets,
            connector,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[tracing::instrument(name = "runner_run", skip(self, invocation), fields(node = %invocation.node.type_name()))]
    pub async fn run(&self, invocation: &NodeInvocation) -> Result<ExecutionReport, NodeError> {
        let session_id = invocation
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self.sessions.get_or_create(&session_id).await;

        let mut context = NodeContext::new(
            session_id.clone(),
            session.clone(),
            self.secrets.clone(),
            self.connector.clone(),
            ChildTable::from_children(&invocation.children),
        );
        for (key, value) in &invocation.input {
            context.add_to_input(key, value.clone());
        }

        let started = Utc::now();
        let out = match invocation.node.process(&mut context).await {
            Ok(out) => out,
            Err(err) => {
                error!(session = %session_id, error = %err, "node did not run");
                return Err(err);
            }
        };
        let finished = Utc::now();

        info!(
            session = %session_id,
            branch = ?out.branch(),
            elapsed_ms = (finished - started).num_milliseconds(),
            "invocation finished"
        );

        let mut stored: Vec<(String, Value)> = session
            .all()
            .into_iter()
            .map(|(key, value)| (key, value.to_json()))
            .collect();
        stored.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(ExecutionReport {
            session_id,
            node_type: invocation.node.type_name(),
            started,
            finished,
            branch: out.branch(),
            next_node: context.next_node().map(str::to_string),
            target: out.target().clone(),
            payload: out.payload().clone(),
            input: context.input(),
            context: stored.into_iter().collect(),
        })
    }
}
