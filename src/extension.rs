use once_cell::sync::Lazy;
use serde::Serialize;

use crate::descriptor::{ChildNodeDescriptor, ConnectionSchema, NodeDescriptor, airtable_connection};
use crate::nodes::{self, get_one_or_fail, upsert_by_search, upsert_record};

pub const EXTENSION_LABEL: &str = "Airtable";

/// Everything the host needs to register the Airtable nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub label: String,
    pub nodes: Vec<NodeDescriptor>,
    pub child_nodes: Vec<ChildNodeDescriptor>,
    pub connections: Vec<ConnectionSchema>,
}

static EXTENSION: Lazy<Extension> = Lazy::new(Extension::build);

impl Extension {
    /// Child nodes are registered per parent, so each router node lists its
    /// own branch children.
    fn build() -> Self {
        let mut child_nodes = get_one_or_fail::child_descriptors();
        child_nodes.extend(upsert_record::child_descriptors());
        child_nodes.extend(upsert_by_search::child_descriptors());

        Extension {
            label: EXTENSION_LABEL.to_string(),
            nodes: nodes::descriptors(),
            child_nodes,
            connections: vec![airtable_connection()],
        }
    }

    pub fn global() -> &'static Extension {
        &EXTENSION
    }

    pub fn node(&self, node_type: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.node_type == node_type)
    }

    pub fn children_of(&self, parent_type: &str) -> Vec<&ChildNodeDescriptor> {
        self.child_nodes
            .iter()
            .filter(|c| c.parent_type == parent_type)
            .collect()
    }
}
