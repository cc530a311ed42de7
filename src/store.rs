use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a node writes its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreLocation {
    /// Request scoped, discarded after the current turn.
    Input,
    /// Session scoped, survives across invocations of the same session.
    #[default]
    Context,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::Input => "input",
            StoreLocation::Context => "context",
        }
    }
}

/// Lifetime hint passed along with context writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Durability {
    #[default]
    Simple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTarget {
    pub location: StoreLocation,
    pub key: String,
}

impl StoreTarget {
    pub fn new(location: StoreLocation, key: impl Into<String>) -> Self {
        Self {
            location,
            key: key.into(),
        }
    }
}

/// The `storageOption` section shared by every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageOptions {
    #[serde(default)]
    pub store_location: StoreLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
}

impl StorageOptions {
    pub fn input(key: impl Into<String>) -> Self {
        Self {
            store_location: StoreLocation::Input,
            input_key: Some(key.into()),
            context_key: None,
        }
    }

    pub fn context(key: impl Into<String>) -> Self {
        Self {
            store_location: StoreLocation::Context,
            input_key: None,
            context_key: Some(key.into()),
        }
    }

    /// Picks the key belonging to the selected location. Blank keys fall back
    /// to the node's default.
    pub fn target(&self, default_key: &str) -> StoreTarget {
        let key = match self.store_location {
            StoreLocation::Input => self.input_key.as_deref(),
            StoreLocation::Context => self.context_key.as_deref(),
        }
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(default_key);

        StoreTarget::new(self.store_location, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_context_with_default_key() {
        let options: StorageOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(
            options.target("airtableRecords"),
            StoreTarget::new(StoreLocation::Context, "airtableRecords")
        );
    }

    #[test]
    fn key_follows_location() {
        let options: StorageOptions = serde_json::from_value(json!({
            "storeLocation": "input",
            "inputKey": "rows",
            "contextKey": "ignored"
        }))
        .unwrap();
        assert_eq!(options.target("airtableRecords"), StoreTarget::new(StoreLocation::Input, "rows"));
    }

    #[test]
    fn blank_key_falls_back() {
        let options = StorageOptions::context("  ");
        assert_eq!(options.target("airtableRecord").key, "airtableRecord");
    }

    #[test]
    fn unknown_location_is_rejected() {
        let parsed = serde_json::from_value::<StorageOptions>(json!({"storeLocation": "disk"}));
        assert!(parsed.is_err());
    }
}
