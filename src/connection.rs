use std::fmt;
use std::sync::Arc;

use airtable_client::{AirtableApi, AirtableClient, DEFAULT_API_URL};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{config::ConfigManager, node::NodeError, secret::SecretsManager};

/// Connection type name registered by the extension.
pub const CONNECTION_TYPE: &str = "airtable-token";

/// How a node gets its personal access token: inline, or by naming a secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConnectionConfig {
    Token {
        #[serde(rename = "accessToken")]
        access_token: String,
    },
    Secret {
        secret: String,
    },
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionConfig::Token { .. } => f.write_str("Token(<redacted>)"),
            ConnectionConfig::Secret { secret } => f.debug_struct("Secret").field("secret", secret).finish(),
        }
    }
}

impl ConnectionConfig {
    pub fn token(access_token: impl Into<String>) -> Self {
        ConnectionConfig::Token {
            access_token: access_token.into(),
        }
    }

    pub fn secret(key: impl Into<String>) -> Self {
        ConnectionConfig::Secret { secret: key.into() }
    }

    pub async fn resolve(&self, secrets: &SecretsManager) -> Result<AirtableConnection, NodeError> {
        let access_token = match self {
            ConnectionConfig::Token { access_token } => access_token.clone(),
            ConnectionConfig::Secret { secret } => secrets
                .get_secret(secret)
                .await
                .map_err(|e| NodeError::ConnectionFailed(format!("could not read secret {}: {}", secret, e)))?
                .ok_or_else(|| NodeError::ConnectionFailed(format!("secret {} is not set", secret)))?,
        };

        if access_token.trim().is_empty() {
            return Err(NodeError::InvalidInput("Airtable access token is empty".into()));
        }

        Ok(AirtableConnection { access_token })
    }
}

/// A resolved `airtable-token` connection.
#[derive(Clone, PartialEq, Eq)]
pub struct AirtableConnection {
    access_token: String,
}

impl AirtableConnection {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AirtableConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableConnection")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Turns a resolved connection into something that can talk to Airtable.
pub trait Connector: Send + Sync + fmt::Debug {
    fn connect(&self, connection: &AirtableConnection) -> Arc<dyn AirtableApi>;
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    api_url: String,
}

impl HttpConnector {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub async fn from_config(config: &ConfigManager) -> Self {
        Self::new(config.api_url().await)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl Connector for HttpConnector {
    fn connect(&self, connection: &AirtableConnection) -> Arc<dyn AirtableApi> {
        Arc::new(AirtableClient::with_api_url(
            connection.access_token(),
            self.api_url.clone(),
        ))
    }
}
