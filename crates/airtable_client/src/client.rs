use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::AirtableError,
    model::{ListQuery, Record, RecordPage},
};

pub const DEFAULT_API_URL: &str = "https://api.airtable.com";

/// The three Airtable calls the nodes need. Implemented over HTTP by
/// [`AirtableClient`] and by scripted fakes in tests.
#[async_trait]
pub trait AirtableApi: Send + Sync {
    async fn list_records(
        &self,
        base_id: &str,
        table_name: &str,
        query: &ListQuery,
    ) -> Result<RecordPage, AirtableError>;

    async fn create_record(
        &self,
        base_id: &str,
        table_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError>;

    async fn update_record(
        &self,
        base_id: &str,
        table_name: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError>;
}

#[derive(Clone)]
pub struct AirtableClient {
    http: Client,
    api_url: String,
    access_token: String,
}

impl fmt::Debug for AirtableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableClient")
            .field("api_url", &self.api_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl AirtableClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_api_url(access_token, DEFAULT_API_URL)
    }

    pub fn with_api_url(access_token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
            access_token: access_token.into(),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `{api}/v0/{base}/{table}[/{record}]`, each part encoded as one path segment.
    pub fn table_url(
        &self,
        base_id: &str,
        table_name: &str,
        record_id: Option<&str>,
    ) -> Result<Url, AirtableError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|e| AirtableError::InvalidUrl(format!("{}: {}", self.api_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AirtableError::InvalidUrl(self.api_url.clone()))?;
            segments.pop_if_empty().push("v0").push(base_id).push(table_name);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AirtableError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AirtableError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AirtableError::from_response(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "Airtable request failed");
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AirtableError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AirtableApi for AirtableClient {
    #[tracing::instrument(name = "airtable_list_records", skip(self, query))]
    async fn list_records(
        &self,
        base_id: &str,
        table_name: &str,
        query: &ListQuery,
    ) -> Result<RecordPage, AirtableError> {
        let url = self.table_url(base_id, table_name, None)?;
        let params = query.to_params();
        debug!(?params, "listing records");

        let request = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .query(&params);
        self.send(request).await
    }

    #[tracing::instrument(name = "airtable_create_record", skip(self, fields))]
    async fn create_record(
        &self,
        base_id: &str,
        table_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError> {
        let url = self.table_url(base_id, table_name, None)?;
        debug!(field_count = fields.len(), "creating record");

        let request = self.http.post(url).json(&json!({ "fields": fields }));
        self.send(request).await
    }

    #[tracing::instrument(name = "airtable_update_record", skip(self, fields))]
    async fn update_record(
        &self,
        base_id: &str,
        table_name: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Record, AirtableError> {
        let url = self.table_url(base_id, table_name, Some(record_id))?;
        debug!(field_count = fields.len(), "updating record");

        let request = self.http.patch(url).json(&json!({ "fields": fields }));
        self.send(request).await
    }
}
