//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchEngineClient`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cluster::ClusterHealthParts,
    http::{
        headers::HeaderMap,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        Method,
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesFlushParts, IndicesPutSettingsParts},
    BulkParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::ConnectionConfig;
use crate::errors::{DocumentError, SearchError};
use crate::interfaces::SearchEngineClient;
use crate::opensearch::bulk::{bulk_action_line, error_reason, parse_bulk_response};
use crate::opensearch::index_config::{create_index_body, refresh_interval_body};
use crate::types::{BulkItemOutcome, IndexSettings, IndexTarget, SerializedDocument};
use dump_indexer_shared::WriteMode;

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let config = ConnectionConfig::new("http://localhost:9200").with_credentials("admin", "admin");
/// let client = OpenSearchClient::new(&config)?;
///
/// client.delete_index("dewiktionary").await?;
/// client.create_index("dewiktionary", &IndexSettings::default()).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the configured URL.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchError)` - If the URL is invalid or the transport cannot be built
    pub fn new(config: &ConnectionConfig) -> Result<Self, SearchError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool).disable_proxy();

        if let Some(ref auth) = config.credentials {
            builder = builder.auth(Credentials::Basic(
                auth.username.clone(),
                auth.password.clone(),
            ));
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        info!(
            url = %config.url,
            authenticated = config.credentials.is_some(),
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Turn a non-success response into an error built by `make_error`.
    async fn ensure_success(
        response: Response,
        operation: &str,
        make_error: fn(String) -> SearchError,
    ) -> Result<(), SearchError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, operation, "Request failed");
        Err(make_error(format!(
            "{} failed with status {}: {}",
            operation, status, body
        )))
    }

    /// Extract a readable failure reason from a document write response body.
    fn document_failure_reason(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| value.get("error").map(error_reason))
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl SearchEngineClient for OpenSearchClient {
    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<bool, SearchError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        // 404 is acceptable - there is nothing to delete
        if response.status_code().as_u16() == 404 {
            debug!(index, "Index did not exist");
            return Ok(false);
        }

        Self::ensure_success(response, "Index deletion", SearchError::IndexDeletionError).await?;
        info!(index, "Deleted existing index");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn create_index(&self, index: &str, settings: &IndexSettings) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(create_index_body(settings))
            .send()
            .await
            .map_err(|e| SearchError::index_creation(e.to_string()))?;

        Self::ensure_success(response, "Index creation", SearchError::IndexCreationError).await?;
        info!(
            index,
            shards = settings.number_of_shards,
            replicas = settings.number_of_replicas,
            "Created index"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn put_refresh_interval(&self, index: &str, interval: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[index]))
            .body(refresh_interval_body(interval))
            .send()
            .await
            .map_err(|e| SearchError::settings(e.to_string()))?;

        Self::ensure_success(response, "Settings update", SearchError::SettingsError).await?;
        debug!(index, interval, "Updated refresh interval");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn flush_index(&self, index: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .flush(IndicesFlushParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::flush(e.to_string()))?;

        Self::ensure_success(response, "Index flush", SearchError::FlushError).await
    }

    async fn write_document(
        &self,
        target: &IndexTarget,
        document: &SerializedDocument,
        mode: WriteMode,
    ) -> Result<(), DocumentError> {
        let path = target.document_path(&document.id);
        let query: &[(&str, &str)] = match mode {
            WriteMode::CreateOnly => &[("op_type", "create")],
            WriteMode::Upsert => &[],
        };

        let response = self
            .client
            .send(
                Method::Put,
                &path,
                HeaderMap::new(),
                Some(query),
                Some(document.source.clone()),
                None,
            )
            .await
            .map_err(|e| DocumentError::transport(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DocumentError::from_status(
            status.as_u16(),
            Self::document_failure_reason(&body),
        ))
    }

    async fn bulk_write(
        &self,
        target: &IndexTarget,
        documents: &[SerializedDocument],
        mode: WriteMode,
    ) -> Result<Vec<BulkItemOutcome>, SearchError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut body: Vec<Vec<u8>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            let action = bulk_action_line(target, &document.id, mode);
            body.push(
                serde_json::to_vec(&action)
                    .map_err(|e| SearchError::SerializationError(e.to_string()))?,
            );
            body.push(document.source.clone());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&target.index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let status = response.status_code();
        if matches!(status.as_u16(), 429 | 503) {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Bulk request throttled");
            return Err(SearchError::Throttled {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Bulk request failed");
            return Err(SearchError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        parse_bulk_response(&response_body, documents)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("red");
        debug!(status, "Cluster health");
        Ok(status != "red")
    }
}
