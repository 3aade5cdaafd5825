//! Remote table endpoint contract and REST client.

use hearth_core::EntityTable;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Errors from the remote table endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network or transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint returned a non-success HTTP status.
    #[error("Remote API error: {status} - {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration or initialization error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// The remote upsert/delete endpoint, table-scoped.
///
/// Implemented for the REST client below and mocked in tests. The push
/// worker is generic over this, so nothing in it touches a socket directly.
pub trait RemoteTableWriter: Send + Sync {
    /// Upsert a batch of rows in one call.
    fn upsert_batch(
        &self,
        table: EntityTable,
        rows: Vec<Value>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Upsert a single row.
    fn upsert_one(
        &self,
        table: EntityTable,
        row: Value,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Delete a single row by id.
    fn delete_row(
        &self,
        table: EntityTable,
        id: Uuid,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// PostgREST-style table client.
///
/// Upserts POST to `/rest/v1/<table>` with `Prefer:
/// resolution=merge-duplicates`, so whole-row retries keyed on `id` are
/// idempotent server-side.
#[derive(Clone)]
pub struct RestTableClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestTableClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the bearer token used for subsequent calls (after sign-in or
    /// token refresh).
    pub async fn set_access_token(&self, token: impl Into<String>) {
        let mut guard = self.access_token.write().await;
        *guard = Some(token.into());
    }

    /// Clear the bearer token (sign-out).
    pub async fn clear_access_token(&self) {
        let mut guard = self.access_token.write().await;
        *guard = None;
    }

    fn table_url(&self, table: EntityTable) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    async fn bearer(&self) -> String {
        let guard = self.access_token.read().await;
        guard.clone().unwrap_or_else(|| self.api_key.clone())
    }

    async fn send_upsert(&self, table: EntityTable, body: &Value) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .header("Prefer", "resolution=merge-duplicates")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!(table = %table, "Remote upsert succeeded");
        Ok(())
    }
}

impl RemoteTableWriter for RestTableClient {
    async fn upsert_batch(&self, table: EntityTable, rows: Vec<Value>) -> Result<(), RemoteError> {
        self.send_upsert(table, &Value::Array(rows)).await
    }

    async fn upsert_one(&self, table: EntityTable, row: Value) -> Result<(), RemoteError> {
        self.send_upsert(table, &row).await
    }

    async fn delete_row(&self, table: EntityTable, id: Uuid) -> Result<(), RemoteError> {
        let url = format!("{}?id=eq.{}", self.table_url(table), id);
        let response = self
            .http
            .delete(url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_url_is_table_scoped() {
        let client = RestTableClient::new("https://hearth.example.supabase.co/", "key");
        assert_eq!(
            client.table_url(EntityTable::Tasks),
            "https://hearth.example.supabase.co/rest/v1/tasks"
        );
        assert_eq!(
            client.table_url(EntityTable::Properties),
            "https://hearth.example.supabase.co/rest/v1/properties"
        );
    }

    #[tokio::test]
    async fn bearer_falls_back_to_api_key() {
        let client = RestTableClient::new("https://x.example", "anon-key");
        assert_eq!(client.bearer().await, "anon-key");

        client.set_access_token("jwt-token").await;
        assert_eq!(client.bearer().await, "jwt-token");

        client.clear_access_token().await;
        assert_eq!(client.bearer().await, "anon-key");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_http_error() {
        let client = RestTableClient::new("http://127.0.0.1:9", "key");
        let err = client
            .upsert_one(EntityTable::Tasks, json!({ "id": "x" }))
            .await
            .expect_err("expected connect failure");
        assert!(matches!(err, RemoteError::Http(_)));
    }

    #[test]
    fn api_error_display_includes_status() {
        let err = RemoteError::Api {
            status: 403,
            message: "row-level security".to_string(),
        };
        assert_eq!(err.to_string(), "Remote API error: 403 - row-level security");
    }
}
