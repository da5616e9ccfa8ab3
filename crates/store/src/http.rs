//! Remote store over HTTP: the authoritative copy of sessions.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET /kv/<key>` returns the JSON value, 404 when absent
//! - `PUT /kv/<key>` stores the JSON body
//! - `DELETE /kv/<key>` removes the value, 404 when absent
//! - `GET /kv?prefix=<p>` returns `[{"key": ..., "value": ...}]`
//!
//! Credentials are sent as a bearer token. 401/403 map to
//! [`StoreError::Unauthorized`], transport failures to [`StoreError::Network`].

use async_trait::async_trait;
use dayloop_core::error::StoreError;
use dayloop_core::store::KvStore;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Deserialize)]
struct ListEntry {
    key: String,
    value: Value,
}

/// A `KvStore` talking to a remote key-value endpoint.
pub struct HttpStore {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base_url, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }
}

/// Map a non-success status onto the store error contract.
fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(body),
        s if s.is_server_error() => StoreError::Network(format!("HTTP {}: {body}", s.as_u16())),
        s => StoreError::Storage(format!("HTTP {}: {body}", s.as_u16())),
    }
}

async fn error_from(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    status_error(status, body)
}

#[async_trait]
impl KvStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let response = self.send(self.client.get(self.key_url(key))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let value = response.json::<Value>().await.map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            _ => Err(error_from(response).await),
        }
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(key, "Remote put");
        let response = self.send(self.client.put(self.key_url(key)).json(&value)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        debug!(key, "Remote delete");
        let response = self.send(self.client.delete(self.key_url(key))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(error_from(response).await),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let url = format!("{}/kv", self.base_url);
        let response = self
            .send(self.client.get(url).query(&[("prefix", prefix)]))
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let entries = response
            .json::<Vec<ListEntry>>()
            .await
            .map_err(|e| StoreError::Corrupt {
                key: prefix.to_string(),
                reason: e.to_string(),
            })?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_urls() {
        let store = HttpStore::new("https://kv.example.com/", None);
        assert_eq!(
            store.key_url("sessions/abc"),
            "https://kv.example.com/kv/sessions/abc"
        );
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            StoreError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, String::new()),
            StoreError::Storage(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let store = HttpStore::new("http://127.0.0.1:1", Some("token".into()));
        let result = store.get("sessions/a").await;
        assert!(matches!(result, Err(StoreError::Network(_))));
    }
}
