use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{JsonRpcRequest, JsonRpcResponse};
use super::Provider;
use crate::error::{CompoundError, Result};

/// JSON-RPC 2.0 over HTTP.
///
/// Used directly for nodes that manage their own unlocked accounts (the
/// injected-wallet case) and as the transport underneath
/// [`super::KeySessionProvider`].
pub struct HttpProvider {
    url: String,
    /// reqwest::Client is internally Arc-based
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        log::debug!("→ {} (id={}) {}", method, id, self.url);

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompoundError::provider(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompoundError::provider(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let envelope: JsonRpcResponse = response.json().await?;
        let result = envelope.into_result();
        if let Err(ref e) = result {
            log::debug!("← {} (id={}) failed: {}", method, id, e);
        }
        result
    }

    fn label(&self) -> String {
        format!("injected ({})", self.url)
    }
}
