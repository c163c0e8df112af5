//! Client side of the cluster security role API, plus the reader/writer seams the
//! sync orchestrator depends on.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::role::RoleDocument;

/// Acknowledgement from a create-or-update call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// True when the role did not exist before.
    pub created: bool,
}

#[async_trait]
pub trait RoleReader: Send + Sync {
    async fn get_role_permissions(&self, role_name: &str) -> ClusterResult<RoleDocument>;
}

#[async_trait]
pub trait RoleWriter: Send + Sync {
    async fn update_role(&self, role_name: &str, role: RoleDocument) -> ClusterResult<WriteResult>;
}

pub struct ClusterSession {
    base: Url,
    client: reqwest::Client,
}

impl ClusterSession {
    pub fn connect(cfg: &ClusterConfig) -> Result<Self> {
        let mut base = Url::parse(&cfg.host).with_context(|| format!("invalid cluster URL '{}'", cfg.host))?;
        // join() replaces the last path segment unless the base ends in '/'
        if !base.path().ends_with('/') {
            let p = format!("{}/", base.path());
            base.set_path(&p);
        }
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("ApiKey {}", cfg.api_key)).context("API key is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        debug!(target: "rolesync::cluster", "session opened host={}", base);
        Ok(Self { base, client })
    }

    fn role_url(&self, role_name: &str) -> ClusterResult<Url> {
        let path = format!("_security/role/{}", urlencoding::encode(role_name));
        self.base
            .join(&path)
            .map_err(|e| ClusterError::internal("invalid_url".to_string(), e.to_string()))
    }

    /// Release the connection pool. Consumes the session so it cannot be used afterwards.
    pub fn close(self) {
        info!(target: "rolesync::cluster", "session closed host={}", self.base);
        drop(self.client);
    }
}

async fn error_for(resp: reqwest::Response) -> ClusterError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ClusterError::from_http_status(status, body.trim())
}

#[async_trait]
impl RoleReader for ClusterSession {
    async fn get_role_permissions(&self, role_name: &str) -> ClusterResult<RoleDocument> {
        let url = self.role_url(role_name)?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_for(resp).await);
        }
        // Response shape: { "<role_name>": { "cluster": [...], ... } }
        let mut val: serde_json::Value = resp.json().await?;
        let inner = val
            .as_object_mut()
            .and_then(|m| m.shift_remove(role_name))
            .ok_or_else(|| ClusterError::not_found("role_not_found".to_string(), format!("role '{}' missing from response", role_name)))?;
        RoleDocument::from_value(inner)
            .map_err(|e| ClusterError::internal("invalid_response".to_string(), e.to_string()))
    }
}

#[async_trait]
impl RoleWriter for ClusterSession {
    async fn update_role(&self, role_name: &str, role: RoleDocument) -> ClusterResult<WriteResult> {
        let url = self.role_url(role_name)?;
        let resp = self.client.put(url).json(&role).send().await?;
        if !resp.status().is_success() {
            return Err(error_for(resp).await);
        }
        // Response shape: { "role": { "created": bool } }
        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ClusterError::internal("invalid_response".to_string(), e.to_string()))?;
        let created = val.get("role").and_then(|r| r.get("created")).and_then(|c| c.as_bool()).unwrap_or(false);
        Ok(WriteResult { created })
    }
}
