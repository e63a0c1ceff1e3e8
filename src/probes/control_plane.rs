use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ProdGuardError;

/// Opaque capability for calling the cloud or platform control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn invoke(&self, service: &str, action: &str, params: Value) -> Result<Value, ProdGuardError>;
}

const MUTATING_PREFIXES: &[&str] = &[
    "Create", "Put", "Update", "Delete", "Modify", "Start", "Stop", "Terminate",
    "Attach", "Detach", "Set", "Enable", "Disable", "Remove", "Add",
];

/// True for action names that change state on the control plane.
pub fn is_mutating_action(action: &str) -> bool {
    MUTATING_PREFIXES.iter().any(|prefix| action.starts_with(prefix))
}

/// Rejects state-changing actions before they reach the wrapped control plane.
pub struct ReadOnlyControlPlane {
    inner: Arc<dyn ControlPlane>,
}

impl ReadOnlyControlPlane {
    pub fn new(inner: Arc<dyn ControlPlane>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ControlPlane for ReadOnlyControlPlane {
    async fn invoke(&self, service: &str, action: &str, params: Value) -> Result<Value, ProdGuardError> {
        if is_mutating_action(action) {
            warn!(service, action, "Blocked mutating control-plane call in read-only mode");
            return Err(ProdGuardError::Permission(format!(
                "{}/{} is not allowed in read-only mode", service, action
            )));
        }
        self.inner.invoke(service, action, params).await
    }
}

/// Forwards calls as `POST {endpoint}/{service}/{action}` with a JSON body.
pub struct HttpControlPlane {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(client: Client, endpoint: Url, token: Option<String>) -> Self {
        Self { client, endpoint, token }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn invoke(&self, service: &str, action: &str, params: Value) -> Result<Value, ProdGuardError> {
        let url = self.endpoint
            .join(&format!("{}/{}", service, action))
            .map_err(|e| ProdGuardError::Config(format!("Invalid control plane path: {}", e)))?;
        debug!(service, action, "Control plane call");

        let mut request = self.client.post(url).json(&params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProdGuardError::ControlPlane(format!("{}/{}: {}", service, action, e)))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProdGuardError::Permission(format!("{}/{} returned {}", service, action, status)));
        }
        if !status.is_success() {
            return Err(ProdGuardError::ControlPlane(format!("{}/{} returned {}", service, action, status)));
        }
        Ok(response.json::<Value>().await?)
    }
}
