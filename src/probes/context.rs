use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, Url};

use super::control_plane::ControlPlane;
use crate::errors::ProdGuardError;
use crate::monitor::{AbortSignal, RequestLedger};

const USER_AGENT: &str = concat!("prodguard/", env!("CARGO_PKG_VERSION"));

/// Everything a probe may touch, passed explicitly into every invocation.
#[derive(Clone)]
pub struct ProbeContext {
    pub target: Url,
    pub client: Client,
    pub abort: AbortSignal,
    pub read_only: bool,
    pub ledger: Arc<RequestLedger>,
    pub control_plane: Option<Arc<dyn ControlPlane>>,
    /// Upper bound on requests a flood-style probe may send.
    pub rate_limit_budget: u32,
}

impl ProbeContext {
    pub fn new(target: Url, client: Client, abort: AbortSignal) -> Self {
        Self {
            target,
            client,
            abort,
            read_only: true,
            ledger: Arc::new(RequestLedger::default()),
            control_plane: None,
            rate_limit_budget: 50,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<RequestLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_control_plane(mut self, control_plane: Option<Arc<dyn ControlPlane>>) -> Self {
        self.control_plane = control_plane;
        self
    }

    pub fn with_rate_limit_budget(mut self, budget: u32) -> Self {
        self.rate_limit_budget = budget;
        self
    }

    /// HTTP client for probing: redirects are reported, not followed.
    pub fn build_client(request_timeout: Duration) -> Result<Client, ProdGuardError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;
        Ok(client)
    }

    /// Resolve `path` (with optional query) against the target.
    pub fn url(&self, path: &str) -> Result<Url, ProdGuardError> {
        self.target
            .join(path)
            .map_err(|e| ProdGuardError::Config(format!("Invalid probe path '{}': {}", path, e)))
    }

    /// GET through the shared client, counted in the request ledger.
    pub async fn get(&self, url: Url) -> Result<Response, reqwest::Error> {
        let _guard = self.ledger.begin();
        self.client.get(url).send().await
    }

    pub fn control_plane(&self) -> Result<&Arc<dyn ControlPlane>, ProdGuardError> {
        self.control_plane
            .as_ref()
            .ok_or_else(|| ProdGuardError::Config("No control plane configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(target: &str) -> ProbeContext {
        let client = ProbeContext::build_client(Duration::from_secs(1)).unwrap();
        ProbeContext::new(Url::parse(target).unwrap(), client, AbortSignal::never())
    }

    #[test]
    fn test_url_joins_path_and_query() {
        let ctx = ctx("https://example.com/app/");
        let url = ctx.url("/admin?x=1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/admin?x=1");
    }

    #[test]
    fn test_defaults_are_read_only() {
        let ctx = ctx("https://example.com");
        assert!(ctx.read_only);
        assert!(ctx.control_plane().is_err());
    }
}
