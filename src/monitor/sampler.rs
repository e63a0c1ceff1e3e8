use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::ProdGuardError;
use crate::probes::control_plane::ControlPlane;

/// Source of the resource and cost readings polled by the emergency stop monitor.
#[async_trait]
pub trait UsageSampler: Send + Sync {
    /// Current resource usage as a ratio in `[0, 1]`.
    async fn resource_usage(&self) -> Result<f64, ProdGuardError>;

    /// Estimated cumulative spend of this run in USD.
    async fn estimated_cost_usd(&self) -> Result<f64, ProdGuardError>;
}

/// Counts the requests probes send to the target.
///
/// Resource usage is in-flight requests over `capacity`; cost is issued
/// requests times `cost_per_request_usd`.
#[derive(Debug)]
pub struct RequestLedger {
    issued: AtomicU64,
    in_flight: AtomicU64,
    capacity: u64,
    cost_per_request_usd: f64,
}

impl RequestLedger {
    pub fn new(capacity: u64, cost_per_request_usd: f64) -> Self {
        Self {
            issued: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            capacity: capacity.max(1),
            cost_per_request_usd,
        }
    }

    /// Record one outgoing request; it stays in flight until the guard drops.
    pub fn begin(&self) -> RequestGuard<'_> {
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        RequestGuard { ledger: self }
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn usage_ratio(&self) -> f64 {
        (self.in_flight() as f64 / self.capacity as f64).min(1.0)
    }

    pub fn estimated_cost(&self) -> f64 {
        self.issued() as f64 * self.cost_per_request_usd
    }
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self::new(10, 0.0001)
    }
}

#[must_use]
pub struct RequestGuard<'a> {
    ledger: &'a RequestLedger,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.ledger.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl UsageSampler for RequestLedger {
    async fn resource_usage(&self) -> Result<f64, ProdGuardError> {
        Ok(self.usage_ratio())
    }

    async fn estimated_cost_usd(&self) -> Result<f64, ProdGuardError> {
        Ok(self.estimated_cost())
    }
}

/// Reads usage and spend through the control plane.
pub struct ControlPlaneSampler {
    control_plane: Arc<dyn ControlPlane>,
}

impl ControlPlaneSampler {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    async fn read_number(&self, service: &str, action: &str, field: &str) -> Result<f64, ProdGuardError> {
        let response = self.control_plane.invoke(service, action, json!({})).await?;
        response
            .get(field)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ProdGuardError::ControlPlane(format!(
                "{}/{} response has no numeric '{}' field", service, action, field
            )))
    }
}

#[async_trait]
impl UsageSampler for ControlPlaneSampler {
    async fn resource_usage(&self) -> Result<f64, ProdGuardError> {
        self.read_number("monitoring", "GetResourceUtilization", "utilization").await
    }

    async fn estimated_cost_usd(&self) -> Result<f64, ProdGuardError> {
        self.read_number("billing", "GetEstimatedCharges", "amount_usd").await
    }
}
