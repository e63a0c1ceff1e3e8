use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{info, warn};

use crate::errors::ProdGuardError;
use crate::utils::panic::panic_message;

/// A sub-resource the orchestrator owns and must release when the run ends.
///
/// Implementations must tolerate being called more than once.
#[async_trait]
pub trait Cleanup: Send + Sync {
    fn resource_name(&self) -> &str;

    async fn cleanup(&self) -> Result<(), ProdGuardError>;
}

/// Owned resources, released in registration order exactly once.
#[derive(Default)]
pub struct CleanupRegistry {
    resources: Vec<Arc<dyn Cleanup>>,
    released: bool,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: Arc<dyn Cleanup>) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release every resource, even when earlier ones fail or panic.
    /// Returns the failures as messages; a second call does nothing.
    pub async fn release_all(&mut self) -> Vec<String> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut errors = Vec::new();
        for resource in self.resources.drain(..) {
            let name = resource.resource_name().to_string();
            match AssertUnwindSafe(resource.cleanup()).catch_unwind().await {
                Ok(Ok(())) => info!(resource = %name, "Released"),
                Ok(Err(e)) => {
                    warn!(resource = %name, error = %e, "Cleanup failed");
                    errors.push(format!("cleanup {}: {}", name, e));
                }
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    warn!(resource = %name, panic = %msg, "Cleanup panicked");
                    errors.push(format!("cleanup {}: panicked: {}", name, msg));
                }
            }
        }
        errors
    }
}
