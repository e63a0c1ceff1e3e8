use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::category::probe_limit;
use crate::errors::ProdGuardError;
use crate::probes::catalog::{CategoryKind, ProbeTimeouts};
use crate::probes::{Probe, ProbeContext};

const CATEGORY_OVERHEAD: Duration = Duration::from_secs(5);

/// Work a category must complete before its probes run (e.g. fetching a
/// baseline). An error here is an infrastructure error, not a finding.
#[async_trait]
pub trait CategorySetup: Send + Sync {
    async fn prepare(&self, category: &str, ctx: &ProbeContext) -> Result<(), ProdGuardError>;
}

/// A named group of probes scored together.
pub struct CategorySpec {
    pub name: String,
    pub tracked_vuln_classes: u32,
    pub probes: Vec<Arc<dyn Probe>>,
    /// Probes whose failure fails the category.
    pub critical_probes: BTreeSet<String>,
    pub setup: Option<Arc<dyn CategorySetup>>,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, tracked_vuln_classes: u32) -> Self {
        Self {
            name: name.into(),
            tracked_vuln_classes,
            probes: Vec::new(),
            critical_probes: BTreeSet::new(),
            setup: None,
        }
    }

    /// The catalog category with its default critical probes.
    pub fn builtin(kind: CategoryKind, timeouts: &ProbeTimeouts) -> Self {
        Self {
            name: kind.as_str().to_string(),
            tracked_vuln_classes: kind.max_tracked_vuln_classes(),
            probes: kind.probes(timeouts),
            critical_probes: kind.default_critical_probes().iter().map(|s| s.to_string()).collect(),
            setup: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_critical<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical_probes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_setup(mut self, setup: Arc<dyn CategorySetup>) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn is_critical(&self, probe: &str) -> bool {
        self.critical_probes.contains(probe)
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    /// Backstop bound for the whole category: every probe's runner limit
    /// (timeout plus grace) plus a fixed overhead covering setup.
    pub fn implicit_timeout(&self) -> Duration {
        self.probes.iter().map(|p| probe_limit(p.as_ref())).sum::<Duration>() + CATEGORY_OVERHEAD
    }
}

impl std::fmt::Debug for CategorySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategorySpec")
            .field("name", &self.name)
            .field("tracked_vuln_classes", &self.tracked_vuln_classes)
            .field("probes", &self.probe_names())
            .field("critical_probes", &self.critical_probes)
            .field("has_setup", &self.setup.is_some())
            .finish()
    }
}
