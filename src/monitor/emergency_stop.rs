use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::abort::{abort_pair, AbortSignal, AbortTrigger};
use super::sampler::UsageSampler;
use crate::errors::ProdGuardError;
use crate::pipeline::cleanup::Cleanup;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds enforced by the watchdog for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyStopConfig {
    pub max_test_duration_ms: u64,
    pub resource_threshold: f64,
    pub cost_threshold_usd: f64,
    pub auto_stop_enabled: bool,
}

impl Default for EmergencyStopConfig {
    fn default() -> Self {
        Self {
            max_test_duration_ms: 15 * 60 * 1000,
            resource_threshold: 0.8,
            cost_threshold_usd: 10.0,
            auto_stop_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Monitoring,
    Tripped,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripReason {
    Duration { elapsed_ms: u64, limit_ms: u64 },
    Resource { usage: f64, threshold: f64 },
    Cost { cost_usd: f64, threshold_usd: f64 },
    Manual,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration { elapsed_ms, limit_ms } => {
                write!(f, "run exceeded max duration ({}ms > {}ms)", elapsed_ms, limit_ms)
            }
            Self::Resource { usage, threshold } => {
                write!(f, "resource usage {:.2} above threshold {:.2}", usage, threshold)
            }
            Self::Cost { cost_usd, threshold_usd } => {
                write!(f, "estimated cost ${:.4} above threshold ${:.4}", cost_usd, threshold_usd)
            }
            Self::Manual => write!(f, "stop requested by operator"),
        }
    }
}

/// Latest successful readings from the sampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSample {
    pub resource_usage: Option<f64>,
    pub cost_usd: Option<f64>,
}

impl EmergencyStopConfig {
    /// Returns the first breached bound, checked in duration, resource, cost order.
    pub fn evaluate(&self, elapsed: Duration, sample: &UsageSample) -> Option<TripReason> {
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed_ms > self.max_test_duration_ms {
            return Some(TripReason::Duration {
                elapsed_ms,
                limit_ms: self.max_test_duration_ms,
            });
        }
        if let Some(usage) = sample.resource_usage {
            if usage > self.resource_threshold {
                return Some(TripReason::Resource {
                    usage,
                    threshold: self.resource_threshold,
                });
            }
        }
        if let Some(cost_usd) = sample.cost_usd {
            if cost_usd > self.cost_threshold_usd {
                return Some(TripReason::Cost {
                    cost_usd,
                    threshold_usd: self.cost_threshold_usd,
                });
            }
        }
        None
    }
}

/// Lets an operator (e.g. Ctrl-C) ask the monitor to trip. The monitor stays
/// the only writer of the abort flag.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.token.cancel();
    }
}

#[derive(Debug)]
struct MonitorStatus {
    state: MonitorState,
    trip_reason: Option<TripReason>,
    last_sample: UsageSample,
    sample_failures: u32,
}

/// Background watchdog bounding a run's duration, resource usage and spend.
pub struct EmergencyStopMonitor {
    config: EmergencyStopConfig,
    sampler: Arc<dyn UsageSampler>,
    poll_interval: Duration,
    status: Arc<RwLock<MonitorStatus>>,
    trigger: Mutex<Option<AbortTrigger>>,
    signal: AbortSignal,
    shutdown: CancellationToken,
    manual_stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EmergencyStopMonitor {
    pub fn new(config: EmergencyStopConfig, sampler: Arc<dyn UsageSampler>) -> Self {
        let (trigger, signal) = abort_pair();
        Self {
            config,
            sampler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            status: Arc::new(RwLock::new(MonitorStatus {
                state: MonitorState::Idle,
                trip_reason: None,
                last_sample: UsageSample::default(),
                sample_failures: 0,
            })),
            trigger: Mutex::new(Some(trigger)),
            signal,
            shutdown: CancellationToken::new(),
            manual_stop: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read side of the abort flag this monitor writes.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { token: self.manual_stop.clone() }
    }

    pub fn config(&self) -> &EmergencyStopConfig {
        &self.config
    }

    pub async fn state(&self) -> MonitorState {
        self.status.read().await.state
    }

    pub async fn trip_reason(&self) -> Option<TripReason> {
        self.status.read().await.trip_reason.clone()
    }

    pub async fn sample_failures(&self) -> u32 {
        self.status.read().await.sample_failures
    }

    pub async fn last_sample(&self) -> UsageSample {
        self.status.read().await.last_sample
    }

    /// Idle -> Monitoring. Calling it again, or after `stop()`, does nothing.
    pub async fn start(&self) {
        {
            let mut status = self.status.write().await;
            if status.state != MonitorState::Idle {
                debug!(state = ?status.state, "Emergency stop monitor already started");
                return;
            }
            status.state = MonitorState::Monitoring;
        }

        let Some(trigger) = self.trigger.lock().await.take() else {
            return;
        };

        info!(
            max_duration_ms = self.config.max_test_duration_ms,
            resource_threshold = self.config.resource_threshold,
            cost_threshold_usd = self.config.cost_threshold_usd,
            auto_stop = self.config.auto_stop_enabled,
            "Emergency stop monitor started"
        );

        let watch = WatchLoop {
            config: self.config.clone(),
            sampler: self.sampler.clone(),
            poll_interval: self.poll_interval,
            status: self.status.clone(),
            trigger,
            shutdown: self.shutdown.clone(),
            manual_stop: self.manual_stop.clone(),
            started_at: Instant::now(),
        };
        if self.manual_stop.is_cancelled() {
            watch.trip(TripReason::Manual).await;
            return;
        }
        *self.task.lock().await = Some(tokio::spawn(watch.run()));
    }

    /// Any state -> Stopped. Idempotent. The abort flag is left as it is.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Emergency stop monitor task ended abnormally");
            }
        }
        let mut status = self.status.write().await;
        if status.state != MonitorState::Stopped {
            info!(previous = ?status.state, "Emergency stop monitor stopped");
            status.state = MonitorState::Stopped;
        }
    }
}

#[async_trait]
impl Cleanup for EmergencyStopMonitor {
    fn resource_name(&self) -> &str {
        "emergency-stop-monitor"
    }

    async fn cleanup(&self) -> Result<(), ProdGuardError> {
        self.stop().await;
        Ok(())
    }
}

struct WatchLoop {
    config: EmergencyStopConfig,
    sampler: Arc<dyn UsageSampler>,
    poll_interval: Duration,
    status: Arc<RwLock<MonitorStatus>>,
    trigger: AbortTrigger,
    shutdown: CancellationToken,
    manual_stop: CancellationToken,
    started_at: Instant,
}

impl WatchLoop {
    async fn run(self) {
        let mut sample = UsageSample::default();
        let mut breach_logged = false;
        // Strictly past the limit, matching `EmergencyStopConfig::evaluate`.
        let deadline = self.started_at
            + Duration::from_millis(self.config.max_test_duration_ms.saturating_add(1));

        loop {
            if self.manual_stop.is_cancelled() {
                self.trip(TripReason::Manual).await;
                return;
            }

            // A slow sampler must not hold back the duration bound.
            if Instant::now() < deadline {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = self.manual_stop.cancelled() => continue,
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!("Duration limit reached while sampling");
                    }
                    _ = self.take_sample(&mut sample) => {}
                }
            } else {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = self.manual_stop.cancelled() => continue,
                    _ = self.take_sample(&mut sample) => {}
                }
            }

            if let Some(reason) = self.config.evaluate(self.started_at.elapsed(), &sample) {
                if self.config.auto_stop_enabled {
                    self.trip(reason).await;
                    return;
                }
                if !breach_logged {
                    warn!(reason = %reason, "Emergency stop threshold breached but auto-stop is disabled");
                    breach_logged = true;
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = self.manual_stop.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Each call gets at most one poll interval.
    fn sample_timeout(&self) -> Duration {
        self.poll_interval.min(SAMPLE_TIMEOUT)
    }

    async fn take_sample(&self, sample: &mut UsageSample) {
        let limit = self.sample_timeout();
        let (usage, cost) = tokio::join!(
            tokio::time::timeout(limit, self.sampler.resource_usage()),
            tokio::time::timeout(limit, self.sampler.estimated_cost_usd()),
        );

        let mut failures = 0;
        match usage {
            Ok(Ok(usage)) => sample.resource_usage = Some(usage),
            Ok(Err(e)) => {
                warn!(error = %e, "Resource usage sampling failed, keeping last reading");
                failures += 1;
            }
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Resource usage sampling timed out, keeping last reading");
                failures += 1;
            }
        }

        match cost {
            Ok(Ok(cost)) => sample.cost_usd = Some(cost),
            Ok(Err(e)) => {
                warn!(error = %e, "Cost sampling failed, keeping last reading");
                failures += 1;
            }
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Cost sampling timed out, keeping last reading");
                failures += 1;
            }
        }

        let mut status = self.status.write().await;
        status.last_sample = *sample;
        status.sample_failures += failures;
    }

    async fn trip(&self, reason: TripReason) {
        self.trigger.trigger();
        let mut status = self.status.write().await;
        warn!(reason = %reason, "Emergency stop tripped, no further categories will start");
        status.trip_reason = Some(reason);
        if status.state == MonitorState::Monitoring {
            status.state = MonitorState::Tripped;
        }
    }
}
