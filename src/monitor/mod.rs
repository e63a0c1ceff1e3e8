pub mod abort;
pub mod sampler;
pub mod emergency_stop;

pub use abort::{abort_pair, AbortSignal, AbortTrigger};
pub use sampler::{ControlPlaneSampler, RequestGuard, RequestLedger, UsageSampler};
pub use emergency_stop::{
    EmergencyStopConfig, EmergencyStopMonitor, MonitorState, StopHandle, TripReason, UsageSample,
};
