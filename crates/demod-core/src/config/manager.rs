//! Manager and worker tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many terminated units one garbage collection pass reclaims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcPolicy {
    /// Reclaim the first terminated unit found, amortizing the scan
    #[default]
    OnePerCall,
    /// Reclaim every terminated unit in one pass
    AllEligible,
}

/// Configuration for [`DemodulatorManager`](crate::DemodulatorManager)
/// and the units it creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Reclamation policy for pending units
    /// Default: one_per_call
    pub gc_policy: GcPolicy,

    /// Stack size for the processing thread in bytes
    /// Some platforms ship small default stacks; `None` keeps the default.
    /// Default: 2048000
    pub demod_stack_size: Option<usize>,

    /// How often an idle worker re-checks its stop flag (ms)
    /// Stop requests also wake workers directly, so this only bounds the
    /// delay when a wake-up command is lost.
    /// Default: 100
    pub worker_poll_interval_ms: u64,

    /// Capacity of each unit's raw sample queue, `None` for unbounded
    /// Default: None
    pub sample_queue_capacity: Option<usize>,

    /// Longest time teardown waits for workers to confirm exit (ms)
    /// Default: 2000
    pub shutdown_timeout_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            gc_policy: GcPolicy::OnePerCall,
            demod_stack_size: Some(2_048_000),
            worker_poll_interval_ms: 100,
            sample_queue_capacity: None,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl ManagerConfig {
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
