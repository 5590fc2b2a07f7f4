//! Scheduling policy records and the backend trait that reads/writes them.

use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendChoice;
use crate::error::{HookError, HookResult};

/// A thread's scheduling class as the OS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Normal { nice: i32 },
    Batch { nice: i32 },
    Idle,
    Fifo { priority: u32 },
    RoundRobin { priority: u32 },
    /// Bounded-latency class: `runtime` of CPU every `period`, due by `deadline`.
    Deadline {
        runtime: Duration,
        deadline: Duration,
        period: Duration,
    },
}

impl SchedPolicy {
    /// Policy for a time-critical section: the period is one full cycle of a
    /// `hz` reference clock, runtime and deadline are `1 / divisor` of it.
    pub fn time_critical(hz: u64, divisor: u64) -> Self {
        let budget = hz / divisor.max(1);
        Self::Deadline {
            runtime: ticks_to_duration(budget, hz),
            deadline: ticks_to_duration(budget, hz),
            period: ticks_to_duration(hz, hz),
        }
    }

    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            Self::Fifo { .. } | Self::RoundRobin { .. } | Self::Deadline { .. }
        )
    }
}

impl Default for SchedPolicy {
    fn default() -> Self {
        Self::Normal { nice: 0 }
    }
}

/// Convert reference clock ticks into wall time. `hz` must be non-zero.
pub fn ticks_to_duration(ticks: u64, hz: u64) -> Duration {
    let nanos = ticks as u128 * 1_000_000_000 / hz as u128;
    Duration::from_nanos(nanos as u64)
}

/// OS primitives used by the time-critical section.
///
/// All calls act on the calling thread.
pub trait SchedBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Rate of the hardware reference clock used to size policies.
    fn reference_clock_hz(&self) -> HookResult<u64>;

    /// Current scheduling policy of the calling thread.
    fn current_policy(&self) -> HookResult<SchedPolicy>;

    /// Install `policy` on the calling thread.
    fn set_policy(&self, policy: &SchedPolicy) -> HookResult<()>;
}

/// Backend for targets without a native implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl SchedBackend for Unsupported {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn reference_clock_hz(&self) -> HookResult<u64> {
        Err(HookError::PlatformNotSupported)
    }

    fn current_policy(&self) -> HookResult<SchedPolicy> {
        Err(HookError::PlatformNotSupported)
    }

    fn set_policy(&self, _policy: &SchedPolicy) -> HookResult<()> {
        Err(HookError::PlatformNotSupported)
    }
}

/// Build the backend selected in the configuration.
pub fn backend_for(choice: BackendChoice) -> Arc<dyn SchedBackend> {
    match choice {
        BackendChoice::Unsupported => Arc::new(Unsupported),
        #[cfg(target_os = "linux")]
        BackendChoice::Native => Arc::new(crate::linux::LinuxDeadline::new()),
        #[cfg(not(target_os = "linux"))]
        BackendChoice::Native => {
            log::warn!("No native scheduling backend for this platform");
            Arc::new(Unsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_critical_policy_sizing() {
        // 100 MHz bus, like the older hardware this was first tuned on
        let policy = SchedPolicy::time_critical(100_000_000, 60);
        match policy {
            SchedPolicy::Deadline {
                runtime,
                deadline,
                period,
            } => {
                assert_eq!(period, Duration::from_secs(1));
                assert_eq!(runtime, deadline);
                // 1_666_666 ticks at 100MHz
                assert_eq!(runtime, Duration::from_nanos(16_666_660));
            }
            other => panic!("expected deadline policy, got {:?}", other),
        }
        assert!(policy.is_realtime());
    }

    #[test]
    fn test_ticks_to_duration() {
        assert_eq!(ticks_to_duration(1_000, 1_000), Duration::from_secs(1));
        assert_eq!(ticks_to_duration(3, 1_000), Duration::from_millis(3));
        assert_eq!(ticks_to_duration(0, 24_000_000), Duration::ZERO);
    }

    #[test]
    fn test_unsupported_backend() {
        let backend = Unsupported;
        assert!(matches!(
            backend.reference_clock_hz(),
            Err(HookError::PlatformNotSupported)
        ));
        assert!(backend.set_policy(&SchedPolicy::default()).is_err());
        assert!(!SchedPolicy::default().is_realtime());
    }
}
