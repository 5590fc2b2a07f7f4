//! Linux scheduling backend
//!
//! Provides:
//! - Reference clock rate from cpufreq sysfs (fallback: /proc/cpuinfo)
//! - Thread policy get/set through sched_getattr / sched_setattr
//! - SCHED_DEADLINE for time-critical sections

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HookError, HookResult};
use crate::policy::{SchedBackend, SchedPolicy};

const CPUFREQ_MAX: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq";
const PROC_CPUINFO: &str = "/proc/cpuinfo";

// Not exported by libc on every target.
const SCHED_DEADLINE: u32 = 6;
const SCHED_FLAG_RESET_ON_FORK: u64 = 0x01;

/// Kernel ABI of `struct sched_attr` (SCHED_ATTR_SIZE_VER0).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SchedAttr {
    size: u32,
    sched_policy: u32,
    sched_flags: u64,
    sched_nice: i32,
    sched_priority: u32,
    sched_runtime: u64,
    sched_deadline: u64,
    sched_period: u64,
}

impl SchedAttr {
    fn empty() -> Self {
        Self {
            size: std::mem::size_of::<SchedAttr>() as u32,
            ..Default::default()
        }
    }

    fn to_policy(self) -> HookResult<SchedPolicy> {
        let policy = match self.sched_policy as i32 {
            libc::SCHED_OTHER => SchedPolicy::Normal {
                nice: self.sched_nice,
            },
            libc::SCHED_BATCH => SchedPolicy::Batch {
                nice: self.sched_nice,
            },
            libc::SCHED_IDLE => SchedPolicy::Idle,
            libc::SCHED_FIFO => SchedPolicy::Fifo {
                priority: self.sched_priority,
            },
            libc::SCHED_RR => SchedPolicy::RoundRobin {
                priority: self.sched_priority,
            },
            p if p as u32 == SCHED_DEADLINE => SchedPolicy::Deadline {
                runtime: Duration::from_nanos(self.sched_runtime),
                deadline: Duration::from_nanos(self.sched_deadline),
                period: Duration::from_nanos(self.sched_period),
            },
            other => {
                return Err(HookError::SchedPolicy(format!(
                    "unknown scheduling policy {}",
                    other
                )))
            }
        };
        Ok(policy)
    }

    fn from_policy(policy: &SchedPolicy) -> Self {
        let mut attr = Self::empty();
        match *policy {
            SchedPolicy::Normal { nice } => {
                attr.sched_policy = libc::SCHED_OTHER as u32;
                attr.sched_nice = nice;
            }
            SchedPolicy::Batch { nice } => {
                attr.sched_policy = libc::SCHED_BATCH as u32;
                attr.sched_nice = nice;
            }
            SchedPolicy::Idle => attr.sched_policy = libc::SCHED_IDLE as u32,
            SchedPolicy::Fifo { priority } => {
                attr.sched_policy = libc::SCHED_FIFO as u32;
                attr.sched_priority = priority;
            }
            SchedPolicy::RoundRobin { priority } => {
                attr.sched_policy = libc::SCHED_RR as u32;
                attr.sched_priority = priority;
            }
            SchedPolicy::Deadline {
                runtime,
                deadline,
                period,
            } => {
                attr.sched_policy = SCHED_DEADLINE;
                // children must not inherit a deadline reservation
                attr.sched_flags = SCHED_FLAG_RESET_ON_FORK;
                attr.sched_runtime = runtime.as_nanos() as u64;
                attr.sched_deadline = deadline.as_nanos() as u64;
                attr.sched_period = period.as_nanos() as u64;
            }
        }
        attr
    }
}

/// SCHED_DEADLINE backend for the calling thread.
#[derive(Debug, Clone)]
pub struct LinuxDeadline {
    cpufreq_path: PathBuf,
    cpuinfo_path: PathBuf,
}

impl LinuxDeadline {
    pub fn new() -> Self {
        Self {
            cpufreq_path: PathBuf::from(CPUFREQ_MAX),
            cpuinfo_path: PathBuf::from(PROC_CPUINFO),
        }
    }

    /// Read the reference clock from other files (containers, tests).
    pub fn with_clock_sources(cpufreq: impl Into<PathBuf>, cpuinfo: impl Into<PathBuf>) -> Self {
        Self {
            cpufreq_path: cpufreq.into(),
            cpuinfo_path: cpuinfo.into(),
        }
    }
}

impl Default for LinuxDeadline {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedBackend for LinuxDeadline {
    fn name(&self) -> &str {
        "linux-deadline"
    }

    fn reference_clock_hz(&self) -> HookResult<u64> {
        if let Ok(text) = std::fs::read_to_string(&self.cpufreq_path) {
            if let Some(hz) = parse_cpufreq_khz(&text) {
                return Ok(hz);
            }
        }

        let text = std::fs::read_to_string(&self.cpuinfo_path).map_err(|e| {
            HookError::ReferenceClock(format!("{}: {}", self.cpuinfo_path.display(), e))
        })?;
        parse_cpuinfo_mhz(&text).ok_or_else(|| {
            HookError::ReferenceClock(format!(
                "no clock rate in {} or {}",
                self.cpufreq_path.display(),
                self.cpuinfo_path.display()
            ))
        })
    }

    fn current_policy(&self) -> HookResult<SchedPolicy> {
        let mut attr = SchedAttr::empty();
        let result = unsafe {
            libc::syscall(
                libc::SYS_sched_getattr,
                0 as libc::pid_t,
                &mut attr as *mut SchedAttr,
                attr.size as libc::c_uint,
                0 as libc::c_uint,
            )
        };

        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(HookError::SchedPolicy(format!("sched_getattr failed: {}", err)));
        }
        attr.to_policy()
    }

    fn set_policy(&self, policy: &SchedPolicy) -> HookResult<()> {
        let attr = SchedAttr::from_policy(policy);
        let result = unsafe {
            libc::syscall(
                libc::SYS_sched_setattr,
                0 as libc::pid_t,
                &attr as *const SchedAttr,
                0 as libc::c_uint,
            )
        };

        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(HookError::SchedPolicy(format!(
                "sched_setattr failed: {} (SCHED_DEADLINE needs CAP_SYS_NICE)",
                err
            )));
        }
        Ok(())
    }
}

/// `cpuinfo_max_freq` holds a single kHz value.
pub fn parse_cpufreq_khz(text: &str) -> Option<u64> {
    let khz: u64 = text.trim().parse().ok()?;
    khz.checked_mul(1_000).filter(|&hz| hz > 0)
}

/// First `cpu MHz` line of /proc/cpuinfo, in Hz.
pub fn parse_cpuinfo_mhz(text: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "cpu MHz")
        .and_then(|(_, value)| value.trim().parse::<f64>().ok())
        .filter(|mhz| *mhz > 0.0)
        .map(|mhz| (mhz * 1_000_000.0) as u64)
}
