//! Hook configuration
//!
//! Plain structs with defaults and `with_*` builders. `validate()` fails fast
//! on values the OS would reject later anyway.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{HookError, HookResult};

/// Timing parameters for the time-critical section.
#[derive(Debug, Clone)]
pub struct TimeCriticalConfig {
    /// Runtime and deadline are `1 / budget_divisor` of the reference period.
    pub budget_divisor: u64,
    /// Sections running longer than this are reported as overruns.
    pub overrun_threshold: Duration,
}

impl TimeCriticalConfig {
    pub fn new(budget_divisor: u64, overrun_threshold: Duration) -> Self {
        Self {
            budget_divisor,
            overrun_threshold,
        }
    }

    pub fn with_budget_divisor(mut self, divisor: u64) -> Self {
        self.budget_divisor = divisor;
        self
    }

    pub fn with_overrun_threshold(mut self, threshold: Duration) -> Self {
        self.overrun_threshold = threshold;
        self
    }

    pub fn validate(&self) -> HookResult<()> {
        if self.budget_divisor == 0 {
            return Err(HookError::Config("budget_divisor must be >= 1".into()));
        }
        Ok(())
    }
}

impl Default for TimeCriticalConfig {
    fn default() -> Self {
        Self {
            budget_divisor: 60,                          // ~16.7ms of every second
            overrun_threshold: Duration::from_millis(100),
        }
    }
}

/// Which scheduling backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Native backend for the build target, `Unsupported` where there is none.
    #[default]
    Native,
    /// Never touch the scheduler; every section takes the clock-failure path.
    Unsupported,
}

/// Top-level configuration for [`crate::ArchHooks`].
#[derive(Debug, Clone, Default)]
pub struct HooksConfig {
    pub time_critical: TimeCriticalConfig,
    pub backend: BackendChoice,
    /// Message IDs the user already silenced in an earlier run.
    pub ignored_messages: BTreeSet<String>,
}

impl HooksConfig {
    pub fn with_time_critical(mut self, cfg: TimeCriticalConfig) -> Self {
        self.time_critical = cfg;
        self
    }

    pub fn with_backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_ignored_messages<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_messages.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn validate(&self) -> HookResult<()> {
        self.time_critical.validate()?;
        if self.ignored_messages.iter().any(|id| id.is_empty()) {
            return Err(HookError::Config(
                "ignored message IDs must be non-empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = HooksConfig::default();
        assert_eq!(cfg.time_critical.budget_divisor, 60);
        assert_eq!(cfg.time_critical.overrun_threshold, Duration::from_millis(100));
        assert_eq!(cfg.backend, BackendChoice::Native);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let cfg = HooksConfig::default()
            .with_time_critical(TimeCriticalConfig::default().with_budget_divisor(0));
        assert!(matches!(cfg.validate(), Err(HookError::Config(_))));
    }

    #[test]
    fn test_empty_ignored_id_rejected() {
        let cfg = HooksConfig::default().with_ignored_messages(["low-fps", ""]);
        assert!(cfg.validate().is_err());
    }
}
