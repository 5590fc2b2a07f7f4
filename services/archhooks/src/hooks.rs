//! ArchHooks facade
//!
//! One object per process, built at startup, that the rest of the
//! application talks to for platform services.

use crate::alerts::{AlertPresenter, Alerts, LogPresenter, MessageBoxResult};
use crate::config::HooksConfig;
use crate::error::HookResult;
use crate::policy::backend_for;
use crate::signals::{install_crash_handler, ShutdownListener};
use crate::system_info::SystemInfo;
use crate::time_critical::{SectionStats, TimeCriticalGuard, TimeCriticalSection};

pub struct ArchHooks {
    time_critical: TimeCriticalSection,
    alerts: Alerts,
}

impl ArchHooks {
    /// Build the hooks with the headless alert presenter.
    pub fn new(config: HooksConfig) -> HookResult<Self> {
        Self::with_presenter(config, Box::new(LogPresenter))
    }

    pub fn with_presenter(
        config: HooksConfig,
        presenter: Box<dyn AlertPresenter>,
    ) -> HookResult<Self> {
        config.validate()?;

        let backend = backend_for(config.backend);
        log::info!("ArchHooks: scheduling backend '{}'", backend.name());

        Ok(Self {
            time_critical: TimeCriticalSection::new(backend, config.time_critical),
            alerts: Alerts::new(presenter).with_ignored(config.ignored_messages),
        })
    }

    /// Install the crash handler for fatal signals. Clean-shutdown signals
    /// are consumed through [`ArchHooks::shutdown_listener`].
    pub fn install_signal_handlers(&self) -> HookResult<()> {
        install_crash_handler()
    }

    /// Must be called inside a tokio runtime.
    pub fn shutdown_listener(&self) -> HookResult<ShutdownListener> {
        ShutdownListener::new()
    }

    /// Write machine, processor, OS and memory details to the log.
    pub fn dump_debug_info(&self) -> SystemInfo {
        let info = SystemInfo::gather();
        info.log();
        info
    }

    pub fn enter_time_critical_section(&self) -> TimeCriticalGuard<'_> {
        self.time_critical.enter()
    }

    pub fn time_critical(&self) -> &TimeCriticalSection {
        &self.time_critical
    }

    pub fn time_critical_stats(&self) -> SectionStats {
        self.time_critical.stats()
    }

    pub fn message_box_ok(&self, message: &str, id: &str) {
        self.alerts.message_box_ok(message, id)
    }

    pub fn message_box_error(&self, message: &str, id: &str) {
        self.alerts.message_box_error(message, id)
    }

    pub fn message_box_abort_retry_ignore(&self, message: &str, id: &str) -> MessageBoxResult {
        self.alerts.message_box_abort_retry_ignore(message, id)
    }

    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendChoice, TimeCriticalConfig};
    use crate::error::HookError;

    #[test]
    fn test_unsupported_backend_sections_still_pair() {
        let hooks = ArchHooks::new(HooksConfig::default().with_backend(BackendChoice::Unsupported))
            .unwrap();

        for _ in 0..3 {
            let guard = hooks.enter_time_critical_section();
            assert!(!guard.is_elevated());
            guard.exit();
        }

        let stats = hooks.time_critical_stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.clock_failures, 3);
        assert_eq!(hooks.time_critical().backend_name(), "unsupported");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = HooksConfig::default()
            .with_time_critical(TimeCriticalConfig::default().with_budget_divisor(0));
        assert!(matches!(ArchHooks::new(cfg), Err(HookError::Config(_))));
    }

    #[test]
    fn test_ignored_messages_carried_over() {
        let cfg = HooksConfig::default()
            .with_backend(BackendChoice::Unsupported)
            .with_ignored_messages(["low-fps"]);
        let hooks = ArchHooks::new(cfg).unwrap();

        assert!(hooks.alerts().is_message_ignored("low-fps"));
        assert_eq!(hooks.alerts().ignored_ids(), vec!["low-fps".to_string()]);
    }

    #[test]
    fn test_dump_debug_info() {
        let hooks = ArchHooks::new(HooksConfig::default().with_backend(BackendChoice::Unsupported))
            .unwrap();
        let info = hooks.dump_debug_info();
        assert!(info.num_processors >= 1);
    }

    #[test]
    fn test_native_backend_pairs_on_this_host() {
        // Without CAP_SYS_NICE the elevation is refused; the pairing must hold either way.
        let hooks = ArchHooks::new(HooksConfig::default()).unwrap();
        {
            let _guard = hooks.enter_time_critical_section();
        }
        assert_eq!(hooks.time_critical_stats().entries, 1);
    }
}
