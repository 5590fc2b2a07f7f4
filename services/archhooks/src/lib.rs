//! Arch Hooks Crate
//!
//! Platform services for the application, behind one facade:
//! - Time-critical sections (bounded-latency scheduling, overrun detection)
//! - Native alerts with "don't show again" suppression
//! - Clean shutdown on SIGINT/SIGTERM/SIGHUP, crash reporting on fatal signals
//! - System information dump
//!
//! # Example
//!
//! ```rust,ignore
//! use archhooks::{ArchHooks, HooksConfig};
//!
//! let hooks = ArchHooks::new(HooksConfig::default())?;
//! hooks.install_signal_handlers()?;
//! hooks.dump_debug_info();
//!
//! {
//!     let _section = hooks.enter_time_critical_section();
//!     fill_sound_buffer();
//! }
//! ```

pub mod alerts;
pub mod config;
pub mod error;
#[cfg(unix)]
pub mod hooks;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod policy;
#[cfg(unix)]
pub mod signals;
pub mod system_info;
pub mod time_critical;

// Re-exports
pub use alerts::{
    AlertButton, AlertKind, AlertPresenter, Alerts, IgnoreList, LogPresenter, MessageBoxResult,
};
pub use config::{BackendChoice, HooksConfig, TimeCriticalConfig};
pub use error::{HookError, HookResult};
#[cfg(unix)]
pub use hooks::ArchHooks;
pub use policy::{SchedBackend, SchedPolicy, Unsupported};
#[cfg(unix)]
pub use signals::{install_crash_handler, is_fatal_signal, ShutdownListener};
pub use system_info::SystemInfo;
pub use time_critical::{SectionStats, TimeCriticalGuard, TimeCriticalSection};
