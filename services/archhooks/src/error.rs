//! Error types shared by all arch hooks.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("reference clock unavailable: {0}")]
    ReferenceClock(String),
    #[error("scheduling policy call failed: {0}")]
    SchedPolicy(String),
    #[error("signal setup failed: {0}")]
    Signal(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("Platform not supported for this hook")]
    PlatformNotSupported,
}

pub type HookResult<T> = Result<T, HookError>;
