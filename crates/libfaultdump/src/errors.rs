//! Error taxonomy for the fault handler core.
//!
//! These errors only surface in normal execution context (configuration and
//! installation). Inside the signal handler nothing is propagated; the
//! dispatcher inspects `errno()` and terminates.

use nix::errno::Errno;
use thiserror::Error;

/// Unified result type across the handler core.
pub type FaultDumpResult<T> = Result<T, FaultDumpError>;

/// Error cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FaultDumpError {
    #[error("memory dump radius {radius} outside 1..={max}")]
    InvalidRadius { radius: usize, max: usize },

    #[error("system call failed: {0}")]
    SysCall(#[from] Errno),

    #[error("error while creating pipe: {0}")]
    ProbeChannel(Errno),
}

impl FaultDumpError {
    /// OS error behind this failure, if any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::SysCall(errno) | Self::ProbeChannel(errno) => Some(*errno),
            Self::InvalidRadius { .. } => None,
        }
    }
}
