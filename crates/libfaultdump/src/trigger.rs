//! Deliberate faults for exercising the handler.
//!
//! The stores are written in inline assembly: a plain Rust write through a
//! null or read-only pointer is undefined behaviour the optimiser may
//! remove or replace with a trap.

use std::arch::asm;

use log::warn;
use nix::sys::resource::{Resource, getrlimit, setrlimit};

use crate::errors::FaultDumpResult;

/// Lives in `.rodata`; storing into it raises SEGV_ACCERR.
static READ_ONLY_LITERAL: &str = "123";

/// Which fault to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Store to address 0 (`SEGV_MAPERR`).
    NullWrite,
    /// Store into a read-only string literal (`SEGV_ACCERR`).
    ReadOnlyWrite,
}

impl FaultKind {
    /// Address the store targets, which becomes the dump's center line.
    pub fn target(self) -> usize {
        match self {
            Self::NullWrite => 0,
            Self::ReadOnlyWrite => READ_ONLY_LITERAL.as_ptr() as usize,
        }
    }

    /// Raise the fault. Only returns if the store somehow succeeded.
    pub fn raise(self) {
        warn!("raising {self:?} at {:#x}", self.target());
        // SAFETY: the whole point is to fault; the installed handler never
        // returns to this frame.
        unsafe { store_byte(self.target(), b'4') }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(never)]
unsafe fn store_byte(addr: usize, value: u8) {
    // SAFETY: forwarded to the caller.
    unsafe {
        asm!(
            "mov byte ptr [{addr}], {value}",
            addr = in(reg) addr,
            value = in(reg_byte) value,
            options(nostack),
        );
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(never)]
unsafe fn store_byte(addr: usize, value: u8) {
    // SAFETY: forwarded to the caller.
    unsafe {
        asm!(
            "strb {value:w}, [{addr}]",
            addr = in(reg) addr,
            value = in(reg) value as u32,
            options(nostack),
        );
    }
}

/// Drop the soft descriptor limit to zero so the handler's probe pipe
/// cannot be created. Already open descriptors keep working.
pub fn exhaust_descriptors() -> FaultDumpResult<()> {
    let (_, hard) = getrlimit(Resource::RLIMIT_NOFILE)?;
    setrlimit(Resource::RLIMIT_NOFILE, 0, hard)?;
    warn!("RLIMIT_NOFILE soft limit set to 0");
    Ok(())
}
