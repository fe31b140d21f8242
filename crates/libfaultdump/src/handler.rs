//! The SIGSEGV handler: configuration, installation and dispatch.
//!
//! Installation runs in normal context and may log and allocate. The
//! dispatcher (`on_fault`) runs in signal context and only touches
//! atomics, `safe_io`, the probe pipe and `_exit`.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use log::{debug, info};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::cause::{FaultInfo, write_cause, write_header};
use crate::errors::{FaultDumpError, FaultDumpResult};
use crate::probe::{
    DEFAULT_RADIUS, MAX_RADIUS, MemoryProbe, MemoryWindow, ProbeChannel, dump_memory,
};
use crate::registers::{ExecutionContext, UcontextSnapshot, dump_registers};
use crate::safe_io::{FdSink, RawSink, write_os_error};

/// Handler tuning, fixed at installation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    radius: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
        }
    }
}

impl HandlerConfig {
    /// Bytes dumped on each side of the fault address.
    pub fn with_radius(mut self, radius: usize) -> FaultDumpResult<Self> {
        if !(1..=MAX_RADIUS).contains(&radius) {
            return Err(FaultDumpError::InvalidRadius {
                radius,
                max: MAX_RADIUS,
            });
        }
        self.radius = radius;
        Ok(self)
    }

    /// Configured dump radius.
    pub fn radius(&self) -> usize {
        self.radius
    }
}

/// Lifecycle of the process-wide handler.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Disarmed = 0,
    Armed = 1,
    Handling = 2,
}

impl HandlerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Armed,
            2 => Self::Handling,
            _ => Self::Disarmed,
        }
    }
}

static STATE: AtomicU8 = AtomicU8::new(HandlerState::Disarmed as u8);
static RADIUS: AtomicUsize = AtomicUsize::new(DEFAULT_RADIUS);

/// Current lifecycle state of the process-wide handler.
pub fn state() -> HandlerState {
    HandlerState::from_u8(STATE.load(Ordering::Acquire))
}

/// Disposition installed for SIGSEGV. `SA_NODEFER` leaves SIGSEGV
/// unblocked inside `on_fault`, so a nested fault re-enters it and hits
/// the `Handling` guard instead of being killed by the kernel.
fn fault_action() -> SigAction {
    SigAction::new(
        SigHandler::SigAction(on_fault),
        SaFlags::SA_SIGINFO | SaFlags::SA_NODEFER,
        SigSet::empty(),
    )
}

/// Register `on_fault` for SIGSEGV with `SA_SIGINFO`.
pub fn install(config: &HandlerConfig) -> FaultDumpResult<()> {
    RADIUS.store(config.radius, Ordering::Release);
    let action = fault_action();
    // SAFETY: `on_fault` restricts itself to async-signal-safe operations.
    let previous = unsafe { sigaction(Signal::SIGSEGV, &action) }?;
    debug!("previous SIGSEGV disposition: {:?}", previous.handler());
    STATE.store(HandlerState::Armed as u8, Ordering::Release);
    info!("SIGSEGV handler armed, memory radius {}", config.radius);
    Ok(())
}

/// Write the full report for one fault to `out`.
///
/// Sections appear in a fixed order: header, cause, registers, memory.
pub fn report<S, C, P>(out: &mut S, fault: &FaultInfo, context: &C, probe: &P, radius: usize)
where
    S: RawSink + ?Sized,
    C: ExecutionContext + ?Sized,
    P: MemoryProbe + ?Sized,
{
    write_header(out, fault);
    write_cause(out, fault.cause);
    dump_registers(out, context);
    dump_memory(out, probe, MemoryWindow::new(fault.address, radius));
}

/// Full diagnostic pass for a delivered fault, minus termination.
///
/// The probe channel is opened first so that a failure leaves stdout
/// untouched; the error goes to `err` and nothing else is printed.
pub fn handle_fault<S, E, C>(
    out: &mut S,
    err: &mut E,
    fault: &FaultInfo,
    context: &C,
    radius: usize,
) where
    S: RawSink + ?Sized,
    E: RawSink + ?Sized,
    C: ExecutionContext + ?Sized,
{
    if fault.signo != libc::SIGSEGV {
        return;
    }
    match ProbeChannel::open() {
        Ok(channel) => report(out, fault, context, &channel, radius),
        Err(error) => {
            if let Some(errno) = error.errno() {
                write_os_error(err, "Error while creating pipe", errno);
            }
        }
    }
}

extern "C" fn on_fault(
    _signo: libc::c_int,
    info: *mut libc::siginfo_t,
    context: *mut libc::c_void,
) {
    let entered = STATE.swap(HandlerState::Handling as u8, Ordering::AcqRel);
    if entered != HandlerState::Handling as u8 {
        // SAFETY: the kernel passes a valid siginfo_t with SA_SIGINFO, and
        // for SIGSEGV `si_addr` is the active member.
        let fault = unsafe { info.as_ref() }
            .map(|info| unsafe { FaultInfo::from_siginfo(info) });
        // SAFETY: third handler argument is the interrupted ucontext_t.
        let snapshot = unsafe { UcontextSnapshot::from_raw(context) };
        if let (Some(fault), Some(snapshot)) = (fault, snapshot) {
            let (mut out, mut err) = (FdSink::STDOUT, FdSink::STDERR);
            handle_fault(
                &mut out,
                &mut err,
                &fault,
                &snapshot,
                RADIUS.load(Ordering::Acquire),
            );
        }
    }
    // SAFETY: _exit is async-signal-safe and never returns.
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}
