//! General-purpose register dump.
//!
//! The name table is a static, ordered list of `(name, slot)` pairs for the
//! target architecture. Values always come from the execution context the
//! kernel handed to the signal handler; nothing here dereferences them.

use crate::safe_io::{RawSink, write_str, write_u64_hex};

/// A named slot in the architecture's saved register area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub slot: usize,
}

const fn reg(name: &'static str, slot: usize) -> Register {
    Register { name, slot }
}

/// Indexed, read-only access to a register snapshot.
pub trait ExecutionContext {
    /// Raw 64-bit value stored in `slot`.
    fn register(&self, slot: usize) -> u64;
}

/// Borrowed view of the `ucontext_t` delivered with an `SA_SIGINFO` signal.
#[derive(Clone, Copy)]
pub struct UcontextSnapshot<'a> {
    ucontext: &'a libc::ucontext_t,
}

impl<'a> UcontextSnapshot<'a> {
    /// # Safety
    ///
    /// `ptr` must be the third argument of an `SA_SIGINFO` handler (or
    /// otherwise point at a valid `ucontext_t`) and outlive `'a`.
    pub unsafe fn from_raw(ptr: *const libc::c_void) -> Option<Self> {
        // SAFETY: forwarded to the caller.
        unsafe { ptr.cast::<libc::ucontext_t>().as_ref() }.map(|ucontext| Self { ucontext })
    }
}

#[cfg(target_arch = "x86_64")]
mod arch {
    use super::{ExecutionContext, Register, UcontextSnapshot, reg};
    use libc::{
        REG_CR2, REG_CSGSFS, REG_EFL, REG_ERR, REG_OLDMASK, REG_R8, REG_R9, REG_R10, REG_R11,
        REG_R12, REG_R13, REG_R14, REG_R15, REG_RAX, REG_RBP, REG_RBX, REG_RCX, REG_RDI, REG_RDX,
        REG_RIP, REG_RSI, REG_RSP, REG_TRAPNO,
    };

    /// `mcontext_t.gregs`, in kernel order.
    pub static REGISTERS: [Register; 23] = [
        reg("R8", REG_R8 as usize),
        reg("R9", REG_R9 as usize),
        reg("R10", REG_R10 as usize),
        reg("R11", REG_R11 as usize),
        reg("R12", REG_R12 as usize),
        reg("R13", REG_R13 as usize),
        reg("R14", REG_R14 as usize),
        reg("R15", REG_R15 as usize),
        reg("RDI", REG_RDI as usize),
        reg("RSI", REG_RSI as usize),
        reg("RBP", REG_RBP as usize),
        reg("RBX", REG_RBX as usize),
        reg("RDX", REG_RDX as usize),
        reg("RAX", REG_RAX as usize),
        reg("RCX", REG_RCX as usize),
        reg("RSP", REG_RSP as usize),
        reg("RIP", REG_RIP as usize),
        reg("EFL", REG_EFL as usize),
        reg("CSGSFS", REG_CSGSFS as usize),
        reg("ERR", REG_ERR as usize),
        reg("TRAPNO", REG_TRAPNO as usize),
        reg("OLDMASK", REG_OLDMASK as usize),
        reg("CR2", REG_CR2 as usize),
    ];

    impl ExecutionContext for UcontextSnapshot<'_> {
        fn register(&self, slot: usize) -> u64 {
            self.ucontext
                .uc_mcontext
                .gregs
                .get(slot)
                .map_or(0, |value| *value as u64)
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use super::{ExecutionContext, Register, UcontextSnapshot, reg};

    const SP: usize = 31;
    const PC: usize = 32;
    const PSTATE: usize = 33;
    const FAULT_ADDR: usize = 34;

    /// `regs[0..31]` followed by the special registers of `mcontext_t`.
    pub static REGISTERS: [Register; 35] = [
        reg("X0", 0),
        reg("X1", 1),
        reg("X2", 2),
        reg("X3", 3),
        reg("X4", 4),
        reg("X5", 5),
        reg("X6", 6),
        reg("X7", 7),
        reg("X8", 8),
        reg("X9", 9),
        reg("X10", 10),
        reg("X11", 11),
        reg("X12", 12),
        reg("X13", 13),
        reg("X14", 14),
        reg("X15", 15),
        reg("X16", 16),
        reg("X17", 17),
        reg("X18", 18),
        reg("X19", 19),
        reg("X20", 20),
        reg("X21", 21),
        reg("X22", 22),
        reg("X23", 23),
        reg("X24", 24),
        reg("X25", 25),
        reg("X26", 26),
        reg("X27", 27),
        reg("X28", 28),
        reg("X29", 29),
        reg("X30", 30),
        reg("SP", SP),
        reg("PC", PC),
        reg("PSTATE", PSTATE),
        reg("FAULT_ADDR", FAULT_ADDR),
    ];

    impl ExecutionContext for UcontextSnapshot<'_> {
        fn register(&self, slot: usize) -> u64 {
            let mcontext = &self.ucontext.uc_mcontext;
            match slot {
                SP => mcontext.sp as u64,
                PC => mcontext.pc as u64,
                PSTATE => mcontext.pstate as u64,
                FAULT_ADDR => mcontext.fault_address as u64,
                _ => mcontext.regs.get(slot).map_or(0, |value| *value as u64),
            }
        }
    }
}

pub use arch::REGISTERS;

/// Emit the register section: one `<name>: 0x<16 hex digits>` line per
/// table entry, in table order.
pub fn dump_registers<S, C>(out: &mut S, context: &C)
where
    S: RawSink + ?Sized,
    C: ExecutionContext + ?Sized,
{
    write_str(out, "\nGeneral purposes registers:\n");
    for register in REGISTERS.iter() {
        write_str(out, register.name);
        write_str(out, ": 0x");
        write_u64_hex(out, context.register(register.slot));
        write_str(out, "\n");
    }
}
