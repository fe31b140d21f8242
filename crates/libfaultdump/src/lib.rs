//! Core library for faultdump, a SIGSEGV handler that prints the faulting
//! register state and a window of memory around the fault address, then
//! exits with failure status.
//!
//! Everything reachable from the installed handler is async-signal-safe:
//! output goes through [`safe_io`] only, and memory is inspected through
//! the pipe-based [`probe`] instead of being dereferenced.

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
compile_error!("faultdump supports Linux on x86_64 and aarch64 only");

pub mod cause;
pub mod errors;
pub mod handler;
pub mod probe;
pub mod registers;
pub mod safe_io;
pub mod trigger;

pub use errors::{FaultDumpError, FaultDumpResult};
pub use handler::{HandlerConfig, install};

/// Exposes the crate version for CLI reporting.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
