//! Memory probing without dereferencing.
//!
//! A candidate address is handed to `write(2)` as the source buffer of a
//! one-byte write into a pipe. The kernel performs the load; an unmapped or
//! unreadable address yields `EFAULT` instead of a second SIGSEGV. The byte
//! is then read back from the other end of the pipe.

use std::os::fd::{AsRawFd, OwnedFd};

use crate::errors::{FaultDumpError, FaultDumpResult};
use crate::safe_io::{RawSink, write_byte_hex, write_str, write_u64_hex};

/// Bytes dumped on each side of the faulting address.
pub const DEFAULT_RADIUS: usize = 20;

/// Upper bound accepted by `HandlerConfig`.
pub const MAX_RADIUS: usize = 4096;

/// Printed in place of a byte that could not be read.
pub const UNREADABLE: &str = "Couldn't dump";

/// Anything able to tell whether one address is readable.
pub trait MemoryProbe {
    /// `Some(byte)` if `addr` is readable right now, `None` otherwise.
    fn probe(&self, addr: usize) -> Option<u8>;
}

/// One-shot pipe used as the probe channel.
#[derive(Debug)]
pub struct ProbeChannel {
    read: OwnedFd,
    write: OwnedFd,
}

impl ProbeChannel {
    /// Create the pipe. Async-signal-safe: `pipe(2)` only.
    pub fn open() -> FaultDumpResult<Self> {
        let (read, write) = nix::unistd::pipe().map_err(FaultDumpError::ProbeChannel)?;
        Ok(Self { read, write })
    }
}

impl MemoryProbe for ProbeChannel {
    fn probe(&self, addr: usize) -> Option<u8> {
        // SAFETY: the kernel validates `addr`; an inaccessible address
        // fails with EFAULT rather than faulting in user space.
        let written = unsafe {
            libc::write(
                self.write.as_raw_fd(),
                addr as *const libc::c_void,
                1,
            )
        };
        if written != 1 {
            return None;
        }

        let mut byte = 0u8;
        // SAFETY: `byte` is a valid one-byte destination on our stack.
        let read = unsafe {
            libc::read(
                self.read.as_raw_fd(),
                (&raw mut byte).cast::<libc::c_void>(),
                1,
            )
        };
        (read == 1).then_some(byte)
    }
}

/// Symmetric byte range around a center address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    center: usize,
    radius: usize,
}

impl MemoryWindow {
    /// Window of `radius` bytes on each side of `center`.
    pub const fn new(center: usize, radius: usize) -> Self {
        Self { center, radius }
    }

    /// Lines in the dump, always `2 * radius + 1`.
    pub const fn line_count(&self) -> usize {
        2 * self.radius + 1
    }

    /// Addresses for offsets `-radius..=radius`, in offset order. Arithmetic
    /// wraps, so a window around null starts near the top of the address
    /// space.
    pub fn addresses(&self) -> impl Iterator<Item = usize> + use<> {
        let start = self.center.wrapping_sub(self.radius);
        (0..self.line_count()).map(move |i| start.wrapping_add(i))
    }
}

/// Emit the `Memory dump:` section, one line per address in the window.
pub fn dump_memory<S, P>(out: &mut S, probe: &P, window: MemoryWindow)
where
    S: RawSink + ?Sized,
    P: MemoryProbe + ?Sized,
{
    write_str(out, "\nMemory dump:\n");
    for addr in window.addresses() {
        write_str(out, "0x");
        write_u64_hex(out, addr as u64);
        write_str(out, ": ");
        match probe.probe(addr) {
            Some(byte) => write_byte_hex(out, byte),
            None => write_str(out, UNREADABLE),
        }
        write_str(out, "\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Readable only inside `[lo, hi)`; the byte is the low address bits.
    struct RangeProbe {
        lo: usize,
        hi: usize,
    }

    impl MemoryProbe for RangeProbe {
        fn probe(&self, addr: usize) -> Option<u8> {
            (self.lo..self.hi).contains(&addr).then_some(addr as u8)
        }
    }

    #[test]
    fn channel_reads_live_memory() {
        let channel = ProbeChannel::open().unwrap();
        let data = [0x5Au8, 0xC3, 0x00];
        for (i, expected) in data.iter().enumerate() {
            let addr = data.as_ptr() as usize + i;
            assert_eq!(channel.probe(addr), Some(*expected));
        }
    }

    #[test]
    fn channel_reports_unmapped_without_crashing() {
        let channel = ProbeChannel::open().unwrap();
        assert_eq!(channel.probe(0), None);
        assert_eq!(channel.probe(usize::MAX - 16), None);
        // Still usable after a failed probe.
        let marker = 0x7Eu8;
        assert_eq!(channel.probe(&raw const marker as usize), Some(0x7E));
    }

    #[test]
    fn default_window_has_41_lines_centered_on_fault() {
        let window = MemoryWindow::new(0x1000, DEFAULT_RADIUS);
        assert_eq!(window.line_count(), 41);
        let addrs: Vec<usize> = window.addresses().collect();
        assert_eq!(addrs.len(), 41);
        assert_eq!(addrs[0], 0x1000 - 20);
        assert_eq!(addrs[20], 0x1000);
        assert_eq!(addrs[40], 0x1000 + 20);
    }

    #[test]
    fn window_around_null_wraps() {
        let addrs: Vec<usize> = MemoryWindow::new(0, 2).addresses().collect();
        assert_eq!(addrs, vec![usize::MAX - 1, usize::MAX, 0, 1, 2]);
    }

    #[test]
    fn dump_marks_unreadable_offsets_and_continues() {
        let probe = RangeProbe {
            lo: 0x2000,
            hi: 0x2002,
        };
        let mut out = Vec::new();
        dump_memory(&mut out, &probe, MemoryWindow::new(0x2000, 1));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\nMemory dump:\n\
             0x0000000000001FFF: Couldn't dump\n\
             0x0000000000002000: 00\n\
             0x0000000000002001: 01\n"
        );
    }

    proptest! {
        #[test]
        fn window_is_ascending_with_center_in_middle(
            center in 0x1_0000usize..0x7fff_ffff_0000,
            radius in 1usize..=MAX_RADIUS,
        ) {
            let window = MemoryWindow::new(center, radius);
            let addrs: Vec<usize> = window.addresses().collect();
            prop_assert_eq!(addrs.len(), 2 * radius + 1);
            prop_assert_eq!(addrs[radius], center);
            prop_assert!(addrs.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }
}
