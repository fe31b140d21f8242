//! Async-signal-safe output primitives.
//!
//! Everything the fault handler prints goes through this module. The only
//! system call used is `write(2)` on an already open descriptor: no
//! buffering, no `core::fmt`, no allocation and no locks. Hex rendering
//! happens into small stack arrays.

use std::os::fd::RawFd;

use nix::errno::Errno;

/// Destination for raw diagnostic bytes.
///
/// Implementations used from a signal handler must not allocate or lock.
pub trait RawSink {
    /// Emit `bytes` verbatim. Failures are swallowed: there is nobody left
    /// to report them to.
    fn put(&mut self, bytes: &[u8]);
}

/// Unbuffered writer over a raw file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdSink {
    fd: RawFd,
}

impl FdSink {
    /// Diagnostics stream.
    pub const STDOUT: Self = Self {
        fd: libc::STDOUT_FILENO,
    };
    /// Meta-errors about the handler itself.
    pub const STDERR: Self = Self {
        fd: libc::STDERR_FILENO,
    };
}

impl RawSink for FdSink {
    fn put(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            // SAFETY: `rest` is a live slice; write(2) only reads from it.
            let n = unsafe { libc::write(self.fd, rest.as_ptr().cast(), rest.len()) };
            if n < 0 {
                if Errno::last() == Errno::EINTR {
                    continue;
                }
                return;
            }
            if n == 0 {
                return;
            }
            rest = &rest[n as usize..];
        }
    }
}

#[cfg(test)]
impl RawSink for Vec<u8> {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Map a value in `0..16` to its uppercase ASCII hex digit.
#[inline]
pub const fn nibble_to_ascii(nibble: u8) -> u8 {
    let nibble = nibble & 0xF;
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'A' + (nibble - 10)
    }
}

/// Two hex digits, most-significant nibble first.
#[inline]
pub const fn byte_to_hex(byte: u8) -> [u8; 2] {
    [nibble_to_ascii(byte >> 4), nibble_to_ascii(byte & 0xF)]
}

/// Fixed 16-digit field, most-significant byte first, leading zeros kept.
pub const fn u64_to_hex(value: u64) -> [u8; 16] {
    let bytes = value.to_be_bytes();
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < bytes.len() {
        let [hi, lo] = byte_to_hex(bytes[i]);
        out[2 * i] = hi;
        out[2 * i + 1] = lo;
        i += 1;
    }
    out
}

/// Two hex digits for `byte`.
pub fn write_byte_hex<S: RawSink + ?Sized>(out: &mut S, byte: u8) {
    out.put(&byte_to_hex(byte));
}

/// Sixteen hex digits for `value`, no prefix.
pub fn write_u64_hex<S: RawSink + ?Sized>(out: &mut S, value: u64) {
    out.put(&u64_to_hex(value));
}

/// Bytes of `text` as-is.
pub fn write_str<S: RawSink + ?Sized>(out: &mut S, text: &str) {
    out.put(text.as_bytes());
}

/// `<context>: <OS description>\n`, using nix's static errno table.
pub fn write_os_error<S: RawSink + ?Sized>(out: &mut S, context: &str, errno: Errno) {
    write_str(out, context);
    write_str(out, ": ");
    write_str(out, errno.desc());
    write_str(out, "\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nibbles_map_to_uppercase_digits() {
        let digits: Vec<u8> = (0..16).map(nibble_to_ascii).collect();
        assert_eq!(digits, b"0123456789ABCDEF");
    }

    #[test]
    fn byte_renders_high_nibble_first() {
        assert_eq!(&byte_to_hex(0x0B), b"0B");
        assert_eq!(&byte_to_hex(0xF0), b"F0");
    }

    #[test]
    fn u64_keeps_leading_zeros() {
        let mut out = Vec::new();
        write_u64_hex(&mut out, 11);
        assert_eq!(out, b"000000000000000B");
    }

    #[test]
    fn text_is_emitted_without_delimiters() {
        let mut out = Vec::new();
        write_str(&mut out, "R8");
        write_str(&mut out, ": 0x");
        assert_eq!(out, b"R8: 0x");
    }

    #[test]
    fn os_error_line() {
        let mut out = Vec::new();
        write_os_error(&mut out, "Error while creating pipe", Errno::EMFILE);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!("Error while creating pipe: {}\n", Errno::EMFILE.desc())
        );
    }

    #[test]
    fn fd_sink_writes_through_a_pipe() {
        let (rd, wr) = nix::unistd::pipe().unwrap();
        let mut sink = FdSink {
            fd: std::os::fd::AsRawFd::as_raw_fd(&wr),
        };
        write_u64_hex(&mut sink, 0xDEAD_BEEF);
        drop(wr);
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut std::fs::File::from(rd), &mut buf).unwrap();
        assert_eq!(buf, b"00000000DEADBEEF");
    }

    proptest! {
        #[test]
        fn u64_matches_std_formatting(value: u64) {
            let mut out = Vec::new();
            write_u64_hex(&mut out, value);
            prop_assert_eq!(String::from_utf8(out).unwrap(), format!("{value:016X}"));
        }

        #[test]
        fn byte_matches_std_formatting(byte: u8) {
            let mut out = Vec::new();
            write_byte_hex(&mut out, byte);
            prop_assert_eq!(String::from_utf8(out).unwrap(), format!("{byte:02X}"));
        }
    }
}
