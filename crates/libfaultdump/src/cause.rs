//! Fault classification.

use crate::safe_io::{RawSink, write_str, write_u64_hex};

// libc only exports these for a few non-Linux targets.
/// Address not mapped to object.
pub const SEGV_MAPERR: i32 = 1;
/// Invalid permissions for mapped object.
pub const SEGV_ACCERR: i32 = 2;

/// Why the kernel raised SIGSEGV, decoded from `si_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// `SEGV_MAPERR`
    AddressNotMapped,
    /// `SEGV_ACCERR`
    InvalidPermission,
    /// Any other code (`SEGV_BNDERR`, `SEGV_PKUERR`, user-sent signals...).
    Unknown(i32),
}

impl FaultCause {
    /// Total over all codes; anything unrecognised maps to `Unknown`.
    pub const fn from_code(code: i32) -> Self {
        match code {
            SEGV_MAPERR => Self::AddressNotMapped,
            SEGV_ACCERR => Self::InvalidPermission,
            other => Self::Unknown(other),
        }
    }

    /// Text printed after `Cause: `.
    pub const fn description(self) -> &'static str {
        match self {
            Self::AddressNotMapped => "Address is not mapped to object",
            Self::InvalidPermission => "Invalid permission for mapped object",
            Self::Unknown(_) => "Unsupported code",
        }
    }
}

/// What the kernel told us about one fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    pub signo: i32,
    pub cause: FaultCause,
    pub address: usize,
}

impl FaultInfo {
    /// Decode the fields the handler cares about.
    ///
    /// # Safety
    ///
    /// `siginfo` must describe a fault signal (SIGSEGV/SIGBUS/...), for
    /// which `si_addr` is the active union member.
    pub unsafe fn from_siginfo(siginfo: &libc::siginfo_t) -> Self {
        Self {
            signo: siginfo.si_signo,
            cause: FaultCause::from_code(siginfo.si_code),
            // SAFETY: forwarded to the caller.
            address: unsafe { siginfo.si_addr() } as usize,
        }
    }
}

/// `Signal aborted: <signo>\n`, signo as a fixed 16-digit hex field.
pub fn write_header<S: RawSink + ?Sized>(out: &mut S, fault: &FaultInfo) {
    write_str(out, "Signal aborted: ");
    write_u64_hex(out, fault.signo as u64);
    write_str(out, "\n");
}

/// `\nCause: <description>\n`
pub fn write_cause<S: RawSink + ?Sized>(out: &mut S, cause: FaultCause) {
    write_str(out, "\nCause: ");
    write_str(out, cause.description());
    write_str(out, "\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_codes() {
        assert_eq!(
            FaultCause::from_code(SEGV_MAPERR),
            FaultCause::AddressNotMapped
        );
        assert_eq!(
            FaultCause::from_code(SEGV_ACCERR),
            FaultCause::InvalidPermission
        );
        assert_eq!(FaultCause::from_code(0), FaultCause::Unknown(0));
        // SEGV_BNDERR
        assert_eq!(FaultCause::from_code(3).description(), "Unsupported code");
    }

    #[test]
    fn header_renders_signal_as_hex_field() {
        let fault = FaultInfo {
            signo: libc::SIGSEGV,
            cause: FaultCause::AddressNotMapped,
            address: 0,
        };
        let mut out = Vec::new();
        write_header(&mut out, &fault);
        write_cause(&mut out, fault.cause);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Signal aborted: 000000000000000B\n\nCause: Address is not mapped to object\n"
        );
    }

    #[test]
    fn siginfo_decoding() {
        // SAFETY: siginfo_t is plain data; zero is a valid pattern.
        let mut siginfo: libc::siginfo_t = unsafe { std::mem::zeroed() };
        siginfo.si_signo = libc::SIGSEGV;
        siginfo.si_code = SEGV_ACCERR;
        // SAFETY: SIGSEGV uses the si_addr union member.
        let fault = unsafe { FaultInfo::from_siginfo(&siginfo) };
        assert_eq!(fault.signo, libc::SIGSEGV);
        assert_eq!(fault.cause, FaultCause::InvalidPermission);
        assert_eq!(fault.address, 0);
    }

    proptest! {
        #[test]
        fn classification_is_total(code: i32) {
            let description = FaultCause::from_code(code).description();
            prop_assert!(!description.is_empty());
            prop_assert!([
                "Address is not mapped to object",
                "Invalid permission for mapped object",
                "Unsupported code",
            ]
            .contains(&description));
        }
    }
}
