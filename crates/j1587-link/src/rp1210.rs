use std::time::Duration;

use crate::endpoint::{LinkEndpoint, LinkError, RawFrame};
use crate::pacing::PacingClock;

/// Protocol strings accepted by the RP1210 vendor DLL, in preference order.
pub const PROTOCOL_J1708: &str = "J1708:Baud=9600";
pub const PROTOCOL_PLC_FALLBACK: &str = "PLC:Baud=9600";

/// A J1708 link endpoint backed by a vendor RP1210 DLL.
///
/// RP1210 is a Windows-only vendor API; this crate has no FFI binding to it
/// (unlike the original driver, which loaded the DLL via ctypes), so the
/// backend is unconditionally unavailable. `--list-rp1210` and
/// `--j1708-interface rp1210` both surface [`LinkError::Unavailable`], which
/// the CLI layer turns into exit code 1 per §6.
pub struct Rp1210Link {
    #[allow(dead_code)]
    dll_name: String,
    #[allow(dead_code)]
    device_id: u32,
    pacing: PacingClock,
}

impl Rp1210Link {
    #[must_use]
    pub fn new(dll_name: impl Into<String>, device_id: u32) -> Self {
        Self {
            dll_name: dll_name.into(),
            device_id,
            pacing: PacingClock::new(),
        }
    }
}

impl LinkEndpoint for Rp1210Link {
    fn read(&self, _timeout: Duration) -> Result<Option<RawFrame>, LinkError> {
        Err(LinkError::Unavailable(
            "RP1210 backend requires a vendor DLL, unavailable on this platform".to_string(),
        ))
    }

    fn send(&self, buf: &[u8], _has_checksum: bool) -> Result<(), LinkError> {
        // Still paces before reporting failure, matching the original's
        // behavior of spending the bus-time budget before the vendor tx call.
        self.pacing.wait_and_advance(buf.len() + 1);
        Err(LinkError::Unavailable(
            "RP1210 backend requires a vendor DLL, unavailable on this platform".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rp1210_link_is_unavailable() {
        let link = Rp1210Link::new("DENRP32", 1);
        assert!(link.read(Duration::from_millis(10)).is_err());
        assert!(link.send(&[0x80, 0x00], false).is_err());
    }
}
