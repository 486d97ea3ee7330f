use byteorder::{ByteOrder, LittleEndian};

use crate::Mid;

pub const MGMT_PID: u8 = 197;

pub const CTRL_RTS: u8 = 1;
pub const CTRL_CTS: u8 = 2;
pub const CTRL_EOM: u8 = 3;
pub const CTRL_RSD: u8 = 4;
pub const CTRL_ABORT: u8 = 255;

/// A J1587 PID 197 connection-management frame, checksum already stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnFrame {
    pub src: Mid,
    pub dst: Mid,
    pub kind: ConnKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnKind {
    /// Request To Send: the sender wants to transmit `segments` data frames
    /// totalling `total_length` bytes.
    Rts { segments: u8, total_length: u16 },
    /// Clear To Send: the receiver is ready for `num_segments` data frames
    /// starting at `next_segment` (1-indexed).
    Cts { num_segments: u8, next_segment: u8 },
    /// End Of Message: the receiver has all segments.
    Eom,
    /// Request Specific Data: carries a 16-bit request identifier.
    Rsd { request_id: u16 },
    /// Connection Abort.
    Abort,
}

impl ConnFrame {
    #[must_use]
    pub fn rts(src: Mid, dst: Mid, segments: u8, total_length: u16) -> Self {
        Self {
            src,
            dst,
            kind: ConnKind::Rts {
                segments,
                total_length,
            },
        }
    }

    #[must_use]
    pub fn cts(src: Mid, dst: Mid, num_segments: u8, next_segment: u8) -> Self {
        Self {
            src,
            dst,
            kind: ConnKind::Cts {
                num_segments,
                next_segment,
            },
        }
    }

    #[must_use]
    pub fn eom(src: Mid, dst: Mid) -> Self {
        Self {
            src,
            dst,
            kind: ConnKind::Eom,
        }
    }

    #[must_use]
    pub fn rsd(src: Mid, dst: Mid, request_id: u16) -> Self {
        Self {
            src,
            dst,
            kind: ConnKind::Rsd { request_id },
        }
    }

    #[must_use]
    pub fn abort(src: Mid, dst: Mid) -> Self {
        Self {
            src,
            dst,
            kind: ConnKind::Abort,
        }
    }

    #[must_use]
    pub fn is_rts(&self) -> bool {
        matches!(self.kind, ConnKind::Rts { .. })
    }

    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self.kind, ConnKind::Abort)
    }

    /// Serialize to wire bytes, checksum not included.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.kind {
            ConnKind::Rts {
                segments,
                total_length,
            } => {
                let mut len_buf = [0u8; 2];
                LittleEndian::write_u16(&mut len_buf, total_length);
                vec![
                    self.src, MGMT_PID, 5, self.dst, CTRL_RTS, segments, len_buf[0], len_buf[1],
                ]
            }
            ConnKind::Cts {
                num_segments,
                next_segment,
            } => vec![
                self.src,
                MGMT_PID,
                4,
                self.dst,
                CTRL_CTS,
                num_segments,
                next_segment,
            ],
            ConnKind::Eom => vec![self.src, MGMT_PID, 2, self.dst, CTRL_EOM],
            ConnKind::Rsd { request_id } => {
                let mut req_buf = [0u8; 2];
                LittleEndian::write_u16(&mut req_buf, request_id);
                vec![
                    self.src, MGMT_PID, 4, self.dst, CTRL_RSD, req_buf[0], req_buf[1],
                ]
            }
            ConnKind::Abort => vec![self.src, MGMT_PID, 2, self.dst, CTRL_ABORT],
        }
    }
}

/// Parse a connection-management frame from checksum-stripped bytes.
///
/// Callers must have already confirmed via [`crate::classify`] that `buf` is
/// long enough and carries PID 197.
///
/// # Errors
///
/// Returns an error if the control byte (`buf[4]`) is not one of
/// RTS/CTS/EOM/RSD/ABORT, or if `buf` is too short for the control byte's
/// fixed fields.
pub fn parse_conn(buf: &[u8]) -> eyre::Result<ConnFrame> {
    eyre::ensure!(buf.len() >= 5, "conn frame too short: {} bytes", buf.len());
    let src = buf[0];
    let dst = buf[3];
    let ctrl = buf[4];
    let kind = match ctrl {
        CTRL_RTS => {
            eyre::ensure!(buf.len() >= 8, "RTS frame too short: {} bytes", buf.len());
            ConnKind::Rts {
                segments: buf[5],
                total_length: LittleEndian::read_u16(&buf[6..8]),
            }
        }
        CTRL_CTS => {
            eyre::ensure!(buf.len() >= 7, "CTS frame too short: {} bytes", buf.len());
            ConnKind::Cts {
                num_segments: buf[5],
                next_segment: buf[6],
            }
        }
        CTRL_EOM => ConnKind::Eom,
        CTRL_RSD => {
            eyre::ensure!(buf.len() >= 7, "RSD frame too short: {} bytes", buf.len());
            ConnKind::Rsd {
                request_id: LittleEndian::read_u16(&buf[5..7]),
            }
        }
        CTRL_ABORT => ConnKind::Abort,
        other => eyre::bail!("unrecognized connection-management control code {other:#X}"),
    };
    Ok(ConnFrame { src, dst, kind })
}
