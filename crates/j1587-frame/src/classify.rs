use crate::conn::{self, ConnFrame};

pub const CONN_MGMT_PID: u8 = conn::MGMT_PID;
pub const DATA_PID: u8 = crate::data::DATA_PID;
pub const MULTISECTION_PID: u8 = crate::multisection::MULTISECTION_PID;

/// The classification of a checksum-stripped J1708 frame, per §4.2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Neither PID 197, 198, nor 192 — delivered to the mailbox as-is.
    NonTransport,
    /// PID 197, successfully parsed.
    Conn(ConnFrame),
    /// PID 198, long enough to carry a segment header.
    Data,
    /// PID 192, regardless of section validity (the reassembler handles gaps).
    Multisection,
    /// Too short to be any recognized kind, or a PID-197 frame whose control
    /// byte didn't parse.
    Malformed,
}

/// Classify a checksum-stripped frame per the length/PID rules in §4.2.
///
/// `buf[0]` is the source MID, `buf[1]` the PID. Frames shorter than 2 bytes,
/// or PID-197 frames shorter than 5 bytes, are [`FrameKind::Malformed`].
#[must_use]
pub fn classify(buf: &[u8]) -> FrameKind {
    if buf.len() < 2 {
        return FrameKind::Malformed;
    }
    match buf[1] {
        CONN_MGMT_PID if buf.len() >= 5 => match conn::parse_conn(buf) {
            Ok(frame) => FrameKind::Conn(frame),
            Err(_) => FrameKind::Malformed,
        },
        CONN_MGMT_PID => FrameKind::Malformed,
        DATA_PID if buf.len() >= 6 => FrameKind::Data,
        DATA_PID => FrameKind::Malformed,
        MULTISECTION_PID => FrameKind::Multisection,
        _ => FrameKind::NonTransport,
    }
}
